//! Workspace root discovery.
//!
//! Walks down from a starting directory, one level at a time, until it finds
//! the directory that directly contains `namespaces/`. Each level is decided
//! from its immediate children only:
//!
//! | `namespaces/` child | `timestamp` file | subdirectories | outcome |
//! |---|---|---|---|
//! | yes | any | any | this directory is the root |
//! | no | yes | exactly 1 | descend into it |
//! | no | yes | 0 or ≥2 | `AmbiguousLayout` |
//! | no | no | exactly 1 | descend into it (wrapper) |
//! | no | no | 0 or ≥2 | `UnrecognizedLayout` |

use std::path::{Path, PathBuf};

use mustgather_shared::{MustGatherError, NAMESPACES_DIR, Result, TIMESTAMP_FILE};
use tracing::{debug, instrument};

/// Levels walked before giving up; symlink loops would otherwise never end.
const MAX_DEPTH: usize = 64;

/// Immediate children of one directory, reduced to what the decision needs.
#[derive(Debug, Default)]
struct Level {
    has_namespaces: bool,
    has_timestamp: bool,
    subdirs: Vec<PathBuf>,
}

/// Find the canonical workspace root at or below `start`.
///
/// The returned path is absolute and directly contains `namespaces/`.
#[instrument(skip_all, fields(start = %start.display()))]
pub fn locate_root(start: &Path) -> Result<PathBuf> {
    let mut dir = std::fs::canonicalize(start).map_err(|e| not_found_or_io(start, e))?;

    for depth in 0..=MAX_DEPTH {
        let mut level = scan(&dir)?;

        if level.has_namespaces {
            debug!(depth, root = %dir.display(), "found workspace root");
            return Ok(dir);
        }

        let found = level.subdirs.len();
        match (level.has_timestamp, level.subdirs.pop()) {
            (timestamped, Some(next)) if found == 1 => {
                debug!(
                    depth,
                    from = %dir.display(),
                    to = %next.display(),
                    timestamped,
                    "descending into single subdirectory"
                );
                dir = std::fs::canonicalize(&next).map_err(|e| not_found_or_io(&next, e))?;
            }
            (true, _) => return Err(MustGatherError::AmbiguousLayout { dir, found }),
            (false, _) => return Err(MustGatherError::UnrecognizedLayout { dir, found }),
        }
    }

    Err(MustGatherError::UnrecognizedLayout { dir, found: 1 })
}

fn scan(dir: &Path) -> Result<Level> {
    let entries = std::fs::read_dir(dir).map_err(|e| not_found_or_io(dir, e))?;

    let mut level = Level::default();
    for entry in entries {
        let entry = entry.map_err(|e| MustGatherError::io(dir, e))?;
        let path = entry.path();
        let is_dir = path.is_dir();
        let name = entry.file_name();

        if is_dir {
            if name == NAMESPACES_DIR {
                level.has_namespaces = true;
            }
            level.subdirs.push(path);
        } else if name == TIMESTAMP_FILE {
            level.has_timestamp = true;
        }
    }
    Ok(level)
}

fn not_found_or_io(path: &Path, e: std::io::Error) -> MustGatherError {
    match e.kind() {
        std::io::ErrorKind::NotFound => MustGatherError::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => MustGatherError::io(path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn mkdirs(base: &Path, rel: &str) -> PathBuf {
        let p = base.join(rel);
        fs::create_dir_all(&p).unwrap();
        p
    }

    fn canonical(p: &Path) -> PathBuf {
        fs::canonicalize(p).unwrap()
    }

    #[test]
    fn root_at_start() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), "mg/namespaces/default");
        mkdirs(tmp.path(), "mg/cluster-scoped-resources");

        let root = locate_root(&tmp.path().join("mg")).unwrap();
        assert_eq!(root, canonical(&tmp.path().join("mg")));
    }

    #[test]
    fn timestamped_directory_resolves_to_its_child() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), "mg/quay-io-xyz/namespaces");
        fs::write(tmp.path().join("mg/timestamp"), "now").unwrap();

        let root = locate_root(&tmp.path().join("mg")).unwrap();
        assert_eq!(root, canonical(&tmp.path().join("mg/quay-io-xyz")));
    }

    #[test]
    fn namespaces_wins_over_timestamp_and_siblings() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), "mg/namespaces");
        mkdirs(tmp.path(), "mg/cluster-scoped-resources");
        mkdirs(tmp.path(), "mg/etcd_info");
        fs::write(tmp.path().join("mg/timestamp"), "now").unwrap();

        let root = locate_root(&tmp.path().join("mg")).unwrap();
        assert_eq!(root, canonical(&tmp.path().join("mg")));
    }

    #[test]
    fn terminates_at_first_namespaces_for_any_depth() {
        for depth in 0..6 {
            let tmp = tempfile::tempdir().unwrap();
            let wrappers: Vec<String> = (0..depth).map(|i| format!("wrap{i}")).collect();
            let rel = wrappers.join("/");
            let expected = mkdirs(tmp.path(), &rel);
            mkdirs(&expected, "namespaces/default/pods");
            // A deeper namespaces/ must not be preferred over the shallower one.
            mkdirs(&expected, "namespaces/default/namespaces");

            let root = locate_root(tmp.path()).unwrap();
            assert_eq!(root, canonical(&expected), "depth {depth}");
        }
    }

    #[test]
    fn timestamp_with_two_children_is_ambiguous() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), "mg/quay-io-a/namespaces");
        mkdirs(tmp.path(), "mg/quay-io-b/namespaces");
        fs::write(tmp.path().join("mg/timestamp"), "now").unwrap();

        let err = locate_root(&tmp.path().join("mg")).unwrap_err();
        assert!(matches!(err, MustGatherError::AmbiguousLayout { found: 2, .. }));
    }

    #[test]
    fn timestamp_without_children_is_ambiguous() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), "mg");
        fs::write(tmp.path().join("mg/timestamp"), "now").unwrap();

        let err = locate_root(&tmp.path().join("mg")).unwrap_err();
        assert!(matches!(err, MustGatherError::AmbiguousLayout { found: 0, .. }));
    }

    #[test]
    fn siblings_without_marker_are_unrecognized() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), "mg/a");
        mkdirs(tmp.path(), "mg/b");

        let err = locate_root(&tmp.path().join("mg")).unwrap_err();
        assert!(matches!(err, MustGatherError::UnrecognizedLayout { found: 2, .. }));

        let empty = mkdirs(tmp.path(), "empty");
        let err = locate_root(&empty).unwrap_err();
        assert!(matches!(err, MustGatherError::UnrecognizedLayout { found: 0, .. }));
    }

    #[test]
    fn namespaces_file_does_not_count() {
        let tmp = tempfile::tempdir().unwrap();
        mkdirs(tmp.path(), "mg");
        fs::write(tmp.path().join("mg/namespaces"), "").unwrap();

        let err = locate_root(&tmp.path().join("mg")).unwrap_err();
        assert!(matches!(err, MustGatherError::UnrecognizedLayout { .. }));
    }

    #[test]
    fn missing_start_is_input_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = locate_root(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, MustGatherError::InputNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_stops() {
        let tmp = tempfile::tempdir().unwrap();
        let loop_dir = mkdirs(tmp.path(), "loop");
        std::os::unix::fs::symlink(&loop_dir, loop_dir.join("again")).unwrap();

        let err = locate_root(&loop_dir).unwrap_err();
        assert!(matches!(err, MustGatherError::UnrecognizedLayout { .. }));
    }
}
