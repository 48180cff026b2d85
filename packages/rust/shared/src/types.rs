//! Core domain types for must-gather workspaces and contexts.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{MustGatherError, Result};

/// Directory that marks a workspace root.
pub const NAMESPACES_DIR: &str = "namespaces";

/// Sibling of [`NAMESPACES_DIR`] holding cluster-scoped resources.
pub const CLUSTER_SCOPED_DIR: &str = "cluster-scoped-resources";

/// Marker file written by the gather tool next to the image-named wrapper directory.
pub const TIMESTAMP_FILE: &str = "timestamp";

/// Namespace assigned to freshly created contexts.
pub const DEFAULT_NAMESPACE: &str = "default";

/// On-disk value of `current` for the active context.
pub const CURRENT_MARKER: &str = "*";

static CONTEXT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("context id pattern is valid")
});

/// Reject user-supplied context ids that would be awkward on the command line.
pub fn validate_context_id(id: &str) -> Result<()> {
    if CONTEXT_ID_RE.is_match(id) {
        Ok(())
    } else {
        Err(MustGatherError::validation(format!(
            "invalid context id '{id}': use letters, digits, '.', '_' or '-'"
        )))
    }
}

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// What a user-supplied input turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Directory,
    /// gzip stream, expected to wrap a tar archive.
    Gzip,
    Zip,
    Tar,
    Unknown,
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Directory => "directory",
            Self::Gzip => "tar.gz",
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// A named, persisted reference to a workspace root plus its default namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Opaque token: eight random characters or user supplied.
    pub id: String,
    /// Absolute workspace root.
    pub path: PathBuf,
    /// Stored as `"*"` / `""` for compatibility with existing context files.
    #[serde(
        serialize_with = "serialize_current",
        deserialize_with = "deserialize_current",
        default
    )]
    pub current: bool,
    /// Default namespace, persisted under the legacy `project` key.
    #[serde(rename = "project", default = "default_namespace")]
    pub default_namespace: String,
}

impl Context {
    /// Whether `key` names this context, either by id or by path.
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.path == Path::new(key)
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.into()
}

fn serialize_current<S: Serializer>(current: &bool, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(if *current { CURRENT_MARKER } else { "" })
}

/// Anything other than the `"*"` marker (null, bools, numbers) reads as not current.
fn deserialize_current<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCurrent {
        Marker(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match RawCurrent::deserialize(d)? {
        RawCurrent::Marker(raw) => raw == CURRENT_MARKER,
        RawCurrent::Other(_) => false,
    })
}

/// Root structure of the persisted context file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFile {
    /// Unused by this tool; carried so existing files round-trip untouched.
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub legacy_id: Option<String>,
    #[serde(default)]
    pub contexts: Vec<Context>,
}

// ---------------------------------------------------------------------------
// ResolvedWorkspace
// ---------------------------------------------------------------------------

/// The active workspace, resolved once at startup and handed to every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWorkspace {
    pub id: String,
    pub root: PathBuf,
    pub namespace: String,
}

impl ResolvedWorkspace {
    /// `<root>/namespaces`.
    pub fn namespaces_dir(&self) -> PathBuf {
        self.root.join(NAMESPACES_DIR)
    }

    /// `<root>/namespaces/<ns>`.
    pub fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.namespaces_dir().join(namespace)
    }

    /// `<root>/cluster-scoped-resources`.
    pub fn cluster_scoped_dir(&self) -> PathBuf {
        self.root.join(CLUSTER_SCOPED_DIR)
    }

    /// Namespace directory names present under the root, sorted.
    pub fn list_namespaces(&self) -> Result<Vec<String>> {
        list_subdirectory_names(&self.namespaces_dir())
    }
}

/// Sorted names of the immediate subdirectories of `dir`.
pub fn list_subdirectory_names(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| MustGatherError::io(dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MustGatherError::io(dir, e))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_a_marker_string() {
        let ctx = Context {
            id: "abcd1234".into(),
            path: PathBuf::from("/tmp/mg"),
            current: true,
            default_namespace: "openshift-etcd".into(),
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["current"], "*");
        assert_eq!(json["project"], "openshift-etcd");

        let idle = Context {
            current: false,
            ..ctx
        };
        let json = serde_json::to_value(&idle).unwrap();
        assert_eq!(json["current"], "");
    }

    #[test]
    fn parses_existing_context_file() {
        let raw = r#"{
            "id": "legacy",
            "contexts": [
                {"id": "a1", "path": "/data/one", "current": "", "project": "default"},
                {"id": "b2", "path": "/data/two", "current": "*", "project": "kube-system"}
            ]
        }"#;
        let file: ContextFile = serde_json::from_str(raw).unwrap();
        assert_eq!(file.legacy_id.as_deref(), Some("legacy"));
        assert_eq!(file.contexts.len(), 2);
        assert!(!file.contexts[0].current);
        assert!(file.contexts[1].current);
        assert_eq!(file.contexts[1].default_namespace, "kube-system");
    }

    #[test]
    fn non_string_current_reads_as_idle() {
        let raw = r#"{"contexts": [
            {"id": "n", "path": "/data/n", "current": null},
            {"id": "t", "path": "/data/t", "current": true},
            {"id": "z", "path": "/data/z", "current": 1},
            {"id": "s", "path": "/data/s", "current": "*"}
        ]}"#;
        let file: ContextFile = serde_json::from_str(raw).unwrap();
        let current: Vec<bool> = file.contexts.iter().map(|c| c.current).collect();
        assert_eq!(current, vec![false, false, false, true]);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let raw = r#"{"contexts": [{"id": "a1", "path": "/data/one"}]}"#;
        let file: ContextFile = serde_json::from_str(raw).unwrap();
        assert!(!file.contexts[0].current);
        assert_eq!(file.contexts[0].default_namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn context_matches_id_or_path() {
        let ctx = Context {
            id: "abcd1234".into(),
            path: PathBuf::from("/tmp/mg"),
            current: false,
            default_namespace: DEFAULT_NAMESPACE.into(),
        };
        assert!(ctx.matches("abcd1234"));
        assert!(ctx.matches("/tmp/mg"));
        assert!(!ctx.matches("/tmp"));
    }

    #[test]
    fn context_id_validation() {
        assert!(validate_context_id("prod-4.14").is_ok());
        assert!(validate_context_id("a").is_ok());
        assert!(validate_context_id("").is_err());
        assert!(validate_context_id("-flag").is_err());
        assert!(validate_context_id("has space").is_err());
    }

    #[test]
    fn workspace_lists_namespaces() {
        let tmp = tempfile::tempdir().unwrap();
        for ns in ["openshift-etcd", "default"] {
            std::fs::create_dir_all(tmp.path().join(NAMESPACES_DIR).join(ns)).unwrap();
        }
        std::fs::write(tmp.path().join(NAMESPACES_DIR).join("stray.txt"), "x").unwrap();

        let ws = ResolvedWorkspace {
            id: "x".into(),
            root: tmp.path().to_path_buf(),
            namespace: DEFAULT_NAMESPACE.into(),
        };
        assert_eq!(ws.list_namespaces().unwrap(), vec!["default", "openshift-etcd"]);
        assert!(ws.cluster_scoped_dir().ends_with(CLUSTER_SCOPED_DIR));
    }
}
