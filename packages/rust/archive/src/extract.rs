//! Streamed extraction of tar, tar.gz and zip archives.
//!
//! Entries are written beneath the destination with their relative paths
//! preserved. The first directory entry in archive order is reported as the
//! nominal root; callers treat it as a hint only, since archives may nest an
//! extra wrapper level above the real workspace.
//!
//! Extraction is not transactional: on failure, files already written stay
//! on disk.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use mustgather_shared::{Format, MustGatherError, Result};
use tracing::{debug, info, instrument, warn};

/// Result of a successful extraction.
#[derive(Debug, Clone)]
pub struct ExtractOutcome {
    /// Directory everything was written under.
    pub destination: PathBuf,
    /// First directory entry seen, joined onto the destination.
    pub nominal_root: Option<PathBuf>,
    /// Number of entries written.
    pub entries: usize,
}

/// Observer notified once per written entry.
pub trait ExtractProgress {
    fn entry(&self, _path: &Path, _written: usize) {}
}

/// Progress sink that ignores every notification.
pub struct NoProgress;

impl ExtractProgress for NoProgress {}

/// Extract `src` into `dest` according to an already sniffed `format`.
pub fn extract(
    format: Format,
    src: &Path,
    dest: &Path,
    progress: &dyn ExtractProgress,
) -> Result<ExtractOutcome> {
    match format {
        Format::Gzip => extract_tar_gz(src, dest, progress),
        Format::Tar => extract_tar(src, dest, progress),
        Format::Zip => extract_zip(src, dest, progress),
        Format::Directory | Format::Unknown => Err(MustGatherError::UnsupportedFormat {
            path: src.to_path_buf(),
        }),
    }
}

/// Extract a plain tar archive.
#[instrument(skip_all, fields(src = %src.display(), dest = %dest.display()))]
pub fn extract_tar(src: &Path, dest: &Path, progress: &dyn ExtractProgress) -> Result<ExtractOutcome> {
    let file = File::open(src).map_err(|e| MustGatherError::io(src, e))?;
    unpack_tar(BufReader::new(file), src, dest, progress)
}

/// Extract a gzip-compressed tar archive.
#[instrument(skip_all, fields(src = %src.display(), dest = %dest.display()))]
pub fn extract_tar_gz(
    src: &Path,
    dest: &Path,
    progress: &dyn ExtractProgress,
) -> Result<ExtractOutcome> {
    let file = File::open(src).map_err(|e| MustGatherError::io(src, e))?;
    unpack_tar(GzDecoder::new(BufReader::new(file)), src, dest, progress)
}

fn unpack_tar<R: Read>(
    reader: R,
    src: &Path,
    dest: &Path,
    progress: &dyn ExtractProgress,
) -> Result<ExtractOutcome> {
    std::fs::create_dir_all(dest).map_err(|e| MustGatherError::io(dest, e))?;

    let mut archive = tar::Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|e| MustGatherError::corrupt_archive(src, "<archive header>", e))?;

    let mut nominal_root = None;
    let mut written = 0usize;

    for entry in entries {
        let mut entry = entry.map_err(|e| {
            MustGatherError::corrupt_archive(src, format!("<entry #{}>", written + 1), e)
        })?;
        let rel = entry
            .path()
            .map_err(|e| MustGatherError::corrupt_archive(src, "<unreadable path>", e))?
            .into_owned();
        let name = rel.display().to_string();
        let is_dir = entry.header().entry_type().is_dir();

        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| MustGatherError::corrupt_archive(src, &name, e))?;
        if !unpacked {
            warn!(entry = %name, "skipping entry that escapes the destination");
            continue;
        }

        if is_dir && nominal_root.is_none() {
            nominal_root = Some(dest.join(&rel));
        }
        written += 1;
        debug!(entry = %name, is_dir, "extracted");
        progress.entry(&rel, written);
    }

    info!(entries = written, "tar extraction complete");
    Ok(ExtractOutcome {
        destination: dest.to_path_buf(),
        nominal_root,
        entries: written,
    })
}

/// Extract a zip archive.
#[instrument(skip_all, fields(src = %src.display(), dest = %dest.display()))]
pub fn extract_zip(src: &Path, dest: &Path, progress: &dyn ExtractProgress) -> Result<ExtractOutcome> {
    std::fs::create_dir_all(dest).map_err(|e| MustGatherError::io(dest, e))?;

    let file = File::open(src).map_err(|e| MustGatherError::io(src, e))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| MustGatherError::corrupt_archive(src, "<central directory>", e))?;

    let mut nominal_root = None;
    let mut written = 0usize;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| MustGatherError::corrupt_archive(src, format!("<entry #{}>", i + 1), e))?;
        let name = file.name().to_string();

        let Some(rel) = file.enclosed_name() else {
            warn!(entry = %name, "skipping entry that escapes the destination");
            continue;
        };
        let outpath = dest.join(&rel);

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| MustGatherError::corrupt_archive(src, &name, e))?;
            if nominal_root.is_none() {
                nominal_root = Some(outpath.clone());
            }
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| MustGatherError::corrupt_archive(src, &name, e))?;
            }
            let mut outfile = File::create(&outpath)
                .map_err(|e| MustGatherError::corrupt_archive(src, &name, e))?;
            std::io::copy(&mut file, &mut outfile)
                .map_err(|e| MustGatherError::corrupt_archive(src, &name, e))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = file.unix_mode() {
                    // Permission bits only, and always owner-readable.
                    let mode = (mode & 0o777) | 0o400;
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))
                        .map_err(|e| MustGatherError::corrupt_archive(src, &name, e))?;
                }
            }
        }

        written += 1;
        debug!(entry = %name, "extracted");
        progress.entry(&rel, written);
    }

    info!(entries = written, "zip extraction complete");
    Ok(ExtractOutcome {
        destination: dest.to_path_buf(),
        nominal_root,
        entries: written,
    })
}
