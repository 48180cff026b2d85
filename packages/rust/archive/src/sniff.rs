//! Format sniffing.
//!
//! Magic bytes identify gzip and zip. Tar has no reliable magic, so it is
//! recognized structurally by asking a tar reader for its first header.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use mustgather_shared::{Format, MustGatherError, Result};
use tracing::{debug, instrument};

/// Number of leading bytes inspected for magic numbers.
const SNIFF_LEN: usize = 512;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZIP_LOCAL_HEADER_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE_MAGIC: &[u8] = b"PK\x05\x06";

/// Classify `path` as a directory or one of the supported archive formats.
///
/// Never consumes a handle the extractor reuses: every probe opens the file
/// fresh and drops it before returning. Unrecognized content yields
/// [`Format::Unknown`] rather than an error.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn classify(path: &Path) -> Result<Format> {
    let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MustGatherError::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => MustGatherError::io(path, e),
    })?;

    if meta.is_dir() {
        return Ok(Format::Directory);
    }

    let head = read_head(path)?;

    let format = if head.starts_with(GZIP_MAGIC) {
        Format::Gzip
    } else if probe_tar(path) {
        Format::Tar
    } else if head.starts_with(ZIP_LOCAL_HEADER_MAGIC) || head.starts_with(ZIP_EMPTY_ARCHIVE_MAGIC)
    {
        Format::Zip
    } else {
        Format::Unknown
    };

    debug!(%format, head_len = head.len(), "classified input");
    Ok(format)
}

/// Read up to [`SNIFF_LEN`] leading bytes.
fn read_head(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| MustGatherError::io(path, e))?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| MustGatherError::io(path, e))?;
    Ok(head)
}

/// True when a tar reader can decode at least one header from `path`.
fn probe_tar(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut archive = tar::Archive::new(file);
    let Ok(mut entries) = archive.entries() else {
        return false;
    };
    matches!(entries.next(), Some(Ok(_)))
}
