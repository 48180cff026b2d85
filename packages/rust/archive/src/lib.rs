//! Input classification and archive extraction.
//!
//! A must-gather arrives either as a directory or as an archive of unknown
//! type. [`classify`] sniffs the input without consuming it, and [`extract`]
//! dispatches on the resulting [`Format`] to stream the archive into a
//! destination directory.

mod extract;
mod sniff;

pub use extract::{
    ExtractOutcome, ExtractProgress, NoProgress, extract, extract_tar, extract_tar_gz,
    extract_zip,
};
pub use sniff::classify;

pub use mustgather_shared::Format;
