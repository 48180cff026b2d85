//! Workspace discovery and selection for must-gather inputs.
//!
//! This crate ties together input sniffing, archive extraction, root
//! discovery and the context store into the `use` flow, and resolves the
//! active workspace that every other command operates on.

pub mod locator;
pub mod resolver;

pub use locator::locate_root;
pub use resolver::{ProgressReporter, SilentProgress, WorkspaceResolver};
