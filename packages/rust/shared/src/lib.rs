//! Shared types, error model, and configuration for the must-gather tooling.
//!
//! This crate is the foundation depended on by all other crates in the workspace.
//! It provides:
//! - [`MustGatherError`] — the unified error type
//! - Domain types ([`Context`], [`ContextFile`], [`ResolvedWorkspace`], [`Format`])
//! - Configuration (context file location)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{CONTEXT_FILE_NAME, config_dir, default_context_file, resolve_context_file};
pub use error::{MustGatherError, Result};
pub use types::{
    CLUSTER_SCOPED_DIR, CURRENT_MARKER, Context, ContextFile, DEFAULT_NAMESPACE, Format,
    NAMESPACES_DIR, ResolvedWorkspace, TIMESTAMP_FILE, list_subdirectory_names, validate_context_id,
};
