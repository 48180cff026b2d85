//! Context file location.
//!
//! The context store lives at `~/.mustgather/contexts.json` unless the
//! `--config` flag points somewhere else.

use std::path::{Path, PathBuf};

use crate::error::{MustGatherError, Result};

/// Default context file name.
pub const CONTEXT_FILE_NAME: &str = "contexts.json";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".mustgather";

/// Get the path to the config directory (`~/.mustgather/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MustGatherError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the default context file path (`~/.mustgather/contexts.json`).
pub fn default_context_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONTEXT_FILE_NAME))
}

/// Resolve the context file: the explicit override when given, otherwise the default.
pub fn resolve_context_file(override_path: Option<&Path>) -> Result<PathBuf> {
    match override_path {
        Some(path) => {
            tracing::debug!(?path, "using context file override");
            Ok(path.to_path_buf())
        }
        None => default_context_file(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins() {
        let path = resolve_context_file(Some(Path::new("/tmp/custom.json"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.json"));
    }

    #[test]
    fn default_is_home_relative() {
        // Hosts without a home directory report a config error instead.
        if let Ok(path) = default_context_file() {
            assert!(path.ends_with(".mustgather/contexts.json"));
        }
    }
}
