//! Workspace selection: the `use` flow and active-workspace resolution.
//!
//! [`WorkspaceResolver`] owns the loaded [`ContextStore`] for one command.
//! Every mutating operation either completes and saves, or returns an error
//! before anything is written.

use std::path::{Path, PathBuf};

use mustgather_archive::{ExtractProgress, Format, classify, extract};
use mustgather_shared::{Context, MustGatherError, ResolvedWorkspace, Result, validate_context_id};
use mustgather_storage::ContextStore;
use rand::Rng;
use tracing::{debug, info, instrument};

use crate::locator::locate_root;

/// Archive suffixes stripped when naming the extraction directory, longest first.
const ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".tar", ".zip", ".gz"];

/// Length of the random suffix used when the natural scratch name is taken.
const SCRATCH_SUFFIX_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for the `use` flow.
pub trait ProgressReporter: ExtractProgress {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the context has been saved.
    fn done(&self, context: &Context);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ExtractProgress for SilentProgress {}

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _context: &Context) {}
}

// ---------------------------------------------------------------------------
// WorkspaceResolver
// ---------------------------------------------------------------------------

/// Façade over sniffing, extraction, root discovery and the context store.
pub struct WorkspaceResolver {
    store: ContextStore,
}

impl WorkspaceResolver {
    /// Load the context store at `context_file`.
    pub fn open(context_file: &Path) -> Self {
        Self {
            store: ContextStore::load(context_file),
        }
    }

    /// Wrap an already loaded store.
    pub fn with_store(store: ContextStore) -> Self {
        Self { store }
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    /// Select a workspace from a directory, an archive, or a stored context id.
    ///
    /// Directories are searched in place. Archives are extracted into a fresh
    /// sibling directory and searched there. Either way the discovered root is
    /// recorded as the only current context and the store is saved.
    #[instrument(skip_all, fields(input = %input, id = ?explicit_id))]
    pub fn resolve_for_use<P: ProgressReporter>(
        &mut self,
        input: &str,
        explicit_id: Option<&str>,
        progress: &P,
    ) -> Result<Context> {
        if let Some(id) = explicit_id {
            validate_context_id(id)?;
        }

        let path = Path::new(input);
        if !path.exists() {
            return self.activate_stored(input, explicit_id, progress);
        }

        progress.phase("Inspecting input");
        let format = classify(path)?;
        info!(%format, "classified input");

        let root = match format {
            Format::Directory => {
                progress.phase("Locating workspace root");
                locate_root(path)?
            }
            Format::Gzip | Format::Tar | Format::Zip => {
                let dest = scratch_dir(path)?;
                progress.phase("Extracting archive");
                let outcome = extract(format, path, &dest, progress)?;
                debug!(
                    entries = outcome.entries,
                    nominal_root = ?outcome.nominal_root,
                    "archive extracted"
                );
                progress.phase("Locating workspace root");
                locate_root(&outcome.destination)?
            }
            Format::Unknown => {
                return Err(MustGatherError::UnsupportedFormat {
                    path: path.to_path_buf(),
                });
            }
        };

        let context = self.store.upsert_and_activate(&root, explicit_id)?.clone();
        self.store.save()?;
        info!(id = %context.id, root = %context.path.display(), "workspace selected");
        progress.done(&context);
        Ok(context)
    }

    /// `use <id>` for an input that is not on disk.
    fn activate_stored<P: ProgressReporter>(
        &mut self,
        key: &str,
        explicit_id: Option<&str>,
        progress: &P,
    ) -> Result<Context> {
        let not_found = || MustGatherError::InputNotFound {
            path: PathBuf::from(key),
        };
        if explicit_id.is_some() {
            return Err(not_found());
        }

        let context = self.store.activate(key).cloned().ok_or_else(not_found)?;
        self.store.save()?;
        info!(id = %context.id, "re-activated stored context");
        progress.done(&context);
        Ok(context)
    }

    /// The workspace every downstream command operates on.
    pub fn resolve_active(&self) -> Result<ResolvedWorkspace> {
        let ctx = self
            .store
            .current()
            .ok_or(MustGatherError::NoActiveWorkspace)?;

        if !ctx.path.is_dir() {
            return Err(MustGatherError::InputNotFound {
                path: ctx.path.clone(),
            });
        }

        Ok(ResolvedWorkspace {
            id: ctx.id.clone(),
            root: ctx.path.clone(),
            namespace: ctx.default_namespace.clone(),
        })
    }

    /// Change the default namespace of the active workspace.
    pub fn set_project(&mut self, namespace: &str) -> Result<ResolvedWorkspace> {
        let id = self
            .store
            .current()
            .map(|c| c.id.clone())
            .ok_or(MustGatherError::NoActiveWorkspace)?;

        self.store.set_default_namespace(&id, namespace)?;
        self.store.save()?;
        self.resolve_active()
    }

    /// Remove every context matching any of `keys`, then save once.
    ///
    /// A key is a context id or a workspace path. A path matches in any
    /// spelling that canonicalizes to a stored root, and a directory that
    /// leads down to a stored root (the wrapper given to `use`) matches that
    /// root as well. Archive paths are not matched; delete their contexts by
    /// id or by the extracted directory. When no key matches, the store is
    /// left untouched and `ContextNotFound` is returned.
    pub fn delete(&mut self, keys: &[String]) -> Result<usize> {
        let candidates: Vec<String> = keys.iter().flat_map(|k| delete_candidates(k)).collect();
        let removed = self.store.remove_any(&candidates);
        if removed == 0 {
            return Err(MustGatherError::ContextNotFound {
                key: keys.join(", "),
            });
        }
        self.store.save()?;
        Ok(removed)
    }

    /// Remove every stored context.
    pub fn delete_all(&mut self) -> Result<usize> {
        let removed = self.store.remove_all();
        self.store.save()?;
        Ok(removed)
    }
}

/// Spellings a delete key may be stored under.
fn delete_candidates(key: &str) -> Vec<String> {
    let mut out = vec![key.to_string()];
    let path = Path::new(key);
    if let Ok(canonical) = std::fs::canonicalize(path) {
        out.push(canonical.to_string_lossy().into_owned());
    }
    if path.is_dir() {
        match locate_root(path) {
            Ok(root) => out.push(root.to_string_lossy().into_owned()),
            Err(e) => debug!(key, error = %e, "no workspace root below delete key"),
        }
    }
    out.dedup();
    out
}

/// Fresh sibling directory of `archive` to extract into.
fn scratch_dir(archive: &Path) -> Result<PathBuf> {
    let archive = std::fs::canonicalize(archive).map_err(|e| MustGatherError::io(archive, e))?;
    let parent = archive.parent().unwrap_or(Path::new("/"));
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stem = ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .filter(|s| !s.is_empty())
        .unwrap_or(file_name.as_str());
    // Suffix-less archives would otherwise collide with themselves.
    let stem = if stem == file_name {
        format!("{stem}.extracted")
    } else {
        stem.to_string()
    };

    let natural = parent.join(&stem);
    if !natural.exists() {
        return Ok(natural);
    }

    loop {
        let suffix: String = rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(SCRATCH_SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        let candidate = parent.join(format!("{stem}-{suffix}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
}
