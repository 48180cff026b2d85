//! Durable store of named workspace contexts.
//!
//! The [`ContextStore`] wraps the JSON context file: it is loaded fully into
//! memory, mutated, and rewritten atomically by [`ContextStore::save`].
//!
//! **Rules:**
//! - At most one context is current; every mutator preserves this.
//! - A missing or malformed file loads as an empty store.
//! - No file locking: concurrent invocations race and the last writer wins.

use std::io::Write;
use std::path::{Path, PathBuf};

use mustgather_shared::{
    Context, ContextFile, DEFAULT_NAMESPACE, MustGatherError, NAMESPACES_DIR, Result,
    list_subdirectory_names, validate_context_id,
};
use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of generated context ids.
const GENERATED_ID_LEN: usize = 8;

/// In-memory view of the context file plus the location it is saved to.
#[derive(Debug, Clone)]
pub struct ContextStore {
    path: PathBuf,
    file: ContextFile,
}

impl ContextStore {
    /// Load the store at `path`.
    ///
    /// A missing file is the normal first-run case. An unreadable or
    /// malformed file is logged and replaced by an empty store.
    pub fn load(path: &Path) -> Self {
        let file = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<ContextFile>(&content) {
                Ok(file) => file,
                Err(e) => {
                    let err = MustGatherError::StoreCorrupt {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    };
                    tracing::warn!(error = %err, "starting from an empty context store");
                    ContextFile::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(?path, "context file not found, starting empty");
                ContextFile::default()
            }
            Err(e) => {
                let err = MustGatherError::StoreCorrupt {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                };
                tracing::warn!(error = %err, "starting from an empty context store");
                ContextFile::default()
            }
        };

        let mut store = Self {
            path: path.to_path_buf(),
            file,
        };
        store.demote_extra_currents();
        store
    }

    /// Create an empty store that will be saved to `path`.
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: ContextFile::default(),
        }
    }

    /// Atomically overwrite the context file (write to a temp file, then rename).
    pub fn save(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|e| MustGatherError::io(parent, e))?;

        let json = serde_json::to_vec_pretty(&self.file)
            .map_err(|e| MustGatherError::io(&self.path, std::io::Error::other(e)))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(parent).map_err(|e| MustGatherError::io(parent, e))?;
        tmp.write_all(&json)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| MustGatherError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| MustGatherError::io(&self.path, e.error))?;

        tracing::info!(path = ?self.path, contexts = self.file.contexts.len(), "saved context store");
        Ok(())
    }

    /// Location this store saves to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All contexts in insertion order.
    pub fn contexts(&self) -> &[Context] {
        &self.file.contexts
    }

    /// The current context, if any.
    pub fn current(&self) -> Option<&Context> {
        self.file.contexts.iter().find(|c| c.current)
    }

    /// First context whose id or path equals `key`.
    pub fn find(&self, key: &str) -> Option<&Context> {
        self.file.contexts.iter().find(|c| c.matches(key))
    }

    // -----------------------------------------------------------------------
    // Mutators
    // -----------------------------------------------------------------------

    /// Promote an existing context (by id or path) to current.
    pub fn activate(&mut self, key: &str) -> Option<&Context> {
        let idx = self.file.contexts.iter().position(|c| c.matches(key))?;
        self.promote(idx);
        Some(&self.file.contexts[idx])
    }

    /// Find the context for `root` (or for `explicit_id` when given) and make it
    /// the only current one, creating it if nothing matches.
    ///
    /// An explicit id takes precedence: an entry with that id is rebound to
    /// `root`, and an entry found by path is renamed to it.
    pub fn upsert_and_activate(&mut self, root: &Path, explicit_id: Option<&str>) -> Result<&Context> {
        if let Some(id) = explicit_id {
            validate_context_id(id)?;
        }

        let by_id = explicit_id.and_then(|id| self.file.contexts.iter().position(|c| c.id == id));
        let idx = match by_id {
            Some(idx) if self.file.contexts[idx].path == root => idx,
            Some(idx) => {
                let ctx = &mut self.file.contexts[idx];
                tracing::info!(id = %ctx.id, old = ?ctx.path, new = ?root, "rebinding context");
                ctx.path = root.to_path_buf();
                ctx.default_namespace = DEFAULT_NAMESPACE.into();
                let id = ctx.id.clone();

                // The rebound entry now owns `root`; any other holder goes.
                let before = self.file.contexts.len();
                self.file.contexts.retain(|c| c.id == id || c.path != root);
                let dropped = before - self.file.contexts.len();
                if dropped > 0 {
                    tracing::info!(%id, dropped, "dropped contexts superseded by rebinding");
                }
                self.file
                    .contexts
                    .iter()
                    .position(|c| c.id == id)
                    .unwrap_or(idx)
            }
            None => match self.file.contexts.iter().position(|c| c.path == root) {
                Some(idx) => {
                    if let Some(id) = explicit_id {
                        self.file.contexts[idx].id = id.to_string();
                    }
                    idx
                }
                None => {
                    let id = match explicit_id {
                        Some(id) => id.to_string(),
                        None => self.fresh_id(),
                    };
                    tracing::info!(%id, path = ?root, "creating context");
                    self.file.contexts.push(Context {
                        id,
                        path: root.to_path_buf(),
                        current: false,
                        default_namespace: DEFAULT_NAMESPACE.into(),
                    });
                    self.file.contexts.len() - 1
                }
            },
        };

        self.promote(idx);
        Ok(&self.file.contexts[idx])
    }

    /// Remove every context whose id or path equals `key`. Returns how many went.
    pub fn remove(&mut self, key: &str) -> usize {
        let before = self.file.contexts.len();
        self.file.contexts.retain(|c| !c.matches(key));
        let removed = before - self.file.contexts.len();
        tracing::info!(key, removed, "removed contexts");
        removed
    }

    /// Remove every context matched by any of `keys`, in one step.
    /// Returns how many went.
    pub fn remove_any(&mut self, keys: &[String]) -> usize {
        let before = self.file.contexts.len();
        self.file
            .contexts
            .retain(|c| !keys.iter().any(|key| c.matches(key)));
        let removed = before - self.file.contexts.len();
        tracing::info!(?keys, removed, "removed contexts");
        removed
    }

    /// Drop every context. Returns how many went.
    pub fn remove_all(&mut self) -> usize {
        let removed = self.file.contexts.len();
        self.file.contexts.clear();
        tracing::info!(removed, "removed all contexts");
        removed
    }

    /// Set the default namespace of the context with `id`.
    ///
    /// The namespace must exist as a directory under `<path>/namespaces`.
    pub fn set_default_namespace(&mut self, id: &str, namespace: &str) -> Result<&Context> {
        let idx = self
            .file
            .contexts
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| MustGatherError::ContextNotFound { key: id.into() })?;

        let root = self.file.contexts[idx].path.clone();
        let available = list_subdirectory_names(&root.join(NAMESPACES_DIR))?;
        if !available.iter().any(|ns| ns == namespace) {
            return Err(MustGatherError::UnknownNamespace {
                namespace: namespace.into(),
                root,
            });
        }

        let ctx = &mut self.file.contexts[idx];
        ctx.default_namespace = namespace.into();
        tracing::info!(id, namespace, "default namespace changed");
        Ok(ctx)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn promote(&mut self, idx: usize) {
        for (i, ctx) in self.file.contexts.iter_mut().enumerate() {
            ctx.current = i == idx;
        }
    }

    /// Hand-edited files may mark several entries; keep the first.
    fn demote_extra_currents(&mut self) {
        let mut seen = false;
        for ctx in &mut self.file.contexts {
            if ctx.current {
                if seen {
                    tracing::warn!(id = %ctx.id, "demoting extra current context");
                    ctx.current = false;
                }
                seen = true;
            }
        }
    }

    fn fresh_id(&self) -> String {
        loop {
            let id: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(GENERATED_ID_LEN)
                .map(char::from)
                .collect();
            if !self.file.contexts.iter().any(|c| c.id == id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, ContextStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = ContextStore::load(&tmp.path().join("contexts.json"));
        (tmp, store)
    }

    fn current_count(store: &ContextStore) -> usize {
        store.contexts().iter().filter(|c| c.current).count()
    }

    #[test]
    fn missing_file_loads_empty() {
        let (_tmp, store) = test_store();
        assert!(store.contexts().is_empty());
        assert!(store.current().is_none());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("contexts.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = ContextStore::load(&path);
        assert!(store.contexts().is_empty());
    }

    #[test]
    fn upsert_creates_then_promotes() {
        let (_tmp, mut store) = test_store();

        let first = store
            .upsert_and_activate(Path::new("/data/one"), None)
            .unwrap()
            .clone();
        assert_eq!(first.id.len(), GENERATED_ID_LEN);
        assert_eq!(first.default_namespace, DEFAULT_NAMESPACE);
        assert!(first.current);

        store
            .upsert_and_activate(Path::new("/data/two"), None)
            .unwrap();
        assert_eq!(current_count(&store), 1);
        assert_eq!(store.current().unwrap().path, Path::new("/data/two"));

        let again = store
            .upsert_and_activate(Path::new("/data/one"), None)
            .unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(store.contexts().len(), 2);
        assert_eq!(current_count(&store), 1);
    }

    #[test]
    fn explicit_id_is_used_and_rebinds() {
        let (_tmp, mut store) = test_store();

        store
            .upsert_and_activate(Path::new("/data/one"), Some("prod"))
            .unwrap();
        assert_eq!(store.current().unwrap().id, "prod");

        store
            .upsert_and_activate(Path::new("/data/two"), Some("prod"))
            .unwrap();
        assert_eq!(store.contexts().len(), 1);
        assert_eq!(store.current().unwrap().path, Path::new("/data/two"));

        let err = store
            .upsert_and_activate(Path::new("/data/three"), Some("bad id"))
            .unwrap_err();
        assert!(matches!(err, MustGatherError::Validation { .. }));
    }

    #[test]
    fn rebinding_an_id_drops_the_other_holder_of_the_path() {
        let (_tmp, mut store) = test_store();
        store
            .upsert_and_activate(Path::new("/data/a"), Some("x"))
            .unwrap();
        store.upsert_and_activate(Path::new("/data/b"), None).unwrap();

        store
            .upsert_and_activate(Path::new("/data/b"), Some("x"))
            .unwrap();

        let holders: Vec<&str> = store
            .contexts()
            .iter()
            .filter(|c| c.path == Path::new("/data/b"))
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(holders, vec!["x"]);
        assert_eq!(store.contexts().len(), 1);
        assert_eq!(store.current().unwrap().id, "x");
        assert_eq!(current_count(&store), 1);
    }

    #[test]
    fn remove_any_counts_each_context_once() {
        let (_tmp, mut store) = test_store();
        store
            .upsert_and_activate(Path::new("/data/one"), Some("one"))
            .unwrap();
        store
            .upsert_and_activate(Path::new("/data/two"), Some("two"))
            .unwrap();

        let keys = vec!["/data/one".to_string(), "one".to_string()];
        assert_eq!(store.remove_any(&keys), 1);
        assert_eq!(store.contexts().len(), 1);
        assert_eq!(store.remove_any(&["missing".to_string()]), 0);
    }

    #[test]
    fn activate_by_id_or_path() {
        let (_tmp, mut store) = test_store();
        store
            .upsert_and_activate(Path::new("/data/one"), Some("one"))
            .unwrap();
        store
            .upsert_and_activate(Path::new("/data/two"), Some("two"))
            .unwrap();

        assert_eq!(store.activate("one").unwrap().id, "one");
        assert_eq!(store.activate("/data/two").unwrap().id, "two");
        assert!(store.activate("three").is_none());
        assert_eq!(store.current().unwrap().id, "two");
        assert_eq!(current_count(&store), 1);
    }

    #[test]
    fn remove_and_remove_all() {
        let (_tmp, mut store) = test_store();
        store
            .upsert_and_activate(Path::new("/data/one"), Some("one"))
            .unwrap();
        store
            .upsert_and_activate(Path::new("/data/two"), Some("two"))
            .unwrap();

        assert_eq!(store.remove("/data/two"), 1);
        assert!(store.current().is_none());
        assert_eq!(store.remove("missing"), 0);
        assert_eq!(store.remove_all(), 1);
        assert!(store.contexts().is_empty());
    }

    #[test]
    fn save_then_load_preserves_contexts() {
        let (tmp, mut store) = test_store();
        store
            .upsert_and_activate(Path::new("/data/one"), Some("one"))
            .unwrap();
        store
            .upsert_and_activate(Path::new("/data/two"), Some("two"))
            .unwrap();
        store.save().unwrap();

        let raw = std::fs::read_to_string(tmp.path().join("contexts.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["contexts"][0]["current"], "");
        assert_eq!(json["contexts"][1]["current"], "*");

        let reloaded = ContextStore::load(&tmp.path().join("contexts.json"));
        assert_eq!(reloaded.contexts(), store.contexts());
    }

    #[test]
    fn save_creates_parent_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("contexts.json");
        let store = ContextStore::empty(&path);
        store.save().unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn load_keeps_only_first_current() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("contexts.json");
        std::fs::write(
            &path,
            r#"{"contexts": [
                {"id": "a", "path": "/a", "current": "*", "project": "default"},
                {"id": "b", "path": "/b", "current": "*", "project": "default"}
            ]}"#,
        )
        .unwrap();

        let store = ContextStore::load(&path);
        assert_eq!(current_count(&store), 1);
        assert_eq!(store.current().unwrap().id, "a");
    }

    #[test]
    fn default_namespace_is_validated() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("mg");
        std::fs::create_dir_all(root.join(NAMESPACES_DIR).join("openshift-etcd")).unwrap();

        let mut store = ContextStore::load(&tmp.path().join("contexts.json"));
        let id = store.upsert_and_activate(&root, None).unwrap().id.clone();

        let ctx = store.set_default_namespace(&id, "openshift-etcd").unwrap();
        assert_eq!(ctx.default_namespace, "openshift-etcd");

        let err = store.set_default_namespace(&id, "kube-system").unwrap_err();
        assert!(matches!(err, MustGatherError::UnknownNamespace { .. }));
        assert_eq!(store.current().unwrap().default_namespace, "openshift-etcd");
    }
}
