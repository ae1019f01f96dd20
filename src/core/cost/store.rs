use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::core::config::{StoreBackend, StoreConfig};
use crate::core::error::CostError;
use crate::core::models::snapshot::WeeklySnapshot;
use crate::core::models::state::WeeklyCostState;

const STATE_VERSION: u64 = 1;

/// Durable home of the accumulator state and its latest snapshot.
///
/// `save` persists both halves in one step and refuses to overwrite a state
/// whose revision moved since `load`.
pub trait StateStore: Send + Sync {
    /// Persisted state, or the zero state if nothing was ever saved.
    fn load(&self) -> Result<WeeklyCostState, CostError>;

    /// Persist `state` and `snapshot` together, provided the stored revision
    /// still equals `expected_revision`.
    fn save(
        &self,
        expected_revision: u64,
        state: &WeeklyCostState,
        snapshot: &WeeklySnapshot,
    ) -> Result<(), CostError>;

    /// Latest snapshot, `None` if nothing was ever ingested.
    fn read_snapshot(&self) -> Result<Option<WeeklySnapshot>, CostError>;

    /// Operator reset: forget state and snapshot.
    fn clear(&self) -> Result<(), CostError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredDocument {
    #[serde(default)]
    version: u64,
    #[serde(default)]
    state: WeeklyCostState,
    #[serde(default)]
    snapshot: Option<WeeklySnapshot>,
}

impl StoredDocument {
    fn new(state: &WeeklyCostState, snapshot: &WeeklySnapshot) -> Self {
        Self {
            version: STATE_VERSION,
            state: state.clone(),
            snapshot: Some(snapshot.clone()),
        }
    }
}

fn check_revision(current: u64, expected: u64) -> Result<(), CostError> {
    if current != expected {
        return Err(CostError::ConcurrentWriteConflict {
            expected,
            found: current,
        });
    }
    Ok(())
}

/// Default state file, respecting XDG_DATA_HOME.
pub fn default_state_path() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join(".local")
                .join("share")
        });
    base.join("dialcost").join("weekly-cost.json")
}

/// Build the store selected in config.
pub fn open(config: &StoreConfig) -> Arc<dyn StateStore> {
    match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::default()),
        StoreBackend::File => {
            let path = config.path.clone().unwrap_or_else(default_state_path);
            Arc::new(FileStore::new(path))
        }
    }
}

/// JSON file store. Writes go to a sibling temp file that is then renamed
/// over the target, so readers see either the old pair or the new one.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_document(&self) -> Result<Option<StoredDocument>, CostError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CostError::unavailable(&self.path, e)),
        };
        let doc: StoredDocument = serde_json::from_str(&content)
            .map_err(|e| CostError::unavailable(&self.path, format!("corrupt state file: {}", e)))?;
        if doc.version != STATE_VERSION {
            return Err(CostError::unavailable(
                &self.path,
                format!("unsupported state version {}", doc.version),
            ));
        }
        if let Some(violation) = doc.state.violation() {
            return Err(CostError::unavailable(&self.path, violation));
        }
        Ok(Some(doc))
    }

    fn write_document(&self, doc: &StoredDocument) -> Result<(), CostError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CostError::unavailable(&self.path, e))?;
        }
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| CostError::unavailable(&self.path, e))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| CostError::unavailable(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| CostError::unavailable(&self.path, e))?;
        Ok(())
    }
}

impl StateStore for FileStore {
    fn load(&self) -> Result<WeeklyCostState, CostError> {
        Ok(self.read_document()?.map(|d| d.state).unwrap_or_default())
    }

    fn save(
        &self,
        expected_revision: u64,
        state: &WeeklyCostState,
        snapshot: &WeeklySnapshot,
    ) -> Result<(), CostError> {
        // Another process may share the file; re-check right before the rename.
        let current = self.read_document()?.map(|d| d.state.revision).unwrap_or(0);
        check_revision(current, expected_revision)?;
        self.write_document(&StoredDocument::new(state, snapshot))?;
        tracing::debug!(path = %self.path.display(), revision = state.revision, "state saved");
        Ok(())
    }

    fn read_snapshot(&self) -> Result<Option<WeeklySnapshot>, CostError> {
        Ok(self.read_document()?.and_then(|d| d.snapshot))
    }

    fn clear(&self) -> Result<(), CostError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CostError::unavailable(&self.path, e)),
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Mutex<Option<StoredDocument>>,
}

impl MemoryStore {
    fn with_doc<T>(&self, f: impl FnOnce(&mut Option<StoredDocument>) -> T) -> T {
        // The guarded value is replaced wholesale, so a poisoned lock still
        // holds a consistent pair.
        let mut guard = self.doc.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<WeeklyCostState, CostError> {
        Ok(self.with_doc(|doc| doc.as_ref().map(|d| d.state.clone()).unwrap_or_default()))
    }

    fn save(
        &self,
        expected_revision: u64,
        state: &WeeklyCostState,
        snapshot: &WeeklySnapshot,
    ) -> Result<(), CostError> {
        self.with_doc(|doc| {
            let current = doc.as_ref().map(|d| d.state.revision).unwrap_or(0);
            check_revision(current, expected_revision)?;
            *doc = Some(StoredDocument::new(state, snapshot));
            Ok(())
        })
    }

    fn read_snapshot(&self) -> Result<Option<WeeklySnapshot>, CostError> {
        Ok(self.with_doc(|doc| doc.as_ref().and_then(|d| d.snapshot.clone())))
    }

    fn clear(&self) -> Result<(), CostError> {
        self.with_doc(|doc| *doc = None);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
