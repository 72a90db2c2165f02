//! Config store: persisted current mode, configured default mode and the
//! protected-mode service list.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use regent_protocol::{Mode, ServiceId};

use crate::errors::StoreError;

pub trait ConfigStore: Send + Sync {
    /// Persist the mode the orchestrator just switched to
    fn set_current_mode(&self, mode: &Mode) -> Result<(), StoreError>;

    /// Last persisted mode, if any
    fn current_mode(&self) -> Result<Option<Mode>, StoreError>;

    /// Mode to unlock into once the bootstrap service is running
    fn default_mode(&self) -> Result<Mode, StoreError>;

    /// Services allowed (with their dependencies) while in protected mode
    fn protected_mode_apps(&self) -> Result<BTreeSet<ServiceId>, StoreError>;
}

/// On-disk layout of `modes.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_mode: Option<Mode>,
    pub default_mode: Mode,
    #[serde(default)]
    pub protected_apps: BTreeSet<ServiceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ModeState {
    pub fn new(default_mode: Mode, protected_apps: BTreeSet<ServiceId>) -> Self {
        Self {
            current_mode: None,
            default_mode,
            protected_apps,
            updated_at: None,
        }
    }
}

/// Config store persisted as `modes.json` in a state directory.
///
/// The seed values are only used when no state file exists yet; after that
/// the file is authoritative.
pub struct FileConfigStore {
    state_dir: PathBuf,
    state: Mutex<ModeState>,
}

impl FileConfigStore {
    pub fn open(state_dir: PathBuf, seed: ModeState) -> Result<Self, StoreError> {
        create_state_dir(&state_dir)?;

        let store = Self {
            state_dir,
            state: Mutex::new(seed),
        };

        match store.load()? {
            Some(state) => {
                debug!("Loaded mode state from {:?}", store.state_path());
                *store.state.lock() = state;
            }
            None => {
                info!("No mode state found, seeding {:?}", store.state_path());
                let seed = store.state.lock().clone();
                store.save(&seed)?;
            }
        }

        Ok(store)
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir.join("modes.json")
    }

    /// Change the configured default mode
    pub fn set_default_mode(&self, mode: Mode) -> Result<(), StoreError> {
        self.update(|state| state.default_mode = mode)
    }

    /// Replace the protected-mode service list
    pub fn set_protected_mode_apps(&self, apps: BTreeSet<ServiceId>) -> Result<(), StoreError> {
        self.update(|state| state.protected_apps = apps)
    }

    pub fn snapshot(&self) -> ModeState {
        self.state.lock().clone()
    }

    /// Apply `f` and persist; memory is only updated if the write succeeds
    fn update(&self, f: impl FnOnce(&mut ModeState)) -> Result<(), StoreError> {
        let mut guard = self.state.lock();
        let mut next = guard.clone();
        f(&mut next);
        next.updated_at = Some(Utc::now());
        self.save(&next)?;
        *guard = next;
        Ok(())
    }

    fn load(&self) -> Result<Option<ModeState>, StoreError> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Parse { path, source: e })
    }

    fn save(&self, state: &ModeState) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(state).map_err(StoreError::Serialize)?;
        write_secure_file(&self.state_path(), content.as_bytes())
    }
}

impl ConfigStore for FileConfigStore {
    fn set_current_mode(&self, mode: &Mode) -> Result<(), StoreError> {
        self.update(|state| state.current_mode = Some(mode.clone()))
    }

    fn current_mode(&self) -> Result<Option<Mode>, StoreError> {
        Ok(self.state.lock().current_mode.clone())
    }

    fn default_mode(&self) -> Result<Mode, StoreError> {
        Ok(self.state.lock().default_mode.clone())
    }

    fn protected_mode_apps(&self) -> Result<BTreeSet<ServiceId>, StoreError> {
        Ok(self.state.lock().protected_apps.clone())
    }
}

/// In-memory config store for embedding and tests
pub struct MemoryConfigStore {
    state: Mutex<ModeState>,
}

impl MemoryConfigStore {
    pub fn new(default_mode: Mode, protected_apps: BTreeSet<ServiceId>) -> Self {
        Self {
            state: Mutex::new(ModeState::new(default_mode, protected_apps)),
        }
    }

    pub fn snapshot(&self) -> ModeState {
        self.state.lock().clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn set_current_mode(&self, mode: &Mode) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.current_mode = Some(mode.clone());
        state.updated_at = Some(Utc::now());
        Ok(())
    }

    fn current_mode(&self) -> Result<Option<Mode>, StoreError> {
        Ok(self.state.lock().current_mode.clone())
    }

    fn default_mode(&self) -> Result<Mode, StoreError> {
        Ok(self.state.lock().default_mode.clone())
    }

    fn protected_mode_apps(&self) -> Result<BTreeSet<ServiceId>, StoreError> {
        Ok(self.state.lock().protected_apps.clone())
    }
}

fn create_state_dir(dir: &Path) -> Result<(), StoreError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)
            .map_err(|e| StoreError::Io {
                path: dir.to_path_buf(),
                source: e,
            })
    }
    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(dir).map_err(|e| StoreError::Io {
            path: dir.to_path_buf(),
            source: e,
        })
    }
}

/// Write through a temp file in the same directory and rename into place
fn write_secure_file(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = path.parent().unwrap_or(Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(io_err)?;
    }

    tmp.write_all(content).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}
