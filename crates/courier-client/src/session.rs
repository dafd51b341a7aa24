use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use courier_core::SessionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// File name used by [`FileSessionStore`] inside the state directory.
pub const SESSION_FILE: &str = "session.json";

/// Failures persisting the sticky session.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Underlying file I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Stored session could not be encoded or decoded.
    #[error("session json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// External persistence for the sticky session id.
pub trait SessionStore: Send + Sync {
    fn write_session_id(&self, id: &SessionId) -> Result<(), SessionStoreError>;

    fn read_session_id(&self) -> Option<SessionId>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session_id: Mutex<Option<SessionId>>,
}

impl SessionStore for MemorySessionStore {
    fn write_session_id(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        *self
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id.clone());
        Ok(())
    }

    fn read_session_id(&self) -> Option<SessionId> {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    session_id: SessionId,
}

/// Session store backed by a JSON file under the state directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Stores the session in `state_dir/session.json`, creating the directory.
    pub fn new(state_dir: impl AsRef<Path>) -> Result<Self, SessionStoreError> {
        let state_dir = state_dir.as_ref();
        fs::create_dir_all(state_dir)?;
        Ok(Self {
            path: state_dir.join(SESSION_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn write_session_id(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        let json = serde_json::to_vec_pretty(&PersistedSession {
            session_id: id.clone(),
        })?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn read_session_id(&self) -> Option<SessionId> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(error = %err, path = %self.path.display(), "failed to read session file");
                return None;
            }
        };

        match serde_json::from_slice::<PersistedSession>(&bytes) {
            Ok(persisted) => Some(persisted.session_id),
            Err(err) => {
                tracing::warn!(error = %err, path = %self.path.display(), "ignoring corrupt session file");
                None
            }
        }
    }
}

/// Read-only view of the current sticky session.
#[derive(Debug, Clone)]
pub struct SessionReader(watch::Receiver<Option<SessionId>>);

impl SessionReader {
    pub fn current(&self) -> Option<SessionId> {
        self.0.borrow().clone()
    }
}

/// Holds the sticky session and persists each change exactly once.
pub struct SessionTracker {
    current: watch::Sender<Option<SessionId>>,
    store: Option<Arc<dyn SessionStore>>,
}

impl SessionTracker {
    pub fn new(store: Option<Arc<dyn SessionStore>>) -> Self {
        let (current, _) = watch::channel(None);
        Self { current, store }
    }

    /// Session to attach to the next request, falling back to the store.
    pub fn session_id(&self) -> Option<SessionId> {
        self.current.borrow().clone().or_else(|| {
            self.store
                .as_ref()
                .and_then(|store| store.read_session_id())
        })
    }

    pub fn reader(&self) -> SessionReader {
        SessionReader(self.current.subscribe())
    }

    /// Stores `incoming` if it differs from the current id.
    ///
    /// Returns whether the id changed. Absent ids and repeats are no-ops.
    pub fn reconcile(&self, incoming: Option<&SessionId>) -> bool {
        let Some(incoming) = incoming else {
            return false;
        };

        let changed = self.current.send_if_modified(|current| {
            if current.as_ref() == Some(incoming) {
                return false;
            }
            *current = Some(incoming.clone());
            true
        });
        if !changed {
            return false;
        }

        tracing::debug!(session_id = %incoming, "session changed");
        if let Some(store) = &self.store
            && let Err(err) = store.write_session_id(incoming)
        {
            tracing::error!(error = %err, "failed to persist session id");
        }
        true
    }
}
