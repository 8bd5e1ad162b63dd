use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::sync::Mutex;

use super::models::Entitlement;

/// Storage key of the persisted entitlement.
pub const SNAPSHOT_KEY: &str = "central-orbit-subscription";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("failed to replace snapshot: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// key: entitlement-snapshot -> durable {tier, subscribedAt, expiresAt, transactionId}
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Option<Entitlement>, SnapshotError>;
    async fn save(&self, entitlement: &Entitlement) -> Result<(), SnapshotError>;
}

/// JSON file named after the storage key, replaced atomically on every save.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{SNAPSHOT_KEY}.json"))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<Entitlement>, SnapshotError> {
        match tokio::fs::read(self.path()).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, entitlement: &Entitlement) -> Result<(), SnapshotError> {
        let payload = serde_json::to_vec_pretty(entitlement)?;
        let dir = self.dir.clone();
        let path = self.path();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &path, &payload))
            .await
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?
    }
}

fn write_atomically(dir: &Path, path: &Path, payload: &[u8]) -> Result<(), SnapshotError> {
    std::fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(payload)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}

/// In-process store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<Entitlement>>,
    saves: Mutex<usize>,
}

impl MemorySnapshotStore {
    pub fn with_entitlement(entitlement: Entitlement) -> Self {
        Self {
            slot: Mutex::new(Some(entitlement)),
            saves: Mutex::new(0),
        }
    }

    pub async fn stored(&self) -> Option<Entitlement> {
        self.slot.lock().await.clone()
    }

    pub async fn save_count(&self) -> usize {
        *self.saves.lock().await
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Entitlement>, SnapshotError> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, entitlement: &Entitlement) -> Result<(), SnapshotError> {
        *self.slot.lock().await = Some(entitlement.clone());
        *self.saves.lock().await += 1;
        Ok(())
    }
}
