//! `FileDatabase`: a single-JSON-file `Database` implementation, sufficient
//! for a standalone node. Production deployments are expected to swap this
//! for a real store (Postgres, etc.) behind the same `ocr_runtime::traits::Database`
//! trait; this binary only needs something that satisfies the contract.

use std::path::PathBuf;
use std::sync::Arc;

use ocr_types::ContractConfig;
use ocr_runtime::traits::Database;
use tokio::sync::Mutex;

#[derive(Default, serde::Serialize, serde::Deserialize)]
struct FileDatabaseState {
    config: Option<ContractConfig>,
    pending_transmissions: Vec<PendingTransmission>,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
struct PendingTransmission {
    created_at: u64,
}

/// A `Database` backed by a single JSON file, guarded by an in-process
/// mutex. Reads and writes are request/response and never overlap: the lock
/// is only held for the duration of (de)serialization, never across an
/// `.await` that isn't file I/O.
pub struct FileDatabase {
    path: PathBuf,
    state: Mutex<FileDatabaseState>,
}

impl FileDatabase {
    /// Loads (or initializes) a `FileDatabase` at `path`.
    ///
    /// # Errors
    /// Returns an error if `path` exists but does not contain valid JSON.
    pub fn open(path: PathBuf) -> anyhow::Result<Arc<Self>> {
        let state = if path.exists() {
            let bytes = std::fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            FileDatabaseState::default()
        };
        Ok(Arc::new(Self {
            path,
            state: Mutex::new(state),
        }))
    }

    fn persist(&self, state: &FileDatabaseState) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Database for FileDatabase {
    async fn read_config(&self) -> anyhow::Result<Option<ContractConfig>> {
        Ok(self.state.lock().await.config.clone())
    }

    async fn write_config(&self, config: &ContractConfig) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state.config = Some(config.clone());
        state.pending_transmissions.push(PendingTransmission {
            created_at: unix_now_secs(),
        });
        self.persist(&state)
    }

    async fn delete_pending_transmissions_older_than(&self, older_than: u64) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state.pending_transmissions.retain(|p| p.created_at >= older_than);
        self.persist(&state)
    }
}

fn unix_now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::FileDatabase;
    use ocr_runtime::traits::Database;
    use ocr_types::ConfigDigest;

    fn sample_config() -> ocr_types::ContractConfig {
        ocr_types::ContractConfig {
            config_digest: ConfigDigest::from([1u8; 16]),
            signers: vec![],
            transmitters: vec![],
            threshold: 1,
            encoded_config_version: 1,
            encoded_config: vec![],
        }
    }

    #[tokio::test]
    async fn round_trips_config_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        let db = FileDatabase::open(path.clone()).unwrap();
        assert!(db.read_config().await.unwrap().is_none());

        db.write_config(&sample_config()).await.unwrap();
        assert_eq!(db.read_config().await.unwrap(), Some(sample_config()));

        let reopened = FileDatabase::open(path).unwrap();
        assert_eq!(reopened.read_config().await.unwrap(), Some(sample_config()));
    }

    #[tokio::test]
    async fn gc_prunes_old_pending_transmissions() {
        let dir = tempfile::tempdir().unwrap();
        let db = FileDatabase::open(dir.path().join("db.json")).unwrap();
        db.write_config(&sample_config()).await.unwrap();
        db.delete_pending_transmissions_older_than(u64::MAX).await.unwrap();
        assert!(db.state.lock().await.pending_transmissions.is_empty());
    }
}
