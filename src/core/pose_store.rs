// Reference pose persistence on top of a pluggable key-value store

use crate::models::pose::{PoseError, PoseResult, PoseSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

pub const REFERENCE_POSE_KEY: &str = "reference_pose";
pub const SNAPSHOT_PATH_KEY: &str = "reference_snapshot_path";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Other(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Minimal string key-value storage the host provides
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// In-process store; contents die with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Owns the reference pose record and the reference snapshot image path
#[derive(Clone)]
pub struct PoseStore {
    store: Arc<dyn KeyValueStore>,
    // Serializes reads and writes of the reference record
    reference_lock: Arc<Mutex<()>>,
}

impl PoseStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            reference_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the stored reference pose
    pub async fn save_reference(&self, snapshot: &PoseSnapshot) -> PoseResult<()> {
        let json = snapshot.to_json()?;

        let _guard = self.reference_lock.lock().await;
        self.store
            .set(REFERENCE_POSE_KEY, &json)
            .await
            .map_err(|e| PoseError::StoreError(e.to_string()))?;

        tracing::info!(
            joints = snapshot.joints.len(),
            timestamp = snapshot.timestamp,
            "Saved reference pose"
        );
        Ok(())
    }

    /// The stored reference pose, or `None` if nothing was ever saved
    pub async fn load_reference(&self) -> PoseResult<Option<PoseSnapshot>> {
        let json = {
            let _guard = self.reference_lock.lock().await;
            self.store
                .get(REFERENCE_POSE_KEY)
                .await
                .map_err(|e| PoseError::StoreError(e.to_string()))?
        };

        json.map(|json| PoseSnapshot::from_json(&json)).transpose()
    }

    /// Whether a reference pose record exists. Store failures read as `false`.
    pub async fn has_reference(&self) -> bool {
        let _guard = self.reference_lock.lock().await;
        match self.store.get(REFERENCE_POSE_KEY).await {
            Ok(value) => value.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to check for reference pose");
                false
            }
        }
    }

    pub async fn save_snapshot_path(&self, path: &std::path::Path) -> PoseResult<()> {
        self.store
            .set(SNAPSHOT_PATH_KEY, &path.to_string_lossy())
            .await
            .map_err(|e| PoseError::StoreError(e.to_string()))
    }

    /// The stored snapshot image path, only if the file still exists
    pub async fn load_snapshot_path(&self) -> Option<PathBuf> {
        let stored = match self.store.get(SNAPSHOT_PATH_KEY).await {
            Ok(stored) => stored?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read snapshot path");
                return None;
            }
        };

        let path = PathBuf::from(stored);
        if path.exists() {
            Some(path)
        } else {
            tracing::debug!(path = %path.display(), "Stored snapshot path no longer exists");
            None
        }
    }
}
