//! File-backed resource store
//!
//! Keeps every managed resource of one kind in `<state_dir>/<kind>.json`.
//! Spec and status are written through separate paths: `update` never touches
//! the stored status and `update_status` never touches metadata or spec.
//!
//! Saves go to a temporary file that is renamed over the state file, so readers
//! see either the old or the new state, never a missing or partial file.

use crate::error::StoreError;
use crate::provider::{ResourceKind, ResourceStore};
use crate::resource::ManagedResource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dbflow_config::StoreConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

const STATE_VERSION: u32 = 1;

/// On-disk layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
struct StateFile<K: ResourceKind> {
    /// State file version
    version: u32,

    /// Last modified timestamp
    updated_at: DateTime<Utc>,

    /// Resources indexed by name
    resources: BTreeMap<String, ManagedResource<K>>,
}

impl<K: ResourceKind> Default for StateFile<K> {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

/// Resource store persisting to a JSON state file
pub struct FileResourceStore<K> {
    state_dir: PathBuf,
    /// Readers share, read-modify-write cycles are exclusive within this process
    lock: RwLock<()>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> FileResourceStore<K> {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
            lock: RwLock::new(()),
            _kind: PhantomData,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.state_dir)
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir
            .join(format!("{}.json", K::KIND.to_ascii_lowercase()))
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir
            .join(format!("{}.json.backup", K::KIND.to_ascii_lowercase()))
    }

    fn temp_path(&self) -> PathBuf {
        self.state_dir
            .join(format!("{}.json.tmp", K::KIND.to_ascii_lowercase()))
    }

    async fn ensure_state_dir(&self) -> Result<(), StoreError> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).await?;
            tracing::debug!("Created state directory: {}", self.state_dir.display());
        }
        Ok(())
    }

    async fn load(&self) -> Result<StateFile<K>, StoreError> {
        let path = self.state_path();
        if path.exists() {
            return Self::read_state(&path).await;
        }

        // The state file was lost after the backup was taken
        let backup = self.backup_path();
        if backup.exists() {
            tracing::warn!(
                "{} missing, recovering {} state from {}",
                path.display(),
                K::KIND,
                backup.display()
            );
            return Self::read_state(&backup).await;
        }

        Ok(StateFile::default())
    }

    async fn read_state(path: &Path) -> Result<StateFile<K>, StoreError> {
        let content = fs::read_to_string(path).await?;
        let state: StateFile<K> = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(StoreError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        Ok(state)
    }

    async fn save(&self, state: &mut StateFile<K>) -> Result<(), StoreError> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let temp = self.temp_path();

        state.updated_at = Utc::now();
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&temp, content).await?;

        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
        }
        fs::rename(&temp, &path).await?;

        tracing::debug!(
            "Saved {} state with {} resources",
            K::KIND,
            state.resources.len()
        );
        Ok(())
    }

    /// Register a new managed resource
    pub async fn create(
        &self,
        resource: &ManagedResource<K>,
    ) -> Result<ManagedResource<K>, StoreError> {
        let _guard = self.lock.write().await;
        let mut state = self.load().await?;

        let name = resource.name().to_string();
        if state.resources.contains_key(&name) {
            return Err(StoreError::AlreadyExists(name));
        }

        state.resources.insert(name, resource.clone());
        self.save(&mut state).await?;
        Ok(resource.clone())
    }

    /// All stored resources ordered by name
    pub async fn list(&self) -> Result<Vec<ManagedResource<K>>, StoreError> {
        let _guard = self.lock.read().await;
        let state = self.load().await?;
        Ok(state.resources.into_values().collect())
    }

    /// Apply `f` to the stored record of `name` and persist the result
    async fn modify<F>(&self, name: &str, f: F) -> Result<ManagedResource<K>, StoreError>
    where
        F: FnOnce(&mut ManagedResource<K>) + Send,
    {
        let _guard = self.lock.write().await;
        let mut state = self.load().await?;

        let stored = state
            .resources
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        f(stored);
        let stored = stored.clone();

        self.save(&mut state).await?;
        Ok(stored)
    }
}

#[async_trait]
impl<K: ResourceKind> ResourceStore<K> for FileResourceStore<K> {
    async fn get(&self, name: &str) -> Result<ManagedResource<K>, StoreError> {
        let _guard = self.lock.read().await;
        let mut state = self.load().await?;
        state
            .resources
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn update(
        &self,
        resource: &ManagedResource<K>,
    ) -> Result<ManagedResource<K>, StoreError> {
        let metadata = resource.metadata.clone();
        let spec = resource.spec.clone();
        self.modify(resource.name(), move |stored| {
            stored.metadata = metadata;
            stored.metadata.updated_at = Utc::now();
            stored.spec = spec;
        })
        .await
    }

    async fn update_status(
        &self,
        resource: &ManagedResource<K>,
    ) -> Result<ManagedResource<K>, StoreError> {
        let status = resource.status.clone();
        self.modify(resource.name(), move |stored| {
            stored.status = status;
        })
        .await
    }
}
