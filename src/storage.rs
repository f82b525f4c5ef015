//! Storage collaborators, keyed by a provider discriminator.
//!
//! Adding a provider means adding an adapter implementation and registering
//! it in a [`StorageSet`], not patching conditionals through the pipeline.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::models::enums::StorageProvider;
use crate::pipeline::ProviderError;

/// One storage backend. Paths are provider-relative strings; the adapter
/// owns the mapping to its backing store.
pub trait StorageAdapter {
    fn provider(&self) -> StorageProvider;

    /// Store bytes under `folder_path/filename`, creating the folder if
    /// needed. Returns the stored path.
    fn upload_file(
        &self,
        bytes: &[u8],
        filename: &str,
        folder_path: &str,
    ) -> Result<String, ProviderError>;

    fn download_file(&self, path: &str) -> Result<Vec<u8>, ProviderError>;

    fn create_folder(&self, path: &str) -> Result<(), ProviderError>;
}

/// The adapters available to a deployment, looked up by provider.
/// Cheap to clone; the intake path and the validator share the same
/// adapters.
#[derive(Clone)]
pub struct StorageSet {
    adapters: Vec<Arc<dyn StorageAdapter + Send + Sync>>,
}

impl StorageSet {
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    pub fn register(mut self, adapter: Arc<dyn StorageAdapter + Send + Sync>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn adapter_for(&self, provider: StorageProvider) -> Option<&dyn StorageAdapter> {
        self.adapters
            .iter()
            .find(|a| a.provider() == provider)
            .map(|a| a.as_ref() as &dyn StorageAdapter)
    }
}

impl Default for StorageSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Filesystem-backed adapter rooted at a base directory.
pub struct LocalStorageAdapter {
    root: PathBuf,
}

impl LocalStorageAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl StorageAdapter for LocalStorageAdapter {
    fn provider(&self) -> StorageProvider {
        StorageProvider::Local
    }

    fn upload_file(
        &self,
        bytes: &[u8],
        filename: &str,
        folder_path: &str,
    ) -> Result<String, ProviderError> {
        self.create_folder(folder_path)?;
        let relative = format!("{}/{}", folder_path.trim_end_matches('/'), filename);
        std::fs::write(self.resolve(&relative), bytes)
            .map_err(|e| ProviderError::Transient(format!("Write failed for {relative}: {e}")))?;
        Ok(relative)
    }

    fn download_file(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        let full = self.resolve(path);
        match std::fs::read(&full) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ProviderError::Permanent(
                format!("Stored file missing: {path}"),
            )),
            Err(e) => Err(ProviderError::Transient(format!(
                "Read failed for {path}: {e}"
            ))),
        }
    }

    fn create_folder(&self, path: &str) -> Result<(), ProviderError> {
        std::fs::create_dir_all(self.resolve(path))
            .map_err(|e| ProviderError::Transient(format!("Cannot create folder {path}: {e}")))
    }
}

/// In-memory adapter for tests. Also usable as a stand-in for an
/// object-store or drive provider in adapter-selection tests.
pub struct MemoryStorageAdapter {
    provider: StorageProvider,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorageAdapter {
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            files: Mutex::new(HashMap::new()),
        }
    }
}

impl StorageAdapter for MemoryStorageAdapter {
    fn provider(&self) -> StorageProvider {
        self.provider
    }

    fn upload_file(
        &self,
        bytes: &[u8],
        filename: &str,
        folder_path: &str,
    ) -> Result<String, ProviderError> {
        let path = format!("{}/{}", folder_path.trim_end_matches('/'), filename);
        self.files.lock().unwrap().insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    fn download_file(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| ProviderError::Permanent(format!("Stored file missing: {path}")))
    }

    fn create_folder(&self, _path: &str) -> Result<(), ProviderError> {
        Ok(())
    }
}
