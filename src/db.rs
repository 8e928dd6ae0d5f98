use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::store::StoreData;

/// The persistence collaborator: whole-document load and atomic whole-document save.
pub trait DocumentStore: Send + Sync {
    /// Returns a fully formed snapshot, or [`AppError::CorruptStore`] if it does not parse.
    fn load(&self) -> BoxFuture<'_, Result<StoreData>>;

    /// Replaces the stored document atomically: readers see the old or the new one,
    /// never a partial write.
    fn save<'a>(&'a self, data: &'a StoreData) -> BoxFuture<'a, Result<()>>;
}

/// Stores everything in one JSON file, replaced via write-to-temp + rename.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store".into());
        name.push(".corrupt");
        self.path.with_file_name(name)
    }

    async fn load_file(&self) -> Result<StoreData> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("📂 No store at {}, starting empty", self.path.display());
                return Ok(StoreData::default());
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        match sonic_rs::from_slice::<StoreData>(&bytes) {
            Ok(data) => Ok(data),
            Err(e) => {
                let backup = self.corrupt_path();
                if let Err(copy_err) = tokio::fs::copy(&self.path, &backup).await {
                    tracing::error!("❌ Could not back up corrupt store: {}", copy_err);
                } else {
                    tracing::warn!("⚠️  Corrupt store copied to {}", backup.display());
                }
                Err(AppError::CorruptStore(e.to_string()))
            }
        }
    }

    async fn save_file(&self, data: &StoreData) -> Result<()> {
        let body = sonic_rs::to_string_pretty(data)
            .map_err(|e| AppError::Store(format!("Serialization failed: {}", e)))?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let temp = self.temp_path();
        {
            use tokio::io::AsyncWriteExt;
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(body.as_bytes()).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self) -> BoxFuture<'_, Result<StoreData>> {
        Box::pin(self.load_file())
    }

    fn save<'a>(&'a self, data: &'a StoreData) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.save_file(data))
    }
}

/// Keeps the document in memory. Counts loads so tests can assert cache hits.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: StoreData) -> Self {
        Self {
            data: Mutex::new(data),
            ..Self::default()
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self) -> BoxFuture<'_, Result<StoreData>> {
        Box::pin(async move {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.data.lock().await.clone())
        })
    }

    fn save<'a>(&'a self, data: &'a StoreData) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.data.lock().await = data.clone();
            Ok(())
        })
    }
}

/// Shared handle to the store.
///
/// Every mutation is one load–mutate–save unit under a process-wide lock, so two
/// requests never interleave their read-modify-write of the whole document.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
    write_lock: Arc<Mutex<()>>,
}

impl Database {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_or_reset(&self) -> Result<StoreData> {
        match self.store.load().await {
            Ok(data) => Ok(data),
            Err(AppError::CorruptStore(e)) => {
                tracing::error!("❌ Store is corrupt ({}), reinitializing empty", e);
                Ok(StoreData::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Reads a consistent snapshot of the store.
    pub async fn read(&self) -> Result<StoreData> {
        self.load_or_reset().await
    }

    /// Loads, applies `mutate`, and saves, all under the write lock.
    ///
    /// If `mutate` fails nothing is written.
    pub async fn update<T>(&self, mutate: impl FnOnce(&mut StoreData) -> Result<T>) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load_or_reset().await?;
        let out = mutate(&mut data)?;
        self.store.save(&data).await?;
        Ok(out)
    }

    /// Ensures the store exists on disk (or in memory) with a well-formed structure.
    pub async fn init(&self) -> Result<()> {
        self.update(|_| Ok(())).await
    }
}
