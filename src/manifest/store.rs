use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::error::{ManifestError, Result};
use super::validation::validate;
use super::{Manifest, MediaKind};

/// Save attempts `update` makes before giving up on a contended manifest
const UPDATE_ATTEMPTS: usize = 3;

/// Raw byte storage behind a [`ManifestStore`]
///
/// `read` returns `None` when nothing has been stored yet; the store treats
/// that as a first run rather than an error.
pub trait ManifestBackend: Send + Sync {
    fn read(&self) -> Result<Option<Vec<u8>>>;
    fn write(&self, bytes: &[u8]) -> Result<()>;
    /// Human-readable location used in logs and corruption errors
    fn location(&self) -> String;
}

/// Manifest stored as a single JSON file, replaced atomically on write
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ManifestBackend for FileBackend {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "manifest.json".to_string());
        let tmp = self
            .path
            .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        std::fs::write(&tmp, bytes)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory backend for tests and previews
#[derive(Debug, Default)]
pub struct MemoryBackend {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the backend with raw bytes, bypassing validation
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Mutex::new(Some(bytes.into())),
        }
    }

    /// Replace stored bytes, as another writer would
    pub fn overwrite(&self, bytes: impl Into<Vec<u8>>) {
        *lock(&self.bytes) = Some(bytes.into());
    }
}

impl ManifestBackend for MemoryBackend {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(lock(&self.bytes).clone())
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        *lock(&self.bytes) = Some(bytes.to_vec());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Load/save access to one media kind's manifest
///
/// Saves are optimistic: a manifest can only be written back over the
/// revision it was loaded from. A writer that lost the race gets
/// [`ManifestError::ConcurrentModification`] and should retry against a
/// fresh [`load`](Self::load), which [`update`](Self::update) does itself.
pub struct ManifestStore {
    kind: MediaKind,
    backend: Arc<dyn ManifestBackend>,
    write_lock: Mutex<()>,
}

impl ManifestStore {
    pub fn new(kind: MediaKind, backend: Arc<dyn ManifestBackend>) -> Self {
        Self {
            kind,
            backend,
            write_lock: Mutex::new(()),
        }
    }

    pub fn open_file(kind: MediaKind, path: impl Into<PathBuf>) -> Self {
        let backend = FileBackend::new(path);
        info!(kind = %kind, path = %backend.path().display(), "Using manifest file");
        Self::new(kind, Arc::new(backend))
    }

    pub fn in_memory(kind: MediaKind) -> Self {
        Self::new(kind, Arc::new(MemoryBackend::new()))
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn location(&self) -> String {
        self.backend.location()
    }

    /// Load the manifest, or an empty one if none has been stored yet
    pub fn load(&self) -> Result<Manifest> {
        match self.read_stored()? {
            Some(manifest) => Ok(manifest),
            None => {
                debug!(kind = %self.kind, "No manifest stored yet, starting empty");
                Ok(Manifest::new())
            }
        }
    }

    /// Persist `manifest`, bumping its revision and `lastUpdated`
    pub fn save(&self, manifest: &mut Manifest) -> Result<()> {
        let _guard = lock(&self.write_lock);

        let stored_revision = self.read_stored()?.map_or(0, |stored| stored.revision);
        if stored_revision != manifest.revision {
            warn!(
                kind = %self.kind,
                expected = manifest.revision,
                found = stored_revision,
                "Manifest save rejected, stored revision moved on"
            );
            return Err(ManifestError::ConcurrentModification {
                expected: manifest.revision,
                found: stored_revision,
            });
        }

        let previous = (manifest.revision, manifest.last_updated);
        manifest.revision += 1;
        manifest.last_updated = Utc::now();

        let write = serde_json::to_vec_pretty(manifest)
            .map_err(ManifestError::from)
            .and_then(|mut bytes| {
                bytes.push(b'\n');
                self.backend.write(&bytes)
            });
        if let Err(e) = write {
            (manifest.revision, manifest.last_updated) = previous;
            return Err(e);
        }

        debug!(kind = %self.kind, revision = manifest.revision, "Manifest saved");
        Ok(())
    }

    /// Read-modify-write with retry on concurrent modification
    ///
    /// `apply` may run more than once; it must only depend on the manifest it
    /// is handed. An error from `apply` aborts without saving.
    pub fn update<T>(&self, mut apply: impl FnMut(&mut Manifest) -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut manifest = self.load()?;
            let value = apply(&mut manifest)?;

            match self.save(&mut manifest) {
                Ok(()) => return Ok(value),
                Err(ManifestError::ConcurrentModification { .. }) if attempt < UPDATE_ATTEMPTS => {
                    debug!(kind = %self.kind, attempt, "Retrying manifest update");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run `op` against this store on the blocking thread pool
    ///
    /// Loads and saves are synchronous file I/O; async callers go through here
    /// instead of calling them on a runtime worker.
    pub async fn blocking<T, F>(self: &Arc<Self>, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ManifestStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| ManifestError::Task(e.to_string()))?
    }

    fn read_stored(&self) -> Result<Option<Manifest>> {
        let Some(bytes) = self.backend.read()? else {
            return Ok(None);
        };

        let manifest: Manifest =
            serde_json::from_slice(&bytes).map_err(|e| ManifestError::Corrupt {
                location: self.backend.location(),
                reason: e.to_string(),
            })?;

        validate(&manifest, self.kind).map_err(|e| ManifestError::Corrupt {
            location: self.backend.location(),
            reason: e.to_string(),
        })?;

        Ok(Some(manifest))
    }
}
