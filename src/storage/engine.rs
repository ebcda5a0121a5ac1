//! Embedded transactional object store backing the feed store.
//!
//! The engine holds [`CacheRecord`] objects keyed by their primary key. Reads
//! run against a [`Snapshot`]; writes run inside a [`Transaction`] that is
//! committed as a whole or not at all.
//!
//! Two backends ship with the crate:
//! - a file backend writing one JSON document, replaced atomically through a
//!   temporary file and a rename, with a blake3 checksum over the objects;
//! - an in-memory backend shared by every engine opened with the same
//!   identifier while at least one of them is alive.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::storage::record::CacheRecord;

/// Current on-disk document version.
const FORMAT_VERSION: u32 = 1;

/// Objects held by the engine, keyed by primary key.
pub type Objects = BTreeMap<String, CacheRecord>;

/// Where the engine keeps its objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreLocation {
    File(PathBuf),
    InMemory(String),
}

impl fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreLocation::File(path) => write!(f, "file:{}", path.display()),
            StoreLocation::InMemory(identifier) => write!(f, "memory:{}", identifier),
        }
    }
}

/// Configuration used to open an [`Engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub location: StoreLocation,
}

impl EngineConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File(path.into()),
        }
    }

    pub fn in_memory(identifier: impl Into<String>) -> Self {
        Self {
            location: StoreLocation::InMemory(identifier.into()),
        }
    }
}

/// Persistence seam below the engine.
///
/// A backend only loads and commits whole object sets; transaction
/// semantics live in [`Engine`].
pub trait StorageBackend: Send + Sync {
    /// Load the committed objects.
    fn load(&self) -> Result<Objects>;

    /// Replace the committed objects. Must be all-or-nothing.
    fn commit(&self, objects: &Objects) -> Result<()>;

    /// Human readable location, for logs.
    fn describe(&self) -> String;
}

/// Read-only view of the committed objects.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    objects: Objects,
}

impl Snapshot {
    pub fn object_for_primary_key(&self, key: &str) -> Option<&CacheRecord> {
        self.objects.get(key)
    }

    pub fn first(&self) -> Option<&CacheRecord> {
        self.objects.values().next()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Pending changes of a write transaction.
#[derive(Debug)]
pub struct Transaction {
    snapshot: Snapshot,
    dirty: bool,
}

impl Transaction {
    /// Create or replace the object with the record's primary key.
    pub fn add(&mut self, record: CacheRecord) -> Option<CacheRecord> {
        self.dirty = true;
        self.snapshot.objects.insert(record.id.clone(), record)
    }

    pub fn delete(&mut self, key: &str) -> Option<CacheRecord> {
        let removed = self.snapshot.objects.remove(key);
        self.dirty |= removed.is_some();
        removed
    }

    /// Remove every object, returning how many were removed.
    pub fn delete_all(&mut self) -> usize {
        let count = self.snapshot.objects.len();
        self.snapshot.objects.clear();
        self.dirty |= count > 0;
        count
    }
}

impl Deref for Transaction {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.snapshot
    }
}

/// Handle to an opened store. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    backend: Arc<dyn StorageBackend>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.backend.describe())
            .finish()
    }
}

impl Engine {
    /// Open the store described by `config`.
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let backend: Arc<dyn StorageBackend> = match &config.location {
            StoreLocation::File(path) => Arc::new(FileBackend::open(path)?),
            StoreLocation::InMemory(identifier) => MemoryBackend::shared(identifier),
        };

        info!(location = %config.location, "Opened store");
        Ok(Self { backend })
    }

    /// Wrap a custom backend.
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Run `f` against a snapshot of the committed objects.
    pub fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> Result<R> {
        let snapshot = Snapshot {
            objects: self.backend.load()?,
        };
        Ok(f(&snapshot))
    }

    /// Run `f` in a write transaction.
    ///
    /// Changes are committed only if `f` returns `Ok`; an error from `f` or
    /// from the commit leaves the committed objects untouched.
    pub fn write<R>(&self, f: impl FnOnce(&mut Transaction) -> Result<R>) -> Result<R> {
        let mut transaction = Transaction {
            snapshot: Snapshot {
                objects: self.backend.load()?,
            },
            dirty: false,
        };

        let value = f(&mut transaction)?;

        if transaction.dirty {
            self.backend
                .commit(&transaction.snapshot.objects)
                .map_err(|e| match e {
                    Error::Transaction(_) => e,
                    other => Error::Transaction(other.to_string()),
                })?;
            debug!(
                backend = %self.backend.describe(),
                objects = transaction.snapshot.len(),
                "Committed transaction"
            );
        }

        Ok(value)
    }
}

/// On-disk document of the file backend.
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    version: u32,
    checksum: String,
    objects: Objects,
}

fn checksum(objects: &Objects) -> Result<String> {
    let bytes = serde_json::to_vec(objects)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Single-file JSON backend.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Validate any existing store file. Nothing is created until the first
    /// commit.
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Err(Error::EngineOpen(format!(
                "store path '{}' is a directory",
                path.display()
            )));
        }

        let backend = Self {
            path: path.to_path_buf(),
        };
        backend.load()?;
        Ok(backend)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(path: &Path) -> PathBuf {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> Result<Objects> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Store file does not exist yet");
                return Ok(Objects::new());
            }
            Err(e) => {
                return Err(Error::EngineOpen(format!(
                    "failed to read store file '{}': {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let document: StoreDocument = serde_json::from_slice(&bytes).map_err(|e| {
            Error::EngineOpen(format!(
                "malformed store file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        if document.version != FORMAT_VERSION {
            return Err(Error::EngineOpen(format!(
                "unsupported store format version {} in '{}'",
                document.version,
                self.path.display()
            )));
        }

        if checksum(&document.objects)? != document.checksum {
            warn!(path = %self.path.display(), "Store file checksum mismatch");
            return Err(Error::EngineOpen(format!(
                "checksum mismatch in store file '{}'",
                self.path.display()
            )));
        }

        Ok(document.objects)
    }

    fn commit(&self, objects: &Objects) -> Result<()> {
        let document = StoreDocument {
            version: FORMAT_VERSION,
            checksum: checksum(objects)?,
            objects: objects.clone(),
        };
        let json = serde_json::to_vec_pretty(&document)?;

        // Write to a temporary file next to the target, then rename over it.
        let dir = Self::parent_dir(&self.path);
        fs::create_dir_all(&dir).map_err(|e| {
            Error::Transaction(format!(
                "failed to create store directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| {
            Error::Transaction(format!(
                "failed to create temporary file in '{}': {}",
                dir.display(),
                e
            ))
        })?;
        temp.write_all(&json)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| {
                Error::Transaction(format!(
                    "failed to write '{}': {}",
                    temp.path().display(),
                    e
                ))
            })?;
        temp.persist(&self.path).map_err(|e| {
            Error::Transaction(format!(
                "failed to replace store file '{}': {}",
                self.path.display(),
                e.error
            ))
        })?;

        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

static MEMORY_STORES: Lazy<Mutex<HashMap<String, Weak<MemoryBackend>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Named in-memory backend.
#[derive(Debug)]
pub struct MemoryBackend {
    identifier: String,
    objects: RwLock<Objects>,
}

impl MemoryBackend {
    /// Private, unnamed in-memory backend.
    pub fn new() -> Self {
        Self {
            identifier: String::new(),
            objects: RwLock::new(Objects::new()),
        }
    }

    /// Backend shared with every live engine using the same identifier.
    pub fn shared(identifier: &str) -> Arc<Self> {
        let mut stores = MEMORY_STORES.lock();
        stores.retain(|_, store| store.strong_count() > 0);

        if let Some(existing) = stores.get(identifier).and_then(Weak::upgrade) {
            return existing;
        }

        let backend = Arc::new(Self {
            identifier: identifier.to_string(),
            objects: RwLock::new(Objects::new()),
        });
        stores.insert(identifier.to_string(), Arc::downgrade(&backend));
        backend
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self) -> Result<Objects> {
        Ok(self.objects.read().clone())
    }

    fn commit(&self, objects: &Objects) -> Result<()> {
        *self.objects.write() = objects.clone();
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.identifier)
    }
}
