//! The key-addressed storage collaborator and reference implementations.
//!
//! Pipelines only ever talk to [`Storage`]; the wire protocol behind it is
//! out of scope here. Two implementations ship with the crate: an in-memory
//! map for tests and small deployments, and a local-directory store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::error::StorageError;

/// A request to persist one blob.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// Requested filename; implementations may rename unless `exact_filename`
    pub filename: String,

    /// The blob to store
    pub data: Vec<u8>,

    /// Store under `filename` verbatim instead of a timestamped variant
    pub exact_filename: bool,
}

impl WriteRequest {
    /// A write that lets the store pick a timestamped final name.
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
            exact_filename: false,
        }
    }

    /// A write stored under the given name verbatim.
    pub fn exact(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
            exact_filename: true,
        }
    }
}

/// The name a blob was actually stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
}

/// Key-addressed blob store the pipelines read from and persist into.
///
/// Implementations must support concurrent independent reads and writes
/// without external locking; a write to a given final filename is
/// idempotent.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the blob stored under `key`.
    async fn get_file(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Persist a blob, returning the (possibly renamed) stored filename.
    async fn write_file(&self, request: WriteRequest) -> Result<StoredFile, StorageError>;
}

/// Insert a suffix before the final extension.
///
/// `photo.jpg` becomes `photo_<suffix>.jpg`; a name with no extension gets
/// the suffix appended. With `None`, a strictly increasing epoch-millisecond
/// stamp is used so concurrent writes of the same requested filename never
/// collide.
pub fn timestamped_filename(filename: &str, suffix: Option<&str>) -> String {
    let stamp = match suffix {
        Some(s) => s.to_string(),
        None => next_stamp().to_string(),
    };
    match filename.rfind('.') {
        Some(idx) => format!("{}_{}{}", &filename[..idx], stamp, &filename[idx..]),
        None => format!("{filename}_{stamp}"),
    }
}

/// Epoch milliseconds, bumped to be strictly increasing per process.
fn next_stamp() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    loop {
        let last = LAST.load(Ordering::Relaxed);
        let next = now.max(last + 1);
        if LAST
            .compare_exchange(last, next, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            return next;
        }
    }
}

/// In-memory storage backed by a concurrent map.
#[derive(Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a blob exists under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.files.read().await.contains_key(key)
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_file(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn write_file(&self, request: WriteRequest) -> Result<StoredFile, StorageError> {
        let filename = if request.exact_filename {
            request.filename
        } else {
            timestamped_filename(&request.filename, None)
        };
        self.files
            .write()
            .await
            .insert(filename.clone(), request.data);
        Ok(StoredFile { filename })
    }
}

/// Storage rooted at a local directory, keyed by relative path.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn get_file(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(self.root.join(key))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
                _ => StorageError::Read {
                    key: key.to_string(),
                    message: e.to_string(),
                },
            })
    }

    async fn write_file(&self, request: WriteRequest) -> Result<StoredFile, StorageError> {
        let filename = if request.exact_filename {
            request.filename
        } else {
            timestamped_filename(&request.filename, None)
        };
        let path = self.root.join(&filename);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Write {
                    filename: filename.clone(),
                    message: e.to_string(),
                })?;
        }
        tokio::fs::write(&path, &request.data)
            .await
            .map_err(|e| StorageError::Write {
                filename: filename.clone(),
                message: e.to_string(),
            })?;
        tracing::trace!(filename = %filename, bytes = request.data.len(), "wrote blob");
        Ok(StoredFile { filename })
    }
}
