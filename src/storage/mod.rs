//! Storage layer.
//!
//! One JSON-Lines file per namespace (`<base>/<namespace>/memory.json`),
//! written atomically via a temporary file and rename, guarded by an
//! advisory try-lock on a `.lock` sidecar, optionally encrypted at rest.
//!
//! Reads favour availability over strictness: individual malformed lines
//! are logged and skipped, never failing the whole load. Writes favour the
//! caller's data: the size ceiling is a hard error before a save but only a
//! warning after one.

pub mod lock;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MemoryConfig;
use crate::models::{
    KnowledgeGraph, Namespace, StoredEntity, StoredRelation, RECORD_TYPE_ENTITY,
    RECORD_TYPE_RELATION,
};
use crate::security::Encryptor;
use crate::{Error, Result};

pub use lock::{FsLockManager, LockGuard, LockManager};

/// Backing file name within a namespace directory.
const MEMORY_FILE_NAME: &str = "memory.json";

/// Durable storage for one [`KnowledgeGraph`] per namespace.
pub struct GraphStore {
    config: MemoryConfig,
    encryptor: Option<Encryptor>,
    locks: Box<dyn LockManager + Send + Sync>,
}

/// Minimal probe for the record discriminator, parsed before the full record.
#[derive(Debug, Deserialize)]
struct RecordProbe {
    #[serde(rename = "type", default)]
    record_type: Option<String>,
}

/// A snapshot of a namespace's backing file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    /// Path of the backing file.
    pub path: PathBuf,
    /// Whether the backing file exists yet.
    pub exists: bool,
    /// Size of the backing file in bytes (0 when absent).
    pub size_bytes: u64,
    /// Last modification time, when available.
    pub modified: Option<DateTime<Utc>>,
}

impl GraphStore {
    /// Creates a store using OS advisory file locking.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self::with_lock_manager(config, Box::new(FsLockManager::new()))
    }

    /// Creates a store with a caller-supplied lock manager.
    ///
    /// Used by tests to substitute an in-memory fake for OS locking.
    #[must_use]
    pub fn with_lock_manager(
        config: MemoryConfig,
        locks: Box<dyn LockManager + Send + Sync>,
    ) -> Self {
        let encryptor = config
            .encryption_password
            .as_ref()
            .map(Encryptor::from_passphrase);
        Self {
            config,
            encryptor,
            locks,
        }
    }

    /// Returns the backing file path for a namespace.
    #[must_use]
    pub fn file_path(&self, namespace: &Namespace) -> PathBuf {
        self.config
            .base_path
            .join(namespace.as_str())
            .join(MEMORY_FILE_NAME)
    }

    /// Loads the complete graph for a namespace.
    ///
    /// A missing backing file is an empty graph, not an error: an unused
    /// namespace is indistinguishable from an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockBusy`] when the read lock is contended,
    /// [`Error::DecryptFailed`] on ciphertext problems, or
    /// [`Error::OperationFailed`] on I/O failure.
    pub fn load(&self, namespace: &Namespace) -> Result<KnowledgeGraph> {
        let path = self.file_path(namespace);
        self.ensure_namespace_dir(&path)?;
        self.check_retention(namespace, &path);

        let _guard = self.locks.try_shared(&lock_path(&path))?;

        if !path.exists() {
            return Ok(KnowledgeGraph::new());
        }

        let raw = fs::read(&path).map_err(|e| Error::OperationFailed {
            operation: "read_memory_file".to_string(),
            cause: e.to_string(),
        })?;

        let plaintext = match &self.encryptor {
            Some(encryptor) => encryptor.decrypt(&raw)?,
            None => raw,
        };

        let text = String::from_utf8(plaintext).map_err(|e| Error::OperationFailed {
            operation: "decode_memory_file".to_string(),
            cause: e.to_string(),
        })?;

        Ok(parse_records(namespace, &text))
    }

    /// Persists the complete graph for a namespace atomically.
    ///
    /// Serializes every entity then every relation as one JSON record per
    /// line, encrypts the buffer when a passphrase is configured, writes to
    /// `<path>.tmp`, and renames over the backing file. The live file is
    /// never mutated in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageLimitExceeded`] when the existing file is
    /// already over the ceiling, [`Error::LockBusy`] when the write lock is
    /// contended, or [`Error::OperationFailed`] on I/O failure.
    pub fn save(&self, namespace: &Namespace, graph: &KnowledgeGraph) -> Result<()> {
        let path = self.file_path(namespace);
        self.ensure_namespace_dir(&path)?;
        self.validate_size(&path)?;

        let _guard = self.locks.try_exclusive(&lock_path(&path))?;

        let mut buffer = String::new();
        for entity in &graph.entities {
            let line =
                serde_json::to_string(&StoredEntity::from(entity)).map_err(|e| {
                    Error::OperationFailed {
                        operation: "serialize_entity".to_string(),
                        cause: format!("{}: {e}", entity.name),
                    }
                })?;
            buffer.push_str(&line);
            buffer.push('\n');
        }
        for relation in &graph.relations {
            let line =
                serde_json::to_string(&StoredRelation::from(relation)).map_err(|e| {
                    Error::OperationFailed {
                        operation: "serialize_relation".to_string(),
                        cause: format!("{}: {e}", relation.key()),
                    }
                })?;
            buffer.push_str(&line);
            buffer.push('\n');
        }

        let payload = match &self.encryptor {
            Some(encryptor) => encryptor.encrypt(buffer.as_bytes())?,
            None => buffer.into_bytes(),
        };

        let tmp = tmp_path(&path);
        fs::write(&tmp, &payload).map_err(|e| Error::OperationFailed {
            operation: "write_temp_file".to_string(),
            cause: e.to_string(),
        })?;

        if let Err(e) = fs::rename(&tmp, &path) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                tracing::warn!(error = %cleanup, "failed to remove temporary file");
            }
            return Err(Error::OperationFailed {
                operation: "rename_temp_file".to_string(),
                cause: e.to_string(),
            });
        }

        // The caller's write already landed; over-ceiling is only a warning now.
        if let Err(e) = self.validate_size(&path) {
            tracing::warn!(
                namespace = %namespace,
                error = %e,
                "storage size exceeds ceiling after save, consider reducing data"
            );
        }

        Ok(())
    }

    /// Returns path, existence, and size information for a namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] on stat failure other than absence.
    pub fn storage_info(&self, namespace: &Namespace) -> Result<StorageInfo> {
        let path = self.file_path(namespace);
        match fs::metadata(&path) {
            Ok(meta) => Ok(StorageInfo {
                path,
                exists: true,
                size_bytes: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StorageInfo {
                path,
                exists: false,
                size_bytes: 0,
                modified: None,
            }),
            Err(e) => Err(Error::OperationFailed {
                operation: "stat_memory_file".to_string(),
                cause: e.to_string(),
            }),
        }
    }

    /// Lazily creates the namespace directory holding the backing file.
    fn ensure_namespace_dir(&self, path: &Path) -> Result<()> {
        let Some(dir) = path.parent() else {
            return Ok(());
        };
        fs::create_dir_all(dir).map_err(|e| Error::OperationFailed {
            operation: "create_namespace_dir".to_string(),
            cause: e.to_string(),
        })
    }

    /// Errors when the backing file exceeds the configured ceiling.
    fn validate_size(&self, path: &Path) -> Result<()> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(Error::OperationFailed {
                    operation: "stat_memory_file".to_string(),
                    cause: e.to_string(),
                });
            }
        };

        if meta.len() > self.config.max_storage_size {
            return Err(Error::StorageLimitExceeded {
                size: meta.len(),
                limit: self.config.max_storage_size,
            });
        }
        Ok(())
    }

    /// Warns when the backing file is older than the retention window.
    ///
    /// Retention is advisory only; nothing is purged.
    fn check_retention(&self, namespace: &Namespace, path: &Path) {
        let Ok(meta) = fs::metadata(path) else {
            return;
        };
        let Ok(modified) = meta.modified() else {
            return;
        };
        let Ok(age) = modified.elapsed() else {
            return;
        };

        let retention = Duration::from_secs(self.config.data_retention_days * 24 * 60 * 60);
        if age > retention {
            tracing::warn!(
                namespace = %namespace,
                path = %path.display(),
                age_days = age.as_secs() / 86_400,
                retention_days = self.config.data_retention_days,
                "memory data exceeds retention period, consider cleanup"
            );
        }
    }
}

/// Returns the lock sidecar path for a backing file.
fn lock_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".lock")
}

/// Returns the transient temp path used during saves.
fn tmp_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".tmp")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Parses JSON-Lines content into a graph, skipping bad lines with a warning.
fn parse_records(namespace: &Namespace, text: &str) -> KnowledgeGraph {
    let mut graph = KnowledgeGraph::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_num = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let probe: RecordProbe = match serde_json::from_str(line) {
            Ok(probe) => probe,
            Err(e) => {
                tracing::warn!(
                    namespace = %namespace,
                    line = line_num,
                    error = %e,
                    "failed to parse record, skipping"
                );
                continue;
            }
        };

        match probe.record_type.as_deref() {
            Some(RECORD_TYPE_ENTITY) => match serde_json::from_str::<StoredEntity>(line) {
                Ok(stored) => graph.entities.push(stored.into()),
                Err(e) => {
                    tracing::warn!(
                        namespace = %namespace,
                        line = line_num,
                        error = %e,
                        "failed to parse entity, skipping"
                    );
                }
            },
            Some(RECORD_TYPE_RELATION) => match serde_json::from_str::<StoredRelation>(line) {
                Ok(stored) => graph.relations.push(stored.into()),
                Err(e) => {
                    tracing::warn!(
                        namespace = %namespace,
                        line = line_num,
                        error = %e,
                        "failed to parse relation, skipping"
                    );
                }
            },
            other => {
                tracing::warn!(
                    namespace = %namespace,
                    line = line_num,
                    record_type = ?other,
                    "unknown record type, skipping"
                );
            }
        }
    }

    graph
}
