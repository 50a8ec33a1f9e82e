//! # Engram
//!
//! Persistent knowledge-graph memory for AI assistants.
//!
//! Engram stores named entities, directed typed relations between them, and
//! free-text observations, partitioned into independent namespaces. Each
//! namespace is backed by a single JSON-Lines file written atomically under
//! an advisory file lock, with optional AES-256-GCM encryption at rest.
//!
//! ## Features
//!
//! - Durable single-file storage per namespace (atomic replace, crash-safe)
//! - Advisory try-lock concurrency discipline (fails fast, never blocks)
//! - Referential invariants: no dangling relations on create, cascade on delete
//! - Multi-strategy search: exact, substring, and fuzzy ranking
//! - Optional encryption at rest keyed from a passphrase
//!
//! ## Example
//!
//! ```rust,ignore
//! use engram::config::MemoryConfig;
//! use engram::graph::GraphManager;
//! use engram::models::{Entity, Namespace};
//!
//! let manager = GraphManager::new(MemoryConfig::from_env());
//! let ns = Namespace::default();
//! let created = manager.create_entities(&ns, vec![Entity::new("alice", "person")])?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod graph;
pub mod models;
pub mod security;
pub mod storage;
pub mod tools;

// Re-exports for convenience
pub use config::MemoryConfig;
pub use graph::GraphManager;
pub use models::{Entity, KnowledgeGraph, Namespace, Relation};
pub use storage::GraphStore;
pub use tools::{MemoryTool, Tool, ToolContext, ToolRegistry};

/// Error type for engram operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Missing required parameters, malformed payloads, unsafe namespace names |
/// | `EntityNotFound` | Adding observations to an entity that does not exist |
/// | `LockBusy` | The advisory lock on a namespace file is held elsewhere (retryable) |
/// | `DecryptFailed` | Ciphertext is truncated, tampered with, or keyed differently |
/// | `StorageLimitExceeded` | The backing file is larger than the configured ceiling |
/// | `OperationFailed` | Filesystem I/O errors, serialization failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - Required parameters are missing from a tool payload
    /// - JSON deserialization of a payload fails
    /// - A namespace string is not a safe path component
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced entity does not exist.
    ///
    /// Raised only by `add_observations`, which fails the whole call when a
    /// target entity is missing. Relation creation with missing endpoints
    /// skips the relation instead.
    #[error("entity '{name}' does not exist")]
    EntityNotFound {
        /// Name of the missing entity.
        name: String,
    },

    /// The advisory lock for a namespace file could not be acquired.
    ///
    /// Lock acquisition is attempt-once and never blocks; this error is
    /// retryable from the caller's side.
    #[error("could not acquire lock on {path}")]
    LockBusy {
        /// The lock sidecar path that was contended.
        path: PathBuf,
    },

    /// Decryption or ciphertext authentication failed.
    ///
    /// Raised when an encrypted namespace file is truncated, tampered with,
    /// or was written with a different passphrase. Not retryable without the
    /// correct key.
    #[error("decryption failed: {0}")]
    DecryptFailed(String),

    /// The backing file exceeds the configured storage ceiling.
    #[error("storage size {size} bytes exceeds maximum of {limit} bytes")]
    StorageLimitExceeded {
        /// Current size of the backing file in bytes.
        size: u64,
        /// Configured ceiling in bytes.
        limit: u64,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - Filesystem I/O errors occur (permissions, disk full)
    /// - A record fails to serialize
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns true if the caller may retry the operation unchanged.
    ///
    /// Only lock contention qualifies; every other variant requires the
    /// caller to change something first.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockBusy { .. })
    }
}

/// Result type alias for engram operations.
pub type Result<T> = std::result::Result<T, Error>;
