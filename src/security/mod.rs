//! Security features.
//!
//! Encryption at rest for namespace files.

pub mod encryption;

pub use encryption::Encryptor;
