//! kdbx4 - KDBX 4 Password-Database Codec and Cryptographic Pipeline
//!
//! A codec for the KDBX 4 container format: an encrypted, tamper-evident
//! binary file holding a tree of credential records. This crate owns the
//! layered protocol between raw file bytes and the decrypted document; the
//! XML document model itself is an external collaborator that receives the
//! content bytes and drives the protected-field keystream.
//!
//! ## Read Pipeline
//!
//! ```text
//! Bytes → Outer Header → Derive Keys → Verify Header → Verify Blocks
//!       → Decrypt → Decompress → Inner Header → Protected Fields
//! ```
//!
//! - **Outer Header**: magic + version + TLV header vector, followed by its
//!   own SHA-256 and HMAC-SHA256 over the exact serialized bytes
//! - **Derive Keys**: passphrase → SHA-256 → SHA-256 → Argon2 → master
//!   encryption key (SHA-256) and master HMAC key (SHA-512)
//! - **Verify Blocks**: every 1 MiB ciphertext block carries an HMAC under
//!   its own index-derived key; nothing is decrypted before it verifies
//! - **Decrypt**: AES-256-CBC over the concatenated ciphertext, then gzip
//! - **Protected Fields**: a second, independent ChaCha20 keystream over
//!   individually flagged values inside the decrypted document
//!
//! The write path runs in reverse, and a header rotation regenerates every
//! piece of randomness (master seed, IV, KDF salt, inner seed) before
//! re-deriving keys and re-sealing.
//!
//! ## Example
//!
//! ```no_run
//! use kdbx4::{EncryptedDatabase, CompositeKey};
//!
//! let bytes = std::fs::read("vault.kdbx").unwrap();
//! let decrypted = EncryptedDatabase::decrypt_with_passphrase(&bytes, b"passphrase").unwrap();
//!
//! // Hand the content to the document layer; unprotect flagged fields
//! // through decrypted.protected_stream()
//! let content = decrypted.content();
//! # let _ = content;
//! ```

pub mod block;
pub mod cipher;
pub mod cursor;
pub mod database;
pub mod dictionary;
pub mod error;
pub mod inner;
pub mod kdf;
pub mod keys;
pub mod outer;
pub mod tlv;

pub use cipher::{Compression, OuterCipher};
pub use database::{DecryptedDatabase, EncryptedDatabase};
pub use dictionary::{Variant, VariantDictionary};
pub use error::{KdbxError, Result};
pub use inner::{InnerHeader, ProtectedStream, StreamCipherId};
pub use kdf::{Argon2Variant, KdfParams};
pub use keys::{CompositeKey, MasterKeys, PasswordKey};
pub use outer::{OuterFields, OuterHeader};
pub use tlv::{HeaderVector, TlvRecord};
