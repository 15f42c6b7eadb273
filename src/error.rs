use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum KdbxError {
    #[error("Invalid magic bytes")]
    BadMagic,

    #[error("Unsupported format version: {0}. Only major version 4 is supported")]
    UnsupportedVersion(u16),

    #[error("Truncated input: needed {needed} more bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("Unknown variant type discriminant: 0x{0:02X}")]
    UnknownVariantType(u8),

    #[error("Unsupported dictionary version: {0}")]
    UnsupportedDictionaryVersion(u8),

    #[error("Invalid boolean value: {0}. Must be 0 or 1")]
    InvalidBool(u8),

    #[error("Variant value has wrong length for its type")]
    VariantLengthMismatch,

    #[error("Unknown cipher uuid: {0}")]
    UnknownCipher(Uuid),

    #[error("Unknown key derivation uuid: {0}")]
    UnknownKdf(Uuid),

    #[error("Unknown compression id: {0}")]
    UnknownCompression(u32),

    #[error("Unknown stream cipher id: {0}")]
    UnknownStreamCipher(u32),

    #[error("Missing header field: tag {0}")]
    MissingHeaderField(u8),

    #[error("Duplicated header field: tag {0}")]
    DuplicateHeaderField(u8),

    #[error("Empty header field: tag {0}")]
    EmptyHeaderField(u8),

    #[error("Header field has wrong length: tag {tag}, expected {expected} bytes, got {actual}")]
    HeaderFieldLength {
        tag: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Missing dictionary key: {0}")]
    MissingDictionaryKey(&'static str),

    #[error("Dictionary key {0} holds the wrong variant type")]
    WrongVariantType(&'static str),

    #[error("Invalid Argon2 version: 0x{0:02X}")]
    InvalidArgon2Version(u32),

    #[error("IV length {actual} does not match cipher requirement {expected}")]
    IvLength { expected: usize, actual: usize },

    #[error("Invalid base64 in protected value")]
    InvalidBase64,

    #[error("Invalid UTF-8 in dictionary key or string value")]
    InvalidUtf8,

    #[error("Header hash mismatch")]
    HashMismatch,

    #[error("Header HMAC verification failed")]
    HeaderHmacMismatch,

    #[error("HMAC verification failed for block {0}")]
    HmacMismatch(u64),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(&'static str),

    #[error("Key derivation error: {0}")]
    Kdf(String),

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),
}

impl KdbxError {
    /// True for a tampered or mis-keyed file: header hash/HMAC or any block HMAC mismatch
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            Self::HashMismatch | Self::HeaderHmacMismatch | Self::HmacMismatch(_)
        )
    }

    /// True when the file selects an algorithm this crate recognizes but does not implement
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedAlgorithm(_))
    }
}

pub type Result<T> = std::result::Result<T, KdbxError>;
