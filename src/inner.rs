use crate::cursor::Cursor;
use crate::error::{KdbxError, Result};
use crate::tlv::HeaderVector;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use rand::RngCore;
use sha2::{Digest, Sha512};

mod tag {
    pub const CIPHER: u8 = 1;
    pub const SEED: u8 = 2;
    pub const BINARY: u8 = 3;
}

/// Stream cipher protecting individual fields inside the decrypted body,
/// independent of the outer cipher. Only ChaCha20 is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCipherId {
    ArcFour,
    Salsa20,
    ChaCha20,
}

impl StreamCipherId {
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            1 => Ok(Self::ArcFour),
            2 => Ok(Self::Salsa20),
            3 => Ok(Self::ChaCha20),
            other => Err(KdbxError::UnknownStreamCipher(other)),
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            Self::ArcFour => 1,
            Self::Salsa20 => 2,
            Self::ChaCha20 => 3,
        }
    }
}

/// Post-decompression header: stream cipher selection, its random seed, and
/// the attachment binaries carried alongside the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerHeader {
    pub cipher: StreamCipherId,
    pub seed: Vec<u8>,
    pub binaries: Vec<Vec<u8>>,
}

impl InnerHeader {
    pub fn read(cursor: &mut Cursor<'_>) -> Result<Self> {
        let vector = HeaderVector::read(cursor)?;

        let cipher_bytes = vector.single(tag::CIPHER)?;
        let cipher_id = u32::from_le_bytes(cipher_bytes.try_into().map_err(|_| {
            KdbxError::HeaderFieldLength {
                tag: tag::CIPHER,
                expected: 4,
                actual: cipher_bytes.len(),
            }
        })?);
        let cipher = StreamCipherId::from_id(cipher_id)?;

        let seed = vector.single(tag::SEED)?.to_vec();

        let binaries = vector
            .at_least_one(tag::BINARY)?
            .into_iter()
            .map(<[u8]>::to_vec)
            .collect();

        Ok(Self {
            cipher,
            seed,
            binaries,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let mut vector = HeaderVector::new();
        vector.push(tag::CIPHER, self.cipher.id().to_le_bytes().to_vec());
        vector.push(tag::SEED, self.seed.clone());
        for binary in &self.binaries {
            vector.push(tag::BINARY, binary.clone());
        }
        vector.write(out);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }

    /// Same cipher and binaries, fresh random seed. Every protected field
    /// gets a new keystream on the next save.
    pub fn rotate(&self) -> Self {
        let mut seed = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        Self {
            cipher: self.cipher,
            seed,
            binaries: self.binaries.clone(),
        }
    }

    /// Instantiate the keystream this header selects
    pub fn stream(&self) -> Result<ProtectedStream> {
        ProtectedStream::init(self.cipher, &self.seed)
    }
}

/// The running keystream applied to protected fields, in document order.
/// XOR is its own inverse, so one operation serves both directions; the
/// stream is stateful and successive calls continue where the last ended.
pub struct ProtectedStream {
    cipher: ChaCha20,
}

impl std::fmt::Debug for ProtectedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProtectedStream(..)")
    }
}

impl ProtectedStream {
    /// Key material is SHA-512 of the inner seed: first 32 bytes key, next
    /// 12 bytes nonce
    pub fn init(id: StreamCipherId, seed: &[u8]) -> Result<Self> {
        match id {
            StreamCipherId::ArcFour => Err(KdbxError::UnsupportedAlgorithm("ArcFour variant")),
            StreamCipherId::Salsa20 => Err(KdbxError::UnsupportedAlgorithm("Salsa20")),
            StreamCipherId::ChaCha20 => {
                let digest = Sha512::digest(seed);
                let cipher = ChaCha20::new_from_slices(&digest[..32], &digest[32..44])
                    .map_err(|e| KdbxError::Cipher(e.to_string()))?;
                Ok(Self { cipher })
            }
        }
    }

    /// XOR the next keystream bytes over the buffer
    pub fn apply(&mut self, buffer: &mut [u8]) {
        self.cipher.apply_keystream(buffer);
    }

    /// Base64-decode a protected field's text and recover its plaintext
    pub fn unprotect(&mut self, encoded: &str) -> Result<Vec<u8>> {
        let mut bytes = BASE64
            .decode(encoded)
            .map_err(|_| KdbxError::InvalidBase64)?;
        self.apply(&mut bytes);
        Ok(bytes)
    }

    /// Encrypt a field's plaintext and return the base64 text to store
    pub fn protect(&mut self, plaintext: &[u8]) -> String {
        let mut bytes = plaintext.to_vec();
        self.apply(&mut bytes);
        BASE64.encode(bytes)
    }
}
