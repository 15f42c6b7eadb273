use crate::error::{KdbxError, Result};
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};
use uuid::{uuid, Uuid};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Outer cipher selection, identified on the wire by a 16-byte uuid.
/// Only AES-256-CBC is implemented; the rest are recognized so a caller can
/// report an unsupported configuration instead of a corrupt file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OuterCipher {
    Aes128Cbc,
    Aes256Cbc,
    TwofishCbc,
    ChaCha20,
}

impl OuterCipher {
    pub const AES_128_CBC: Uuid = uuid!("61ab05a1-9464-41c3-8d74-3a563df8dd35");
    pub const AES_256_CBC: Uuid = uuid!("31c1f2e6-bf71-4350-be58-05216afc5aff");
    pub const TWOFISH_CBC: Uuid = uuid!("ad68f29f-576f-4bb9-a36a-d47af965346c");
    pub const CHACHA20: Uuid = uuid!("d6038a2b-8b6f-4cb5-a524-339a31dbb59a");

    pub fn from_uuid(id: Uuid) -> Result<Self> {
        match id {
            Self::AES_128_CBC => Ok(Self::Aes128Cbc),
            Self::AES_256_CBC => Ok(Self::Aes256Cbc),
            Self::TWOFISH_CBC => Ok(Self::TwofishCbc),
            Self::CHACHA20 => Ok(Self::ChaCha20),
            other => Err(KdbxError::UnknownCipher(other)),
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Aes128Cbc => Self::AES_128_CBC,
            Self::Aes256Cbc => Self::AES_256_CBC,
            Self::TwofishCbc => Self::TWOFISH_CBC,
            Self::ChaCha20 => Self::CHACHA20,
        }
    }

    /// IV length the header must carry for this cipher
    pub fn iv_len(&self) -> usize {
        match self {
            Self::Aes128Cbc | Self::Aes256Cbc | Self::TwofishCbc => 16,
            Self::ChaCha20 => 12,
        }
    }

    pub fn encrypt(&self, key: &[u8; 32], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Aes256Cbc => {
                let cipher = Aes256CbcEnc::new_from_slices(key, iv)
                    .map_err(|e| KdbxError::Cipher(e.to_string()))?;
                Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
            }
            Self::Aes128Cbc => Err(KdbxError::UnsupportedAlgorithm("AES-128-CBC")),
            Self::TwofishCbc => Err(KdbxError::UnsupportedAlgorithm("TwoFish-CBC")),
            Self::ChaCha20 => Err(KdbxError::UnsupportedAlgorithm("ChaCha20 outer cipher")),
        }
    }

    pub fn decrypt(&self, key: &[u8; 32], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Aes256Cbc => {
                let cipher = Aes256CbcDec::new_from_slices(key, iv)
                    .map_err(|e| KdbxError::Cipher(e.to_string()))?;
                cipher
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                    .map_err(|e| KdbxError::Cipher(e.to_string()))
            }
            Self::Aes128Cbc => Err(KdbxError::UnsupportedAlgorithm("AES-128-CBC")),
            Self::TwofishCbc => Err(KdbxError::UnsupportedAlgorithm("TwoFish-CBC")),
            Self::ChaCha20 => Err(KdbxError::UnsupportedAlgorithm("ChaCha20 outer cipher")),
        }
    }
}

/// Body compression applied between serialization and encryption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    None,
    #[default]
    Gzip,
}

impl Compression {
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(Self::None),
            1 => Ok(Self::Gzip),
            other => Err(KdbxError::UnknownCompression(other)),
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Gzip => 1,
        }
    }

    pub fn pack(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder
                    .write_all(data)
                    .and_then(|_| encoder.finish())
                    .map_err(|e| KdbxError::Compression(e.to_string()))
            }
        }
    }

    pub fn unpack(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Gzip => {
                let mut output = Vec::new();
                GzDecoder::new(data)
                    .read_to_end(&mut output)
                    .map_err(|e| KdbxError::Decompression(e.to_string()))?;
                Ok(output)
            }
        }
    }
}
