use crate::cipher::{Compression, OuterCipher};
use crate::cursor::Cursor;
use crate::dictionary::VariantDictionary;
use crate::error::{KdbxError, Result};
use crate::kdf::KdfParams;
use crate::keys::{constant_time_eq, CompositeKey, MasterKeys};
use crate::tlv::HeaderVector;
use hmac::Mac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// File magic, two little-endian u32 words
pub const MAGIC_1: u32 = 0x9AA2_D903;
pub const MAGIC_2: u32 = 0xB54B_FB67;

/// Only major format version 4 is supported
pub const VERSION_MAJOR: u16 = 4;

mod tag {
    pub const CIPHER: u8 = 2;
    pub const COMPRESSION: u8 = 3;
    pub const SEED: u8 = 4;
    pub const IV: u8 = 7;
    pub const KDF: u8 = 11;
    pub const CUSTOM: u8 = 12;
}

/// The plain values carried by the outer header vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterFields {
    pub cipher: OuterCipher,
    pub compression: Compression,
    pub seed: [u8; 32],
    pub iv: Vec<u8>,
    pub kdf: KdfParams,
    pub custom: Option<VariantDictionary>,
}

impl OuterFields {
    /// Fresh randomness for the same cipher, compression, KDF costs and
    /// custom data: new seed, new IV, new KDF salt
    pub fn rotate(&self) -> Self {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);

        let mut iv = vec![0u8; self.cipher.iv_len()];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        Self {
            cipher: self.cipher,
            compression: self.compression,
            seed,
            iv,
            kdf: self.kdf.rotate(),
            custom: self.custom.clone(),
        }
    }
}

/// The outer file header: magic + version + header vector, then the header's
/// own SHA-256 and HMAC-SHA256 over that exact serialized byte range.
///
/// The byte image is frozen at construction; rotation builds a new header
/// via [`OuterFields::rotate`] and [`OuterHeader::compute`] rather than
/// mutating fields under a stale hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuterHeader {
    fields: OuterFields,
    version_minor: u16,
    /// Serialized magic + version + vector, exactly as hashed
    raw: Vec<u8>,
    hash: [u8; 32],
    hmac: [u8; 32],
}

impl OuterHeader {
    pub fn fields(&self) -> &OuterFields {
        &self.fields
    }

    pub fn version_minor(&self) -> u16 {
        self.version_minor
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Serialize the prefix covered by the hash and HMAC
    fn serialize_prefix(fields: &OuterFields, version_minor: u16) -> Result<Vec<u8>> {
        if fields.iv.len() != fields.cipher.iv_len() {
            return Err(KdbxError::IvLength {
                expected: fields.cipher.iv_len(),
                actual: fields.iv.len(),
            });
        }

        let mut vector = HeaderVector::new();
        vector.push(tag::CIPHER, fields.cipher.uuid().as_bytes().to_vec());
        vector.push(tag::COMPRESSION, fields.compression.id().to_le_bytes().to_vec());
        vector.push(tag::SEED, fields.seed.to_vec());
        vector.push(tag::IV, fields.iv.clone());
        vector.push(tag::KDF, fields.kdf.to_dictionary().to_bytes());
        if let Some(custom) = &fields.custom {
            vector.push(tag::CUSTOM, custom.to_bytes());
        }

        let mut out = Vec::with_capacity(12 + vector.encoded_len());
        out.extend_from_slice(&MAGIC_1.to_le_bytes());
        out.extend_from_slice(&MAGIC_2.to_le_bytes());
        out.extend_from_slice(&version_minor.to_le_bytes());
        out.extend_from_slice(&VERSION_MAJOR.to_le_bytes());
        vector.write(&mut out);
        Ok(out)
    }

    /// Build a header from plain values, computing its byte image, hash and
    /// HMAC under the given master keys
    pub fn compute(fields: OuterFields, version_minor: u16, keys: &MasterKeys) -> Result<Self> {
        let raw = Self::serialize_prefix(&fields, version_minor)?;

        let hash = Sha256::digest(&raw).into();

        let mut mac = keys.header_key();
        mac.update(&raw);
        let hmac = mac.finalize().into_bytes().into();

        Ok(Self {
            fields,
            version_minor,
            raw,
            hash,
            hmac,
        })
    }

    pub fn read(cursor: &mut Cursor<'_>) -> Result<Self> {
        let start = cursor.offset();

        if cursor.read_u32_le()? != MAGIC_1 {
            return Err(KdbxError::BadMagic);
        }
        if cursor.read_u32_le()? != MAGIC_2 {
            return Err(KdbxError::BadMagic);
        }

        let version_minor = cursor.read_u16_le()?;
        let version_major = cursor.read_u16_le()?;
        if version_major != VERSION_MAJOR {
            return Err(KdbxError::UnsupportedVersion(version_major));
        }

        let vector = HeaderVector::read(cursor)?;
        let raw = cursor.taken_since(start).to_vec();

        let hash = cursor.read_array::<32>()?;
        let hmac = cursor.read_array::<32>()?;

        let fields = Self::parse_fields(&vector)?;

        Ok(Self {
            fields,
            version_minor,
            raw,
            hash,
            hmac,
        })
    }

    fn parse_fields(vector: &HeaderVector) -> Result<OuterFields> {
        let cipher_bytes = vector.single(tag::CIPHER)?;
        let cipher_id = Uuid::from_slice(cipher_bytes).map_err(|_| KdbxError::HeaderFieldLength {
            tag: tag::CIPHER,
            expected: 16,
            actual: cipher_bytes.len(),
        })?;
        let cipher = OuterCipher::from_uuid(cipher_id)?;

        let compression_bytes = vector.single(tag::COMPRESSION)?;
        let compression_id =
            u32::from_le_bytes(compression_bytes.try_into().map_err(|_| {
                KdbxError::HeaderFieldLength {
                    tag: tag::COMPRESSION,
                    expected: 4,
                    actual: compression_bytes.len(),
                }
            })?);
        let compression = Compression::from_id(compression_id)?;

        let seed_bytes = vector.single(tag::SEED)?;
        let seed: [u8; 32] = seed_bytes.try_into().map_err(|_| KdbxError::HeaderFieldLength {
            tag: tag::SEED,
            expected: 32,
            actual: seed_bytes.len(),
        })?;

        let iv = vector.single(tag::IV)?.to_vec();

        let kdf_dictionary = VariantDictionary::from_bytes(vector.single(tag::KDF)?)?;
        let kdf = KdfParams::from_dictionary(&kdf_dictionary)?;

        let custom = match vector.optional_single(tag::CUSTOM)? {
            Some(bytes) => Some(VariantDictionary::from_bytes(bytes)?),
            None => None,
        };

        Ok(OuterFields {
            cipher,
            compression,
            seed,
            iv,
            kdf,
            custom,
        })
    }

    /// Re-emit the exact byte image plus the stored hash and HMAC
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.raw);
        out.extend_from_slice(&self.hash);
        out.extend_from_slice(&self.hmac);
    }

    pub fn encoded_len(&self) -> usize {
        self.raw.len() + 64
    }

    /// Recompute the hash over the stored bytes, then the HMAC under the
    /// sentinel block key; either mismatch is a fatal authentication failure
    pub fn verify(&self, keys: &MasterKeys) -> Result<()> {
        let hash: [u8; 32] = Sha256::digest(&self.raw).into();
        if !constant_time_eq(&hash, &self.hash) {
            return Err(KdbxError::HashMismatch);
        }

        let mut mac = keys.header_key();
        mac.update(&self.raw);
        let hmac = mac.finalize().into_bytes();
        if !constant_time_eq(&hmac, &self.hmac) {
            return Err(KdbxError::HeaderHmacMismatch);
        }

        tracing::trace!("outer header verified");
        Ok(())
    }

    /// Run the key chain this header describes: KDF then master keys
    pub fn derive(&self, composite: &CompositeKey) -> Result<MasterKeys> {
        let derived = self.fields.kdf.derive(composite)?;
        Ok(MasterKeys::derive(&self.fields.seed, &derived))
    }
}
