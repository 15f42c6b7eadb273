use crate::dictionary::{Variant, VariantDictionary};
use crate::error::{KdbxError, Result};
use crate::keys::{CompositeKey, DerivedKey};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use uuid::{uuid, Uuid};

/// Argon2 flavor selected by the KDF dictionary's `$UUID`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argon2Variant {
    Argon2d,
    Argon2id,
}

impl Argon2Variant {
    fn algorithm(&self) -> Algorithm {
        match self {
            Self::Argon2d => Algorithm::Argon2d,
            Self::Argon2id => Algorithm::Argon2id,
        }
    }

    fn uuid(&self) -> Uuid {
        match self {
            Self::Argon2d => KdfParams::ARGON2D,
            Self::Argon2id => KdfParams::ARGON2ID,
        }
    }
}

/// Key-derivation parameters carried in the outer header's tag-11 dictionary.
///
/// AES-KDF files parse and re-encode, but derivation is an explicit
/// unsupported-algorithm failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KdfParams {
    AesKdf {
        rounds: u32,
        seed: Vec<u8>,
    },
    Argon2 {
        variant: Argon2Variant,
        /// 0x10 or 0x13
        version: u32,
        /// Memory cost in bytes
        memory: u64,
        iterations: u64,
        parallelism: u32,
        salt: [u8; 32],
    },
}

impl KdfParams {
    pub const AES_KDF: Uuid = uuid!("c9d9f39a-628a-4460-bf74-0d08c18a4fea");
    pub const ARGON2D: Uuid = uuid!("ef636ddf-8c29-444b-91f7-a9a403e30a0c");
    pub const ARGON2ID: Uuid = uuid!("9e298b19-56db-4773-b23d-fc3ec6f0a1e6");

    pub fn from_dictionary(dictionary: &VariantDictionary) -> Result<Self> {
        let id_bytes = dictionary.get_bytes("$UUID")?;
        let id = Uuid::from_slice(id_bytes).map_err(|_| KdbxError::VariantLengthMismatch)?;

        match id {
            Self::AES_KDF => Ok(Self::AesKdf {
                rounds: dictionary.get_u32("R")?,
                seed: dictionary.get_bytes("S")?.to_vec(),
            }),
            Self::ARGON2D => Self::parse_argon2(dictionary, Argon2Variant::Argon2d),
            Self::ARGON2ID => Self::parse_argon2(dictionary, Argon2Variant::Argon2id),
            other => Err(KdbxError::UnknownKdf(other)),
        }
    }

    fn parse_argon2(dictionary: &VariantDictionary, variant: Argon2Variant) -> Result<Self> {
        let version = dictionary.get_u32("V")?;
        if version != 0x10 && version != 0x13 {
            return Err(KdbxError::InvalidArgon2Version(version));
        }

        let salt: [u8; 32] = dictionary
            .get_bytes("S")?
            .try_into()
            .map_err(|_| KdbxError::VariantLengthMismatch)?;

        Ok(Self::Argon2 {
            variant,
            version,
            memory: dictionary.get_u64("M")?,
            iterations: dictionary.get_u64("I")?,
            parallelism: dictionary.get_u32("P")?,
            salt,
        })
    }

    pub fn to_dictionary(&self) -> VariantDictionary {
        let mut dictionary = VariantDictionary::new();
        match self {
            Self::AesKdf { rounds, seed } => {
                dictionary.insert("$UUID", Variant::Bytes(Self::AES_KDF.as_bytes().to_vec()));
                dictionary.insert("R", Variant::UInt32(*rounds));
                dictionary.insert("S", Variant::Bytes(seed.clone()));
            }
            Self::Argon2 {
                variant,
                version,
                memory,
                iterations,
                parallelism,
                salt,
            } => {
                dictionary.insert("$UUID", Variant::Bytes(variant.uuid().as_bytes().to_vec()));
                dictionary.insert("S", Variant::Bytes(salt.to_vec()));
                dictionary.insert("P", Variant::UInt32(*parallelism));
                dictionary.insert("M", Variant::UInt64(*memory));
                dictionary.insert("I", Variant::UInt64(*iterations));
                dictionary.insert("V", Variant::UInt32(*version));
            }
        }
        dictionary
    }

    /// Same parameters, fresh random salt or seed
    pub fn rotate(&self) -> Self {
        let mut fresh = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut fresh);

        match self {
            Self::AesKdf { rounds, .. } => Self::AesKdf {
                rounds: *rounds,
                seed: fresh.to_vec(),
            },
            Self::Argon2 {
                variant,
                version,
                memory,
                iterations,
                parallelism,
                ..
            } => Self::Argon2 {
                variant: *variant,
                version: *version,
                memory: *memory,
                iterations: *iterations,
                parallelism: *parallelism,
                salt: fresh,
            },
        }
    }

    /// Stretch the composite key into the 32-byte derived key
    pub fn derive(&self, composite: &CompositeKey) -> Result<DerivedKey> {
        match self {
            Self::AesKdf { .. } => Err(KdbxError::UnsupportedAlgorithm("AES-KDF")),
            Self::Argon2 {
                variant,
                version,
                memory,
                iterations,
                parallelism,
                salt,
            } => {
                let version = Version::try_from(*version)
                    .map_err(|_| KdbxError::InvalidArgon2Version(*version))?;
                let params = Params::new(
                    (memory / 1024) as u32,
                    *iterations as u32,
                    *parallelism,
                    Some(32),
                )
                .map_err(|e| KdbxError::Kdf(e.to_string()))?;

                tracing::debug!(
                    memory_kib = memory / 1024,
                    iterations,
                    parallelism,
                    "running argon2"
                );

                let mut output = [0u8; 32];
                Argon2::new(variant.algorithm(), version, params)
                    .hash_password_into(composite.as_bytes(), salt, &mut output)
                    .map_err(|e| KdbxError::Kdf(e.to_string()))?;
                Ok(DerivedKey::new(output))
            }
        }
    }
}
