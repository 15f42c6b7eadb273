use crate::cursor::Cursor;
use crate::error::{KdbxError, Result};

/// A self-describing typed value inside a variant dictionary.
/// Each variant carries a fixed one-byte wire discriminant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    UInt32(u32),
    UInt64(u64),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    String(String),
    Bytes(Vec<u8>),
}

impl Variant {
    pub const UINT32: u8 = 0x04;
    pub const UINT64: u8 = 0x05;
    pub const BOOL: u8 = 0x08;
    pub const INT32: u8 = 0x0C;
    pub const INT64: u8 = 0x0D;
    pub const STRING: u8 = 0x18;
    pub const BYTES: u8 = 0x42;

    pub fn discriminant(&self) -> u8 {
        match self {
            Self::UInt32(_) => Self::UINT32,
            Self::UInt64(_) => Self::UINT64,
            Self::Bool(_) => Self::BOOL,
            Self::Int32(_) => Self::INT32,
            Self::Int64(_) => Self::INT64,
            Self::String(_) => Self::STRING,
            Self::Bytes(_) => Self::BYTES,
        }
    }

    /// Decode a value slice under the given discriminant.
    /// Fixed-width variants must span their exact width; strings and bytes
    /// span the whole slice.
    pub fn parse(discriminant: u8, value: &[u8]) -> Result<Self> {
        match discriminant {
            Self::UINT32 => Ok(Self::UInt32(u32::from_le_bytes(fixed(value)?))),
            Self::UINT64 => Ok(Self::UInt64(u64::from_le_bytes(fixed(value)?))),
            Self::BOOL => {
                let [byte] = fixed(value)?;
                match byte {
                    0 => Ok(Self::Bool(false)),
                    1 => Ok(Self::Bool(true)),
                    other => Err(KdbxError::InvalidBool(other)),
                }
            }
            // Signed integers travel as two's-complement unsigned words
            Self::INT32 => Ok(Self::Int32(u32::from_le_bytes(fixed(value)?) as i32)),
            Self::INT64 => Ok(Self::Int64(u64::from_le_bytes(fixed(value)?) as i64)),
            Self::STRING => Ok(Self::String(
                String::from_utf8(value.to_vec()).map_err(|_| KdbxError::InvalidUtf8)?,
            )),
            Self::BYTES => Ok(Self::Bytes(value.to_vec())),
            other => Err(KdbxError::UnknownVariantType(other)),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::UInt32(v) => v.to_le_bytes().to_vec(),
            Self::UInt64(v) => v.to_le_bytes().to_vec(),
            Self::Bool(v) => vec![u8::from(*v)],
            Self::Int32(v) => (*v as u32).to_le_bytes().to_vec(),
            Self::Int64(v) => (*v as u64).to_le_bytes().to_vec(),
            Self::String(v) => v.as_bytes().to_vec(),
            Self::Bytes(v) => v.clone(),
        }
    }
}

fn fixed<const N: usize>(value: &[u8]) -> Result<[u8; N]> {
    value
        .try_into()
        .map_err(|_| KdbxError::VariantLengthMismatch)
}

/// A self-describing ordered map of typed values, framed by a 2-byte version
/// and terminated by a type-0 record. Carries KDF parameters and user custom
/// data in the outer header.
///
/// Entries keep insertion order for byte-faithful re-encoding. Lookups walk
/// backwards so a duplicated key resolves to its last occurrence, matching
/// the reference decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDictionary {
    pub minor: u8,
    pub major: u8,
    entries: Vec<(String, Variant)>,
}

impl VariantDictionary {
    /// Wire version emitted for locally built dictionaries
    pub const VERSION_MAJOR: u8 = 1;
    pub const VERSION_MINOR: u8 = 0;

    pub fn new() -> Self {
        Self {
            minor: Self::VERSION_MINOR,
            major: Self::VERSION_MAJOR,
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Variant) {
        self.entries.push((key.into(), value));
    }

    pub fn entries(&self) -> &[(String, Variant)] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Variant> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_u32(&self, key: &'static str) -> Result<u32> {
        match self.require(key)? {
            Variant::UInt32(v) => Ok(*v),
            _ => Err(KdbxError::WrongVariantType(key)),
        }
    }

    pub fn get_u64(&self, key: &'static str) -> Result<u64> {
        match self.require(key)? {
            Variant::UInt64(v) => Ok(*v),
            _ => Err(KdbxError::WrongVariantType(key)),
        }
    }

    pub fn get_bytes(&self, key: &'static str) -> Result<&[u8]> {
        match self.require(key)? {
            Variant::Bytes(v) => Ok(v),
            _ => Err(KdbxError::WrongVariantType(key)),
        }
    }

    fn require(&self, key: &'static str) -> Result<&Variant> {
        self.get(key).ok_or(KdbxError::MissingDictionaryKey(key))
    }

    pub fn read(cursor: &mut Cursor<'_>) -> Result<Self> {
        let minor = cursor.read_u8()?;
        let major = cursor.read_u8()?;
        if major != Self::VERSION_MAJOR {
            return Err(KdbxError::UnsupportedDictionaryVersion(major));
        }

        let mut entries = Vec::new();
        loop {
            let discriminant = cursor.read_u8()?;
            if discriminant == 0 {
                break;
            }
            let key_len = cursor.read_u32_le()? as usize;
            let key = String::from_utf8(cursor.read_exact(key_len)?.to_vec())
                .map_err(|_| KdbxError::InvalidUtf8)?;
            let value_len = cursor.read_u32_le()? as usize;
            let value = Variant::parse(discriminant, cursor.read_exact(value_len)?)?;
            entries.push((key, value));
        }

        Ok(Self {
            minor,
            major,
            entries,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.push(self.minor);
        out.push(self.major);
        for (key, value) in &self.entries {
            let value_bytes = value.to_bytes();
            out.push(value.discriminant());
            out.extend_from_slice(&(key.len() as u32).to_le_bytes());
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(&(value_bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(&value_bytes);
        }
        out.push(0x00);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let dictionary = Self::read(&mut cursor)?;
        Ok(dictionary)
    }
}

impl Default for VariantDictionary {
    fn default() -> Self {
        Self::new()
    }
}
