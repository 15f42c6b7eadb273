use crate::cursor::Cursor;
use crate::error::{KdbxError, Result};

/// One tagged, length-prefixed record: `[u8 kind][u32 LE length][value]`.
/// Kind 0 with an empty value is the stream terminator and never carries data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvRecord {
    pub kind: u8,
    pub value: Vec<u8>,
}

impl TlvRecord {
    pub const TERMINATOR: u8 = 0x00;

    pub fn new(kind: u8, value: Vec<u8>) -> Self {
        Self { kind, value }
    }

    pub fn read(cursor: &mut Cursor<'_>) -> Result<Self> {
        let kind = cursor.read_u8()?;
        let length = cursor.read_u32_le()? as usize;
        let value = cursor.read_exact(length)?.to_vec();
        Ok(Self { kind, value })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.push(self.kind);
        out.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.value);
    }

    pub fn encoded_len(&self) -> usize {
        1 + 4 + self.value.len()
    }

    fn write_terminator(out: &mut Vec<u8>) {
        out.push(Self::TERMINATOR);
        out.extend_from_slice(&0u32.to_le_bytes());
    }
}

/// An ordered per-tag multiset of TLV records, terminated on the wire by a
/// kind-0 record. The exact record order is preserved across a decode/encode
/// round trip because the outer header's hash and HMAC cover the verbatim
/// serialized bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderVector {
    records: Vec<TlvRecord>,
}

impl HeaderVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: u8, value: Vec<u8>) {
        self.records.push(TlvRecord::new(kind, value));
    }

    pub fn records(&self) -> &[TlvRecord] {
        &self.records
    }

    /// Accumulate records in encounter order until the terminator
    pub fn read(cursor: &mut Cursor<'_>) -> Result<Self> {
        let mut records = Vec::new();
        loop {
            let record = TlvRecord::read(cursor)?;
            if record.kind == TlvRecord::TERMINATOR {
                break;
            }
            records.push(record);
        }
        Ok(Self { records })
    }

    /// Re-emit records in stored order, then the terminator
    pub fn write(&self, out: &mut Vec<u8>) {
        for record in &self.records {
            record.write(out);
        }
        TlvRecord::write_terminator(out);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write(&mut out);
        out
    }

    pub fn encoded_len(&self) -> usize {
        self.records.iter().map(TlvRecord::encoded_len).sum::<usize>() + 5
    }

    /// All values stored under a tag, in encounter order
    pub fn values(&self, kind: u8) -> impl Iterator<Item = &[u8]> {
        self.records
            .iter()
            .filter(move |r| r.kind == kind)
            .map(|r| r.value.as_slice())
    }

    /// Exactly one value must exist for the tag
    pub fn single(&self, kind: u8) -> Result<&[u8]> {
        let mut values = self.values(kind);
        let first = values.next().ok_or(KdbxError::MissingHeaderField(kind))?;
        if values.next().is_some() {
            return Err(KdbxError::DuplicateHeaderField(kind));
        }
        Ok(first)
    }

    /// At most one value may exist for the tag
    pub fn optional_single(&self, kind: u8) -> Result<Option<&[u8]>> {
        let mut values = self.values(kind);
        let first = values.next();
        if values.next().is_some() {
            return Err(KdbxError::DuplicateHeaderField(kind));
        }
        Ok(first)
    }

    /// One or more values must exist for the tag
    pub fn at_least_one(&self, kind: u8) -> Result<Vec<&[u8]>> {
        let values: Vec<&[u8]> = self.values(kind).collect();
        if values.is_empty() {
            return Err(KdbxError::EmptyHeaderField(kind));
        }
        Ok(values)
    }
}
