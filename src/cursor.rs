use crate::error::{KdbxError, Result};

/// Bounds-checked little-endian reader over a byte slice.
/// Every decoder in this crate reads through one of these; a short read
/// surfaces as `KdbxError::Truncated` instead of a panic.
#[derive(Debug)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Current position from the start of the slice
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Take the next `len` bytes
    pub fn read_exact(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(KdbxError::Truncated {
                offset: self.offset,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Take the next `N` bytes as a fixed-size array
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.read_exact(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(slice);
        Ok(array)
    }

    /// Take everything left
    pub fn read_rest(&mut self) -> &'a [u8] {
        let slice = &self.bytes[self.offset..];
        self.offset = self.bytes.len();
        slice
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// The slice between a saved offset and the current position
    pub fn taken_since(&self, start: usize) -> &'a [u8] {
        &self.bytes[start..self.offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integers() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut cursor = Cursor::new(&bytes);
        assert_eq!(cursor.read_u8().unwrap(), 0x01);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x0302);
        assert_eq!(cursor.read_u32_le().unwrap(), 0x07060504);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_truncated_read() {
        let bytes = [0x01, 0x02];
        let mut cursor = Cursor::new(&bytes);
        let err = cursor.read_u32_le().unwrap_err();
        assert!(matches!(
            err,
            KdbxError::Truncated {
                offset: 0,
                needed: 2
            }
        ));
        // Failed read consumes nothing
        assert_eq!(cursor.remaining(), 2);
    }

    #[test]
    fn test_taken_since() {
        let bytes = [1, 2, 3, 4, 5];
        let mut cursor = Cursor::new(&bytes);
        cursor.read_u8().unwrap();
        let start = cursor.offset();
        cursor.read_exact(3).unwrap();
        assert_eq!(cursor.taken_since(start), &[2, 3, 4]);
    }

    #[test]
    fn test_read_rest() {
        let bytes = [1, 2, 3];
        let mut cursor = Cursor::new(&bytes);
        cursor.read_u8().unwrap();
        assert_eq!(cursor.read_rest(), &[2, 3]);
        assert!(cursor.is_empty());
    }
}
