use crate::cursor::Cursor;
use crate::error::{KdbxError, Result};
use crate::keys::{constant_time_eq, MasterKeys};
use hmac::Mac;

/// Ciphertext split size: each block carries at most 1 MiB
pub const BLOCK_SPLIT: usize = 1_048_576;

/// One HMAC-authenticated ciphertext block:
/// `[32B hmac][u32 LE length][length B ciphertext]`.
/// A zero-length block terminates the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub hmac: [u8; 32],
    pub data: Vec<u8>,
}

impl Block {
    pub fn is_terminator(&self) -> bool {
        self.data.is_empty()
    }

    pub fn read(cursor: &mut Cursor<'_>) -> Result<Self> {
        let hmac = cursor.read_array::<32>()?;
        let length = cursor.read_u32_le()? as usize;
        let data = cursor.read_exact(length)?.to_vec();
        Ok(Self { hmac, data })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.hmac);
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
    }

    pub fn encoded_len(&self) -> usize {
        32 + 4 + self.data.len()
    }
}

/// HMAC preimage for one block: LE64(index) || LE32(len) || data
fn block_mac(keys: &MasterKeys, index: u64, data: &[u8]) -> [u8; 32] {
    let mut mac = keys.block_key(index);
    mac.update(&index.to_le_bytes());
    mac.update(&(data.len() as u32).to_le_bytes());
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Split ciphertext into authenticated 1 MiB blocks plus the authenticated
/// zero-length terminator at the next index. Empty ciphertext yields just
/// the terminator.
pub fn seal_blocks(ciphertext: &[u8], keys: &MasterKeys) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(ciphertext.len() / BLOCK_SPLIT + 2);
    let mut index = 0u64;

    for chunk in ciphertext.chunks(BLOCK_SPLIT) {
        blocks.push(Block {
            hmac: block_mac(keys, index, chunk),
            data: chunk.to_vec(),
        });
        index += 1;
    }

    blocks.push(Block {
        hmac: block_mac(keys, index, &[]),
        data: Vec::new(),
    });

    tracing::debug!(blocks = blocks.len(), "sealed ciphertext blocks");
    blocks
}

/// Read blocks by strictly increasing index until and including the first
/// zero-length terminator
pub fn read_blocks(cursor: &mut Cursor<'_>) -> Result<Vec<Block>> {
    let mut blocks = Vec::new();
    loop {
        let block = Block::read(cursor)?;
        let done = block.is_terminator();
        blocks.push(block);
        if done {
            return Ok(blocks);
        }
    }
}

/// Verify every block in index order — including the terminator — then
/// concatenate the ciphertext. The first mismatch aborts before any later
/// block is inspected and no data is returned.
pub fn open_blocks(blocks: &[Block], keys: &MasterKeys) -> Result<Vec<u8>> {
    for (index, block) in blocks.iter().enumerate() {
        let expected = block_mac(keys, index as u64, &block.data);
        if !constant_time_eq(&expected, &block.hmac) {
            return Err(KdbxError::HmacMismatch(index as u64));
        }
    }

    let total = blocks.iter().map(|b| b.data.len()).sum();
    let mut ciphertext = Vec::with_capacity(total);
    for block in blocks {
        ciphertext.extend_from_slice(&block.data);
    }

    tracing::debug!(bytes = ciphertext.len(), "opened ciphertext blocks");
    Ok(ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::DerivedKey;

    fn test_keys() -> MasterKeys {
        MasterKeys::derive(&[3u8; 32], &DerivedKey::new([4u8; 32]))
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_block_wire_roundtrip() {
        let block = Block {
            hmac: [0xAB; 32],
            data: vec![1, 2, 3],
        };
        let mut bytes = Vec::new();
        block.write(&mut bytes);
        assert_eq!(bytes.len(), block.encoded_len());

        let restored = Block::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(block, restored);
    }

    #[test]
    fn test_split_boundaries() {
        let keys = test_keys();
        for len in [0usize, 1, BLOCK_SPLIT, BLOCK_SPLIT + 1, 3 * BLOCK_SPLIT] {
            let data = patterned(len);
            let blocks = seal_blocks(&data, &keys);

            let expected_data_blocks = len.div_ceil(BLOCK_SPLIT);
            assert_eq!(blocks.len(), expected_data_blocks + 1);
            assert!(blocks.last().unwrap().is_terminator());

            let opened = open_blocks(&blocks, &keys).unwrap();
            assert_eq!(opened, data, "length {}", len);
        }
    }

    #[test]
    fn test_stream_roundtrip() {
        let keys = test_keys();
        let data = patterned(2 * BLOCK_SPLIT + 17);
        let blocks = seal_blocks(&data, &keys);

        let mut bytes = Vec::new();
        for block in &blocks {
            block.write(&mut bytes);
        }

        let mut cursor = Cursor::new(&bytes);
        let restored = read_blocks(&mut cursor).unwrap();
        assert!(cursor.is_empty());
        assert_eq!(restored, blocks);
    }

    #[test]
    fn test_missing_terminator_is_truncation() {
        let keys = test_keys();
        let blocks = seal_blocks(&patterned(100), &keys);

        let mut bytes = Vec::new();
        blocks[0].write(&mut bytes);
        // No terminator follows the data block

        let err = read_blocks(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, KdbxError::Truncated { .. }));
    }

    #[test]
    fn test_tampered_block_aborts_with_index() {
        let keys = test_keys();
        let mut blocks = seal_blocks(&patterned(4 * BLOCK_SPLIT), &keys);

        blocks[3].data[7] ^= 0xFF;

        let err = open_blocks(&blocks, &keys).unwrap_err();
        assert!(matches!(err, KdbxError::HmacMismatch(3)));
        assert!(err.is_authentication());
    }

    #[test]
    fn test_reordered_blocks_rejected() {
        let keys = test_keys();
        let mut blocks = seal_blocks(&patterned(3 * BLOCK_SPLIT), &keys);

        blocks.swap(0, 1);

        let err = open_blocks(&blocks, &keys).unwrap_err();
        assert!(matches!(err, KdbxError::HmacMismatch(0)));
    }

    #[test]
    fn test_tampered_terminator_rejected() {
        let keys = test_keys();
        let mut blocks = seal_blocks(&patterned(10), &keys);

        let last = blocks.len() - 1;
        blocks[last].hmac[0] ^= 0x01;

        let err = open_blocks(&blocks, &keys).unwrap_err();
        assert!(matches!(err, KdbxError::HmacMismatch(1)));
    }

    #[test]
    fn test_wrong_keys_rejected_at_block_zero() {
        let keys = test_keys();
        let blocks = seal_blocks(&patterned(10), &keys);

        let other = MasterKeys::derive(&[9u8; 32], &DerivedKey::new([4u8; 32]));
        let err = open_blocks(&blocks, &other).unwrap_err();
        assert!(matches!(err, KdbxError::HmacMismatch(0)));
    }
}
