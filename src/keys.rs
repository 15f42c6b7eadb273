use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Reserved block index keying the outer header's own HMAC; never collides
/// with a real block index.
pub const HEADER_HMAC_INDEX: u64 = u64::MAX;

/// SHA-256 of the raw passphrase bytes. First link of the key chain.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PasswordKey([u8; 32]);

impl PasswordKey {
    pub fn digest(passphrase: &[u8]) -> Self {
        Self(Sha256::digest(passphrase).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// SHA-256 of the password key; the value fed to the KDF
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CompositeKey([u8; 32]);

impl CompositeKey {
    pub fn digest(password: &PasswordKey) -> Self {
        Self(Sha256::digest(password.as_bytes()).into())
    }

    /// Passphrase straight through both hash links
    pub fn from_passphrase(passphrase: &[u8]) -> Self {
        Self::digest(&PasswordKey::digest(passphrase))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// 32-byte KDF output
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; 32]);

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}

impl DerivedKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Master encryption and authentication keys, bound to one header's seed and
/// derived key. Immutable once built; rotation derives a fresh pair.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKeys {
    encryption: [u8; 32],
    hmac: [u8; 64],
}

impl MasterKeys {
    /// encryption = SHA-256(seed || derived); hmac = SHA-512(seed || derived || 0x01)
    pub fn derive(seed: &[u8; 32], derived: &DerivedKey) -> Self {
        let mut sha256 = Sha256::new();
        sha256.update(seed);
        sha256.update(derived.as_bytes());
        let encryption = sha256.finalize().into();

        let mut sha512 = Sha512::new();
        sha512.update(seed);
        sha512.update(derived.as_bytes());
        sha512.update([0x01]);
        let hmac = sha512.finalize().into();

        tracing::debug!("master keys derived");
        Self { encryption, hmac }
    }

    pub fn encryption_key(&self) -> &[u8; 32] {
        &self.encryption
    }

    /// HMAC-SHA256 keyed for one block index: SHA-512(LE64(index) || master hmac key)
    pub fn block_key(&self, index: u64) -> HmacSha256 {
        let mut sha512 = Sha512::new();
        sha512.update(index.to_le_bytes());
        sha512.update(self.hmac);
        let mut digest: [u8; 64] = sha512.finalize().into();

        let mac = HmacSha256::new_from_slice(&digest).expect("HMAC accepts any key size");
        digest.zeroize();
        mac
    }

    /// Key for the header's own HMAC, at the all-ones sentinel index
    pub fn header_key(&self) -> HmacSha256 {
        self.block_key(HEADER_HMAC_INDEX)
    }
}

/// Constant-time byte comparison for hash and HMAC checks
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_chain_known_vector() {
        // SHA-256("test"), then SHA-256 of that digest
        let password = PasswordKey::digest(b"test");
        assert_eq!(
            password.as_bytes().as_slice(),
            hex::decode("9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")
                .unwrap()
        );

        let composite = CompositeKey::digest(&password);
        assert_eq!(
            composite.as_bytes().as_slice(),
            hex::decode("954d5a49fd70d9b8bcdb35d252267829957f7ef7fa6c74f88419bdc5e82209f4")
                .unwrap()
        );
    }

    #[test]
    fn test_from_passphrase_matches_chain() {
        let chained = CompositeKey::digest(&PasswordKey::digest(b"hunter2"));
        let direct = CompositeKey::from_passphrase(b"hunter2");
        assert_eq!(chained.as_bytes(), direct.as_bytes());
    }

    #[test]
    fn test_master_keys_deterministic() {
        let seed = [7u8; 32];
        let derived = DerivedKey::new([9u8; 32]);

        let a = MasterKeys::derive(&seed, &derived);
        let b = MasterKeys::derive(&seed, &derived);
        assert_eq!(a.encryption_key(), b.encryption_key());
        assert_eq!(a.hmac, b.hmac);
    }

    #[test]
    fn test_seed_bit_flip_changes_keys() {
        let derived = DerivedKey::new([9u8; 32]);
        let a = MasterKeys::derive(&[7u8; 32], &derived);

        let mut seed = [7u8; 32];
        seed[0] ^= 0x01;
        let b = MasterKeys::derive(&seed, &derived);

        assert_ne!(a.encryption_key(), b.encryption_key());
        assert_ne!(a.hmac, b.hmac);
    }

    #[test]
    fn test_block_keys_differ_by_index() {
        let keys = MasterKeys::derive(&[1u8; 32], &DerivedKey::new([2u8; 32]));

        let mut mac0 = keys.block_key(0);
        let mut mac1 = keys.block_key(1);
        mac0.update(b"same data");
        mac1.update(b"same data");
        assert_ne!(
            mac0.finalize().into_bytes(),
            mac1.finalize().into_bytes()
        );
    }

    #[test]
    fn test_header_key_is_sentinel_block_key() {
        let keys = MasterKeys::derive(&[1u8; 32], &DerivedKey::new([2u8; 32]));

        let mut a = keys.header_key();
        let mut b = keys.block_key(HEADER_HMAC_INDEX);
        a.update(b"header bytes");
        b.update(b"header bytes");
        assert_eq!(a.finalize().into_bytes(), b.finalize().into_bytes());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_eq(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_eq(&[1, 2, 3], &[1, 2]));
        assert!(constant_time_eq(&[], &[]));
    }
}
