use crate::block::{open_blocks, read_blocks, seal_blocks, Block};
use crate::cursor::Cursor;
use crate::error::Result;
use crate::inner::{InnerHeader, ProtectedStream};
use crate::keys::{CompositeKey, MasterKeys};
use crate::outer::{OuterFields, OuterHeader};

/// A password database as it sits on disk: verified-but-opaque outer header
/// followed by the authenticated ciphertext block chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedDatabase {
    pub outer: OuterHeader,
    pub blocks: Vec<Block>,
}

impl EncryptedDatabase {
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let outer = OuterHeader::read(&mut cursor)?;
        let blocks = read_blocks(&mut cursor)?;
        Ok(Self { outer, blocks })
    }

    pub fn write(&self) -> Vec<u8> {
        let blocks_len: usize = self.blocks.iter().map(Block::encoded_len).sum();
        let mut out = Vec::with_capacity(self.outer.encoded_len() + blocks_len);
        self.outer.write(&mut out);
        for block in &self.blocks {
            block.write(&mut out);
        }
        out
    }

    /// The verified read path: derive keys, authenticate the header, then
    /// every block, then decrypt the whole ciphertext in one pass and undo
    /// compression. Nothing is decrypted before it is authenticated, and no
    /// partial plaintext ever escapes on failure.
    pub fn decrypt(&self, composite: &CompositeKey) -> Result<DecryptedDatabase> {
        let keys = self.outer.derive(composite)?;
        self.outer.verify(&keys)?;

        let ciphertext = open_blocks(&self.blocks, &keys)?;

        let fields = self.outer.fields();
        let packed = fields
            .cipher
            .decrypt(keys.encryption_key(), &fields.iv, &ciphertext)?;
        let plaintext = fields.compression.unpack(&packed)?;

        let mut cursor = Cursor::new(&plaintext);
        let inner = InnerHeader::read(&mut cursor)?;
        let content = cursor.read_rest().to_vec();

        tracing::debug!(content = content.len(), "database decrypted");

        Ok(DecryptedDatabase {
            fields: fields.clone(),
            version_minor: self.outer.version_minor(),
            keys,
            inner,
            content,
        })
    }

    /// Parse and decrypt in one call, running the passphrase through the
    /// full key chain
    pub fn decrypt_with_passphrase(bytes: &[u8], passphrase: &[u8]) -> Result<DecryptedDatabase> {
        let composite = CompositeKey::from_passphrase(passphrase);
        Self::read(bytes)?.decrypt(&composite)
    }
}

/// A decrypted database: the outer header's plain values, the master keys
/// they derive, the inner header, and the document content bytes.
///
/// `content` is handed to the document-model layer as-is; protected fields
/// inside it are still base64 ciphertext, unlocked field by field through
/// [`DecryptedDatabase::protected_stream`].
pub struct DecryptedDatabase {
    fields: OuterFields,
    version_minor: u16,
    keys: MasterKeys,
    inner: InnerHeader,
    content: Vec<u8>,
}

impl std::fmt::Debug for DecryptedDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DecryptedDatabase(..)")
    }
}

impl DecryptedDatabase {
    /// Assemble a database from scratch, deriving master keys for the given
    /// composite key
    pub fn create(
        fields: OuterFields,
        version_minor: u16,
        inner: InnerHeader,
        content: Vec<u8>,
        composite: &CompositeKey,
    ) -> Result<Self> {
        let derived = fields.kdf.derive(composite)?;
        let keys = MasterKeys::derive(&fields.seed, &derived);
        Ok(Self {
            fields,
            version_minor,
            keys,
            inner,
            content,
        })
    }

    pub fn fields(&self) -> &OuterFields {
        &self.fields
    }

    pub fn inner(&self) -> &InnerHeader {
        &self.inner
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn set_content(&mut self, content: Vec<u8>) {
        self.content = content;
    }

    /// Keystream for the document layer to unprotect or reprotect flagged
    /// fields, starting at position zero
    pub fn protected_stream(&self) -> Result<ProtectedStream> {
        self.inner.stream()
    }

    /// Re-seal under the current header values and keys: serialize inner
    /// header and content, compress, encrypt, split into authenticated
    /// blocks
    pub fn encrypt(&self) -> Result<EncryptedDatabase> {
        let outer = OuterHeader::compute(self.fields.clone(), self.version_minor, &self.keys)?;

        let mut plaintext = self.inner.to_bytes();
        plaintext.extend_from_slice(&self.content);

        let packed = self.fields.compression.pack(&plaintext)?;
        let ciphertext =
            self.fields
                .cipher
                .encrypt(self.keys.encryption_key(), &self.fields.iv, &packed)?;

        let blocks = seal_blocks(&ciphertext, &self.keys);

        tracing::debug!(blocks = blocks.len(), "database encrypted");
        Ok(EncryptedDatabase { outer, blocks })
    }

    /// Fresh outer randomness (seed, IV, KDF salt) and a fresh inner seed,
    /// with master keys re-derived for the new header. Content is carried
    /// over unchanged.
    pub fn rotate(&self, composite: &CompositeKey) -> Result<Self> {
        let fields = self.fields.rotate();
        let derived = fields.kdf.derive(composite)?;
        let keys = MasterKeys::derive(&fields.seed, &derived);

        Ok(Self {
            fields,
            version_minor: self.version_minor,
            keys,
            inner: self.inner.rotate(),
            content: self.content.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{Compression, OuterCipher};
    use crate::error::KdbxError;
    use crate::inner::StreamCipherId;
    use crate::kdf::{Argon2Variant, KdfParams};

    fn test_fields() -> OuterFields {
        OuterFields {
            cipher: OuterCipher::Aes256Cbc,
            compression: Compression::Gzip,
            seed: [0xA1; 32],
            iv: vec![0xB2; 16],
            kdf: KdfParams::Argon2 {
                variant: Argon2Variant::Argon2id,
                version: 0x13,
                memory: 1024 * 1024,
                iterations: 1,
                parallelism: 1,
                salt: [0xC3; 32],
            },
            custom: None,
        }
    }

    fn test_inner() -> InnerHeader {
        InnerHeader {
            cipher: StreamCipherId::ChaCha20,
            seed: vec![0xD4; 32],
            binaries: vec![vec![0x00]],
        }
    }

    fn test_document(title: &str, username: &str, protected_password: &str) -> Vec<u8> {
        format!(
            "<KeePassFile><Root><Group><Entry>\
             <String><Key>Title</Key><Value>{title}</Value></String>\
             <String><Key>UserName</Key><Value>{username}</Value></String>\
             <String><Key>Password</Key><Value Protected=\"True\">{protected_password}</Value></String>\
             </Entry></Group></Root></KeePassFile>"
        )
        .into_bytes()
    }

    fn build_database(composite: &CompositeKey) -> DecryptedDatabase {
        let inner = test_inner();
        let password_b64 = inner.stream().unwrap().protect(b"s3cret");
        let content = test_document("Mailbox", "alice", &password_b64);
        DecryptedDatabase::create(test_fields(), 1, inner, content, composite).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let composite = CompositeKey::from_passphrase(b"test");
        let database = build_database(&composite);

        let bytes = database.encrypt().unwrap().write();
        let decrypted = EncryptedDatabase::decrypt_with_passphrase(&bytes, b"test").unwrap();

        assert_eq!(decrypted.content(), database.content());
        assert_eq!(decrypted.inner(), database.inner());
        assert_eq!(decrypted.fields(), database.fields());
    }

    #[test]
    fn test_wrong_passphrase_fails_closed() {
        let composite = CompositeKey::from_passphrase(b"test");
        let bytes = build_database(&composite).encrypt().unwrap().write();

        let err = EncryptedDatabase::decrypt_with_passphrase(&bytes, b"wrong").unwrap_err();
        assert!(err.is_authentication());
    }

    #[test]
    fn test_tampered_ciphertext_never_decrypted() {
        let composite = CompositeKey::from_passphrase(b"test");
        let bytes = build_database(&composite).encrypt().unwrap().write();

        let mut encrypted = EncryptedDatabase::read(&bytes).unwrap();
        encrypted.blocks[0].data[0] ^= 0xFF;

        let err = encrypted.decrypt(&composite).unwrap_err();
        assert!(matches!(err, KdbxError::HmacMismatch(0)));
    }

    #[test]
    fn test_truncated_file() {
        let composite = CompositeKey::from_passphrase(b"test");
        let bytes = build_database(&composite).encrypt().unwrap().write();

        let err = EncryptedDatabase::read(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, KdbxError::Truncated { .. }));
    }

    #[test]
    fn test_rotation_end_to_end() {
        let composite = CompositeKey::from_passphrase(b"test");
        let database = build_database(&composite);

        // Recover the protected password before rotation
        let password_b64 = {
            let content = String::from_utf8(database.content().to_vec()).unwrap();
            let start = content.find("Protected=\"True\">").unwrap() + 17;
            let end = content[start..].find('<').unwrap() + start;
            content[start..end].to_string()
        };
        let password = database
            .protected_stream()
            .unwrap()
            .unprotect(&password_b64)
            .unwrap();
        assert_eq!(password, b"s3cret");

        let bytes_before = database.encrypt().unwrap().write();

        // Rotate: reprotect the password under the new inner seed, as the
        // document layer would, then re-encrypt
        let mut rotated = database.rotate(&composite).unwrap();
        let reprotected = rotated.protected_stream().unwrap().protect(&password);
        rotated.set_content(test_document("Mailbox", "alice", &reprotected));

        let bytes_after = rotated.encrypt().unwrap().write();
        assert_ne!(bytes_before, bytes_after);

        let decrypted = EncryptedDatabase::decrypt_with_passphrase(&bytes_after, b"test").unwrap();
        let content = String::from_utf8(decrypted.content().to_vec()).unwrap();
        assert!(content.contains("<Value>Mailbox</Value>"));
        assert!(content.contains("<Value>alice</Value>"));

        let recovered = decrypted
            .protected_stream()
            .unwrap()
            .unprotect(&reprotected)
            .unwrap();
        assert_eq!(recovered, b"s3cret");
    }

    #[test]
    fn test_no_compression_roundtrip() {
        let composite = CompositeKey::from_passphrase(b"test");
        let mut fields = test_fields();
        fields.compression = Compression::None;
        let database =
            DecryptedDatabase::create(fields, 0, test_inner(), b"raw body".to_vec(), &composite)
                .unwrap();

        let bytes = database.encrypt().unwrap().write();
        let decrypted = EncryptedDatabase::decrypt_with_passphrase(&bytes, b"test").unwrap();
        assert_eq!(decrypted.content(), b"raw body");
    }

    #[test]
    fn test_empty_content_roundtrip() {
        let composite = CompositeKey::from_passphrase(b"test");
        let database =
            DecryptedDatabase::create(test_fields(), 1, test_inner(), Vec::new(), &composite)
                .unwrap();

        let bytes = database.encrypt().unwrap().write();
        let decrypted = EncryptedDatabase::decrypt_with_passphrase(&bytes, b"test").unwrap();
        assert!(decrypted.content().is_empty());
    }

    #[test]
    fn test_aes_kdf_file_reports_unsupported() {
        let composite = CompositeKey::from_passphrase(b"test");
        let mut fields = test_fields();
        fields.kdf = KdfParams::AesKdf {
            rounds: 60000,
            seed: vec![0x55; 32],
        };

        let err = DecryptedDatabase::create(fields, 1, test_inner(), Vec::new(), &composite)
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}
