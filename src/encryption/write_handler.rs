//! Write-side encryption.
//!
//! `EncryptDictBuilder` derives the /O, /U, and file-key values for a
//! rebuilt document; `EncryptionWriteHandler` encrypts strings and
//! streams while objects are serialized. The /Encrypt dictionary itself
//! is never encrypted.

use super::Algorithm;
use super::aes;
use super::algorithms;
use super::rc4;
use crate::object::Object;
use md5::{Digest, Md5};
use std::collections::HashMap;

/// Builds the /Encrypt dictionary and the file encryption key.
pub struct EncryptDictBuilder {
    algorithm: Algorithm,
    user_password: Vec<u8>,
    owner_password: Vec<u8>,
    permissions: i32,
}

impl EncryptDictBuilder {
    /// Start a builder for the given algorithm and credentials.
    pub fn new(algorithm: Algorithm, user_password: &[u8], owner_password: &[u8]) -> Self {
        Self {
            algorithm,
            user_password: user_password.to_vec(),
            owner_password: owner_password.to_vec(),
            // All permission bits granted; the high bits must be set per spec
            permissions: -4,
        }
    }

    /// Override the permission bits (P value).
    pub fn permissions(mut self, permissions: i32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Derive the dictionary and the file encryption key for the given
    /// file identifier.
    pub fn build(&self, file_id: &[u8]) -> (HashMap<String, Object>, Vec<u8>) {
        let (version, revision) = self.algorithm.version_revision();
        let key_length = self.algorithm.key_length();

        let owner_hash = algorithms::compute_owner_password_hash(
            &self.owner_password,
            &self.user_password,
            revision,
            key_length,
        );

        let encryption_key = algorithms::compute_encryption_key(
            &self.user_password,
            &owner_hash,
            self.permissions,
            file_id,
            revision,
            key_length,
            true,
        );

        let user_hash = algorithms::compute_user_password_hash(&encryption_key, file_id, revision);

        let mut dict = HashMap::new();
        dict.insert("Filter".to_string(), Object::Name("Standard".to_string()));
        dict.insert("V".to_string(), Object::Integer(version as i64));
        dict.insert("R".to_string(), Object::Integer(revision as i64));
        dict.insert("Length".to_string(), Object::Integer((key_length * 8) as i64));
        dict.insert("O".to_string(), Object::String(owner_hash));
        dict.insert("U".to_string(), Object::String(user_hash));
        dict.insert("P".to_string(), Object::Integer(self.permissions as i64));

        (dict, encryption_key)
    }
}

/// Encrypts PDF objects during write operations.
pub struct EncryptionWriteHandler {
    /// The file encryption key
    encryption_key: Vec<u8>,
    /// The encryption algorithm in use
    algorithm: Algorithm,
}

impl EncryptionWriteHandler {
    /// Create a handler from an already derived file key.
    pub fn from_key(encryption_key: Vec<u8>, algorithm: Algorithm) -> Self {
        Self {
            encryption_key,
            algorithm,
        }
    }

    /// Object-specific key (Algorithm 1), mirroring the read side.
    fn derive_object_key(&self, obj_num: u32, gen_num: u16) -> Vec<u8> {
        let mut hasher = Md5::new();

        hasher.update(&self.encryption_key);
        hasher.update(&obj_num.to_le_bytes()[..3]);
        hasher.update(gen_num.to_le_bytes());

        if self.algorithm.is_aes() {
            hasher.update(b"sAlT");
        }

        let hash = hasher.finalize();

        let key_length = (self.encryption_key.len() + 5).min(16);
        hash[..key_length].to_vec()
    }

    /// Encrypt a string for a specific object.
    pub fn encrypt_string(&self, data: &[u8], obj_num: u32, gen_num: u16) -> Vec<u8> {
        if self.algorithm == Algorithm::None {
            return data.to_vec();
        }

        let key = self.derive_object_key(obj_num, gen_num);
        self.encrypt_with_key(&key, data)
    }

    /// Encrypt a stream payload for a specific object.
    ///
    /// For AES the random 16-byte IV is prepended to the ciphertext.
    pub fn encrypt_stream(&self, data: &[u8], obj_num: u32, gen_num: u16) -> Vec<u8> {
        if self.algorithm == Algorithm::None {
            return data.to_vec();
        }

        let key = self.derive_object_key(obj_num, gen_num);
        self.encrypt_with_key(&key, data)
    }

    fn encrypt_with_key(&self, key: &[u8], data: &[u8]) -> Vec<u8> {
        match self.algorithm {
            Algorithm::None => data.to_vec(),
            Algorithm::Rc4_40 | Algorithm::Rc4_128 => rc4::rc4_crypt(key, data),
            Algorithm::Aes128 => {
                let iv = generate_iv();
                match aes::aes128_encrypt(key, &iv, data) {
                    Ok(ciphertext) => {
                        let mut result = iv.to_vec();
                        result.extend(ciphertext);
                        result
                    },
                    Err(e) => {
                        log::error!("AES encryption failed: {}; writing plaintext", e);
                        data.to_vec()
                    },
                }
            },
        }
    }

    /// Get the encryption algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

/// Random 16-byte IV from a hashed UUID + timestamp.
fn generate_iv() -> [u8; 16] {
    let uuid = uuid::Uuid::new_v4();

    let mut hasher = Md5::new();
    hasher.update(uuid.as_bytes());

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    hasher.update(now.as_nanos().to_le_bytes());

    let hash = hasher.finalize();
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&hash);
    iv
}
