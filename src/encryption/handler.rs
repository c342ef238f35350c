//! Read-side encryption handler.
//!
//! Wraps the parsed /Encrypt dictionary, authenticates a password, and
//! decrypts strings and streams with object-specific keys.

use super::algorithms;
use super::{Algorithm, EncryptDict};
use crate::error::{Error, Result};
use crate::object::Object;

/// Encryption handler for an open document.
#[derive(Debug, Clone)]
pub struct EncryptionHandler {
    /// Encryption dictionary
    dict: EncryptDict,
    /// Derived file encryption key (set after successful authentication)
    encryption_key: Option<Vec<u8>>,
    /// File identifier (first element of /ID array)
    file_id: Vec<u8>,
    /// Encryption algorithm
    algorithm: Algorithm,
}

impl EncryptionHandler {
    /// Create a handler from the trailer's /Encrypt object and the first
    /// /ID element.
    pub fn new(encrypt_obj: &Object, file_id: Vec<u8>) -> Result<Self> {
        let dict = EncryptDict::from_object(encrypt_obj)?;
        let algorithm = dict.algorithm()?;

        log::info!(
            "document is encrypted with {:?} (V={}, R={})",
            algorithm,
            dict.version,
            dict.revision
        );

        Ok(Self {
            dict,
            encryption_key: None,
            file_id,
            algorithm,
        })
    }

    /// Authenticate with a password (empty string means no password).
    ///
    /// On success the file encryption key is derived and stored for all
    /// subsequent decryption.
    pub fn authenticate(&mut self, password: &[u8]) -> Result<bool> {
        if let Some(key) = algorithms::authenticate_user_password(
            password,
            &self.dict.user_password,
            &self.dict.owner_password,
            self.dict.permissions,
            &self.file_id,
            self.dict.revision,
            self.dict.key_length_bytes(),
            self.dict.encrypt_metadata,
        ) {
            self.encryption_key = Some(key);
            log::debug!("user password authentication succeeded");
            return Ok(true);
        }

        log::warn!("password authentication failed");
        Ok(false)
    }

    /// Check if the handler has been authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.encryption_key.is_some()
    }

    /// Get the encryption algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Decrypt a stream payload (7.6.2).
    pub fn decrypt_stream(&self, data: &[u8], obj_num: u32, gen_num: u32) -> Result<Vec<u8>> {
        let key = self
            .encryption_key
            .as_ref()
            .ok_or_else(|| Error::Auth("document not authenticated".to_string()))?;

        let obj_key = self.compute_object_key(key, obj_num, gen_num);

        match self.algorithm {
            Algorithm::None => Ok(data.to_vec()),
            Algorithm::Rc4_40 | Algorithm::Rc4_128 => Ok(super::rc4::rc4_crypt(&obj_key, data)),
            Algorithm::Aes128 => {
                // First 16 bytes are the IV
                if data.len() < 16 {
                    return Err(Error::InvalidPdf("AES encrypted data too short".to_string()));
                }
                let (iv, ciphertext) = data.split_at(16);
                super::aes::aes128_decrypt(&obj_key[..16], iv, ciphertext)
                    .map_err(|e| Error::InvalidPdf(format!("AES decryption failed: {}", e)))
            },
        }
    }

    /// Decrypt a string (same per-object algorithm as streams).
    pub fn decrypt_string(&self, data: &[u8], obj_num: u32, gen_num: u32) -> Result<Vec<u8>> {
        self.decrypt_stream(data, obj_num, gen_num)
    }

    /// Object-specific key (Algorithm 1): MD5 of base key + low bytes of
    /// object/generation number, plus "sAlT" for AES.
    fn compute_object_key(&self, base_key: &[u8], obj_num: u32, gen_num: u32) -> Vec<u8> {
        use md5::{Digest, Md5};

        let mut hasher = Md5::new();

        hasher.update(base_key);
        hasher.update(&obj_num.to_le_bytes()[..3]);
        hasher.update(&gen_num.to_le_bytes()[..2]);

        if self.algorithm.is_aes() {
            hasher.update(b"sAlT");
        }

        let hash = hasher.finalize();

        let key_len = (base_key.len() + 5).min(16);
        hash[..key_len].to_vec()
    }
}
