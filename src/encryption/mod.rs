//! PDF encryption support.
//!
//! Standard Security Handler per ISO 32000-1:2008, Section 7.6:
//!
//! - RC4 (40-bit and 128-bit), revisions 2-3
//! - AES-128 in CBC mode, revision 4
//!
//! Reading authenticates the user password and decrypts strings and
//! streams; writing re-encrypts a rebuilt document with a deterministic
//! /O / /U derivation (Algorithms 2-5). AES-256 (R5/R6) sources are
//! rejected as unsupported.

use crate::error::{Error, Result};
use crate::object::Object;

mod aes;
mod algorithms;
mod handler;
mod rc4;
mod write_handler;

pub use handler::EncryptionHandler;
pub use write_handler::{EncryptDictBuilder, EncryptionWriteHandler};

/// Encryption algorithm used in the PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// No encryption
    None,
    /// RC4 with 40-bit key (PDF 1.4, V=1, R=2)
    Rc4_40,
    /// RC4 with 128-bit key (PDF 1.5, V=2, R=3)
    Rc4_128,
    /// AES with 128-bit key in CBC mode (PDF 1.6, V=4, R=4)
    Aes128,
}

impl Algorithm {
    /// Get the key length in bytes for this algorithm.
    pub fn key_length(&self) -> usize {
        match self {
            Algorithm::None => 0,
            Algorithm::Rc4_40 => 5,
            Algorithm::Rc4_128 => 16,
            Algorithm::Aes128 => 16,
        }
    }

    /// Check if this is an AES algorithm.
    pub fn is_aes(&self) -> bool {
        matches!(self, Algorithm::Aes128)
    }

    /// The (V, R) version/revision pair for this algorithm.
    pub fn version_revision(&self) -> (u32, u32) {
        match self {
            Algorithm::None => (0, 0),
            Algorithm::Rc4_40 => (1, 2),
            Algorithm::Rc4_128 => (2, 3),
            Algorithm::Aes128 => (4, 4),
        }
    }
}

/// PDF encryption dictionary (/Encrypt entry in trailer).
#[derive(Debug, Clone)]
pub struct EncryptDict {
    /// Filter name (should be "Standard")
    pub filter: String,
    /// Algorithm version (V): 1=RC4-40, 2=RC4-128, 4=AES-128
    pub version: u32,
    /// Key length in bits (Length)
    pub length: Option<u32>,
    /// Revision number (R): 2, 3, or 4
    pub revision: u32,
    /// Owner password hash (O): 32 bytes
    pub owner_password: Vec<u8>,
    /// User password hash (U): 32 bytes
    pub user_password: Vec<u8>,
    /// User permissions (P): 32-bit integer
    pub permissions: i32,
    /// Encrypt metadata flag (EncryptMetadata): true by default
    pub encrypt_metadata: bool,
}

impl EncryptDict {
    /// Parse an encryption dictionary from a PDF object.
    pub fn from_object(obj: &Object) -> Result<Self> {
        let dict = obj
            .as_dict()
            .ok_or_else(|| Error::InvalidPdf("Encrypt entry is not a dictionary".to_string()))?;

        let filter = dict
            .get("Filter")
            .and_then(|o| o.as_name())
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /Filter".to_string()))?
            .to_string();

        let version = dict
            .get("V")
            .and_then(|o| o.as_integer())
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /V".to_string()))?
            as u32;

        let revision = dict
            .get("R")
            .and_then(|o| o.as_integer())
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /R".to_string()))?
            as u32;

        let owner_password = dict
            .get("O")
            .and_then(|o| o.as_string())
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /O".to_string()))?
            .to_vec();

        let user_password = dict
            .get("U")
            .and_then(|o| o.as_string())
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /U".to_string()))?
            .to_vec();

        let permissions = dict
            .get("P")
            .and_then(|o| o.as_integer())
            .ok_or_else(|| Error::InvalidPdf("Encrypt dictionary missing /P".to_string()))?
            as i32;

        let length = dict.get("Length").and_then(|o| o.as_integer()).map(|l| l as u32);

        let encrypt_metadata = dict
            .get("EncryptMetadata")
            .and_then(|o| o.as_bool())
            .unwrap_or(true);

        Ok(EncryptDict {
            filter,
            version,
            length,
            revision,
            owner_password,
            user_password,
            permissions,
            encrypt_metadata,
        })
    }

    /// Determine the encryption algorithm from V and R values.
    pub fn algorithm(&self) -> Result<Algorithm> {
        match (self.version, self.revision) {
            (1, 2) => Ok(Algorithm::Rc4_40),
            (2, 3) => Ok(Algorithm::Rc4_128),
            (4, 4) => Ok(Algorithm::Aes128),
            _ => Err(Error::Unsupported(format!(
                "Unsupported encryption version V={}, R={}",
                self.version, self.revision
            ))),
        }
    }

    /// Effective key length in bytes.
    pub fn key_length_bytes(&self) -> usize {
        if let Some(length) = self.length {
            (length / 8) as usize
        } else {
            match self.version {
                1 => 5,
                _ => 16,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn encrypt_dict_object() -> Object {
        let mut dict = HashMap::new();
        dict.insert("Filter".to_string(), Object::Name("Standard".to_string()));
        dict.insert("V".to_string(), Object::Integer(2));
        dict.insert("R".to_string(), Object::Integer(3));
        dict.insert("Length".to_string(), Object::Integer(128));
        dict.insert("O".to_string(), Object::String(vec![0u8; 32]));
        dict.insert("U".to_string(), Object::String(vec![0u8; 32]));
        dict.insert("P".to_string(), Object::Integer(-44));
        Object::Dictionary(dict)
    }

    #[test]
    fn test_encrypt_dict_parse() {
        let dict = EncryptDict::from_object(&encrypt_dict_object()).unwrap();
        assert_eq!(dict.filter, "Standard");
        assert_eq!(dict.algorithm().unwrap(), Algorithm::Rc4_128);
        assert_eq!(dict.key_length_bytes(), 16);
        assert!(dict.encrypt_metadata);
    }

    #[test]
    fn test_unsupported_revision() {
        let mut dict = HashMap::new();
        dict.insert("Filter".to_string(), Object::Name("Standard".to_string()));
        dict.insert("V".to_string(), Object::Integer(5));
        dict.insert("R".to_string(), Object::Integer(6));
        dict.insert("O".to_string(), Object::String(vec![0u8; 48]));
        dict.insert("U".to_string(), Object::String(vec![0u8; 48]));
        dict.insert("P".to_string(), Object::Integer(-4));

        let parsed = EncryptDict::from_object(&Object::Dictionary(dict)).unwrap();
        assert!(parsed.algorithm().is_err());
    }

    #[test]
    fn test_algorithm_properties() {
        assert_eq!(Algorithm::Rc4_40.key_length(), 5);
        assert_eq!(Algorithm::Rc4_128.key_length(), 16);
        assert!(Algorithm::Aes128.is_aes());
        assert!(!Algorithm::Rc4_128.is_aes());
        assert_eq!(Algorithm::Rc4_128.version_revision(), (2, 3));
    }
}
