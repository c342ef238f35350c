//! Standard Security Handler key derivation and password algorithms.
//!
//! Implements Algorithms 2-5 from ISO 32000-1:2008, Section 7.6.3 for
//! revisions 2-4: encryption key derivation, /O and /U computation, and
//! user password authentication.

use md5::{Digest, Md5};

/// Padding string used in PDF encryption (Algorithm 2, step a).
const PADDING: &[u8; 32] = b"\x28\xBF\x4E\x5E\x4E\x75\x8A\x41\
                              \x64\x00\x4E\x56\xFF\xFA\x01\x08\
                              \x2E\x2E\x00\xB6\xD0\x68\x3E\x80\
                              \x2F\x0C\xA9\xFE\x64\x53\x69\x7A";

/// Compute the file encryption key from a password (Algorithm 2).
pub fn compute_encryption_key(
    password: &[u8],
    owner_key: &[u8],
    permissions: i32,
    file_id: &[u8],
    revision: u32,
    key_length: usize,
    encrypt_metadata: bool,
) -> Vec<u8> {
    let mut hasher = Md5::new();

    // a) pad or truncate the password to 32 bytes
    let mut padded_password = [0u8; 32];
    let pass_len = password.len().min(32);
    padded_password[..pass_len].copy_from_slice(&password[..pass_len]);
    if pass_len < 32 {
        padded_password[pass_len..].copy_from_slice(&PADDING[..(32 - pass_len)]);
    }

    // b-e) password, /O value, permissions (LE), file ID
    hasher.update(padded_password);
    hasher.update(owner_key);
    hasher.update(permissions.to_le_bytes());
    hasher.update(file_id);

    // f) R>=4 with unencrypted metadata mixes in 0xFFFFFFFF
    if revision >= 4 && !encrypt_metadata {
        hasher.update([0xFF, 0xFF, 0xFF, 0xFF]);
    }

    let mut hash = hasher.finalize().to_vec();

    // h) R>=3 reruns MD5 50 times over the first key_length bytes
    if revision >= 3 {
        for _ in 0..50 {
            let mut hasher = Md5::new();
            hasher.update(&hash[..key_length.min(16)]);
            hash = hasher.finalize().to_vec();
        }
    }

    hash[..key_length.min(16)].to_vec()
}

/// Pad or truncate a password to 32 bytes using the standard padding.
pub fn pad_password(password: &[u8]) -> Vec<u8> {
    let mut padded = Vec::with_capacity(32);
    let pass_len = password.len().min(32);
    padded.extend_from_slice(&password[..pass_len]);
    if pass_len < 32 {
        padded.extend_from_slice(&PADDING[..(32 - pass_len)]);
    }
    padded
}

/// Authenticate the user password (Algorithms 4/5 + 6).
///
/// Returns the file encryption key if authentication succeeds.
#[allow(clippy::too_many_arguments)]
pub fn authenticate_user_password(
    password: &[u8],
    user_key: &[u8],
    owner_key: &[u8],
    permissions: i32,
    file_id: &[u8],
    revision: u32,
    key_length: usize,
    encrypt_metadata: bool,
) -> Option<Vec<u8>> {
    let key = compute_encryption_key(
        password,
        owner_key,
        permissions,
        file_id,
        revision,
        key_length,
        encrypt_metadata,
    );

    let expected_user_key = if revision >= 3 {
        compute_user_key_r3(&key, file_id)
    } else {
        compute_user_key_r2(&key)
    };

    // Only the first 16 bytes of /U are significant for R>=3
    if user_key.len() < 16 || expected_user_key.len() < 16 {
        return None;
    }
    let matches = constant_time_compare(&user_key[..16], &expected_user_key[..16]);

    if matches { Some(key) } else { None }
}

/// Compute the /U value for R=2 (Algorithm 4): RC4 of the padding string.
fn compute_user_key_r2(key: &[u8]) -> Vec<u8> {
    super::rc4::rc4_crypt(key, PADDING)
}

/// Compute the /U value for R>=3 (Algorithm 5).
fn compute_user_key_r3(key: &[u8], file_id: &[u8]) -> Vec<u8> {
    // a) MD5 of padding + file ID
    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(file_id);
    let mut hash = hasher.finalize().to_vec();

    // b) 20 RC4 passes with XOR-modified keys
    for i in 0..20 {
        let mut modified_key = key.to_vec();
        for byte in &mut modified_key {
            *byte ^= i as u8;
        }
        hash = super::rc4::rc4_crypt(&modified_key, &hash);
    }

    // c) pad to 32 bytes with arbitrary data (zeros)
    hash.extend_from_slice(&[0u8; 16]);
    hash
}

/// Compute the /O value (Algorithm 3, R 2-4).
///
/// An empty owner password falls back to the user password.
pub fn compute_owner_password_hash(
    owner_password: &[u8],
    user_password: &[u8],
    revision: u32,
    key_length: usize,
) -> Vec<u8> {
    let password = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };

    let padded_password = pad_password(password);

    let mut hasher = Md5::new();
    hasher.update(&padded_password);
    let mut hash = hasher.finalize().to_vec();

    if revision >= 3 {
        for _ in 0..50 {
            let mut hasher = Md5::new();
            hasher.update(&hash[..key_length.min(16)]);
            hash = hasher.finalize().to_vec();
        }
    }

    let rc4_key_len = key_length.min(16);
    let rc4_key = &hash[..rc4_key_len];

    let padded_user = pad_password(user_password);
    let mut result = super::rc4::rc4_crypt(rc4_key, &padded_user);

    if revision >= 3 {
        for i in 1..=19 {
            let mut modified_key = rc4_key.to_vec();
            for byte in &mut modified_key {
                *byte ^= i as u8;
            }
            result = super::rc4::rc4_crypt(&modified_key, &result);
        }
    }

    result
}

/// Compute the /U value for the encryption dictionary (Algorithm 4/5).
pub fn compute_user_password_hash(encryption_key: &[u8], file_id: &[u8], revision: u32) -> Vec<u8> {
    if revision >= 3 {
        compute_user_key_r3(encryption_key, file_id)
    } else {
        compute_user_key_r2(encryption_key)
    }
}

/// Constant-time comparison to avoid leaking the match position.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_password() {
        let padded = pad_password(b"test");
        assert_eq!(padded.len(), 32);
        assert_eq!(&padded[..4], b"test");
        assert_eq!(&padded[4..], &PADDING[..28]);
    }

    #[test]
    fn test_pad_password_long() {
        let password = b"this is a very long password that exceeds 32 bytes";
        let padded = pad_password(password);
        assert_eq!(padded.len(), 32);
        assert_eq!(&padded[..], &password[..32]);
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"test1234test1234", b"test1234test1234"));
        assert!(!constant_time_compare(b"test1234test1234", b"test1234test1235"));
        assert!(!constant_time_compare(b"test", b"testing"));
    }

    #[test]
    fn test_owner_password_hash_empty_owner_uses_user() {
        let user = b"user";
        let hash1 = compute_owner_password_hash(b"", user, 3, 16);
        let hash2 = compute_owner_password_hash(user, user, 3, 16);
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_encryption_roundtrip_r2() {
        let owner_pass = b"owner123";
        let user_pass = b"user123";
        let file_id = b"test_file_id_123";
        let permissions = -1i32;
        let revision = 2;
        let key_length = 5;

        let owner_hash = compute_owner_password_hash(owner_pass, user_pass, revision, key_length);
        let encryption_key = compute_encryption_key(
            user_pass,
            &owner_hash,
            permissions,
            file_id,
            revision,
            key_length,
            true,
        );
        let user_hash = compute_user_password_hash(&encryption_key, file_id, revision);

        let auth_result = authenticate_user_password(
            user_pass,
            &user_hash,
            &owner_hash,
            permissions,
            file_id,
            revision,
            key_length,
            true,
        );

        assert_eq!(auth_result.unwrap(), encryption_key);
    }

    #[test]
    fn test_encryption_roundtrip_r3() {
        let owner_pass = b"owner456";
        let user_pass = b"user456";
        let file_id = b"test_file_id_456";
        let permissions = -1i32;
        let revision = 3;
        let key_length = 16;

        let owner_hash = compute_owner_password_hash(owner_pass, user_pass, revision, key_length);
        let encryption_key = compute_encryption_key(
            user_pass,
            &owner_hash,
            permissions,
            file_id,
            revision,
            key_length,
            true,
        );
        let user_hash = compute_user_password_hash(&encryption_key, file_id, revision);

        let auth_result = authenticate_user_password(
            user_pass,
            &user_hash,
            &owner_hash,
            permissions,
            file_id,
            revision,
            key_length,
            true,
        );

        assert_eq!(auth_result.unwrap(), encryption_key);
    }

    #[test]
    fn test_wrong_password_rejected() {
        let owner_hash = compute_owner_password_hash(b"owner", b"user", 3, 16);
        let key = compute_encryption_key(b"user", &owner_hash, -1, b"id", 3, 16, true);
        let user_hash = compute_user_password_hash(&key, b"id", 3);

        let auth = authenticate_user_password(
            b"wrong", &user_hash, &owner_hash, -1, b"id", 3, 16, true,
        );
        assert!(auth.is_none());
    }
}
