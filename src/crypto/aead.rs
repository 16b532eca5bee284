use super::{NONCE_LEN, kdf::DerivedKey};
use crate::error::{EnvelopeError, EnvelopeResult};
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use zeroize::Zeroizing;

fn cipher(key: &DerivedKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

/// Encrypt plaintext. Output is ciphertext followed by the 16-byte tag.
pub fn encrypt(
    key: &DerivedKey,
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> EnvelopeResult<Vec<u8>> {
    cipher(key)
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| EnvelopeError::Encryption("AEAD rejected the plaintext"))
}

/// Decrypt ciphertext and verify its tag.
pub fn decrypt(
    key: &DerivedKey,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> EnvelopeResult<Zeroizing<Vec<u8>>> {
    let plaintext = cipher(key)
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| EnvelopeError::Decryption)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KdfParams, TAG_LEN, derive_key};

    fn key(pw: &[u8]) -> DerivedKey {
        derive_key(pw, &[9u8; 16], KdfParams::new(1).unwrap()).unwrap()
    }

    #[test]
    fn ciphertext_carries_tag() {
        let ct = encrypt(&key(b"pw"), &[1u8; 12], b"abc").unwrap();
        assert_eq!(ct.len(), 3 + TAG_LEN);
    }

    #[test]
    fn decrypt_with_other_key_fails() {
        let ct = encrypt(&key(b"pw"), &[1u8; 12], b"abc").unwrap();
        assert_eq!(
            decrypt(&key(b"other"), &[1u8; 12], &ct).unwrap_err(),
            EnvelopeError::Decryption
        );
    }

    #[test]
    fn decrypt_with_other_nonce_fails() {
        let ct = encrypt(&key(b"pw"), &[1u8; 12], b"abc").unwrap();
        assert!(decrypt(&key(b"pw"), &[2u8; 12], &ct).is_err());
    }
}
