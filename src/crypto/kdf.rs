use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

use super::{KEY_LEN, SALT_LEN};
use crate::error::{EnvelopeError, EnvelopeResult};

/// Iteration count every envelope is derived with.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// PBKDF2-HMAC-SHA-256 parameters.
///
/// These are not written into the envelope, so every envelope must be
/// opened with the same parameters it was sealed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub(crate) iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

impl KdfParams {
    pub fn new(iterations: u32) -> EnvelopeResult<Self> {
        let params = Self { iterations };
        params.validate()?;
        Ok(params)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn validate(&self) -> EnvelopeResult<()> {
        if self.iterations < 1 {
            return Err(EnvelopeError::Configuration(
                "pbkdf2 iteration count must be >= 1",
            ));
        }
        Ok(())
    }
}

/// A 256-bit key derived from a password. Zeroized on drop.
pub struct DerivedKey {
    bytes: [u8; KEY_LEN],
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the envelope key from password and salt.
pub fn derive_key(
    password: &[u8],
    salt: &[u8; SALT_LEN],
    params: KdfParams,
) -> EnvelopeResult<DerivedKey> {
    derive_raw(password, salt, params)
}

fn derive_raw(password: &[u8], salt: &[u8], params: KdfParams) -> EnvelopeResult<DerivedKey> {
    params.validate()?;

    let mut key = DerivedKey {
        bytes: [0u8; KEY_LEN],
    };
    pbkdf2_hmac::<Sha256>(password, salt, params.iterations, &mut key.bytes);

    Ok(key)
}
