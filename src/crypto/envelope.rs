//! The envelope codec.
//!
//! Envelope layout, fixed offsets, no version tag and no length fields:
//! ```text
//! SALT (16) | NONCE (12) | CIPHERTEXT (N) | TAG (16)
//! ```

use super::{
    HEADER_LEN, MIN_ENVELOPE_LEN, NONCE_LEN, SALT_LEN, aead,
    kdf::{KdfParams, derive_key},
    random::{OsRandom, SecureRandom, random_array},
};
use crate::error::{EnvelopeError, EnvelopeResult};
use zeroize::Zeroizing;

/// Suffix appended to a file name once its contents are sealed.
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// Borrowed view of the three envelope fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeParts<'a> {
    salt: &'a [u8; SALT_LEN],
    nonce: &'a [u8; NONCE_LEN],
    ciphertext: &'a [u8],
}

impl<'a> EnvelopeParts<'a> {
    pub fn new(
        salt: &'a [u8; SALT_LEN],
        nonce: &'a [u8; NONCE_LEN],
        ciphertext: &'a [u8],
    ) -> Self {
        Self {
            salt,
            nonce,
            ciphertext,
        }
    }

    /// Split an envelope at its fixed offsets.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::MalformedEnvelope`] if `data` is shorter
    /// than [`MIN_ENVELOPE_LEN`].
    pub fn parse(data: &'a [u8]) -> EnvelopeResult<Self> {
        if data.len() < MIN_ENVELOPE_LEN {
            return Err(EnvelopeError::MalformedEnvelope { len: data.len() });
        }

        let (salt, rest) = data.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

        Ok(Self {
            salt: salt
                .try_into()
                .map_err(|_| EnvelopeError::MalformedEnvelope { len: data.len() })?,
            nonce: nonce
                .try_into()
                .map_err(|_| EnvelopeError::MalformedEnvelope { len: data.len() })?,
            ciphertext,
        })
    }

    pub fn salt(&self) -> &'a [u8; SALT_LEN] {
        self.salt
    }

    pub fn nonce(&self) -> &'a [u8; NONCE_LEN] {
        self.nonce
    }

    /// Ciphertext followed by the authentication tag.
    pub fn ciphertext(&self) -> &'a [u8] {
        self.ciphertext
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());

        buf.extend_from_slice(self.salt);
        buf.extend_from_slice(self.nonce);
        buf.extend_from_slice(self.ciphertext);

        buf
    }
}

/// Seals and opens envelopes.
///
/// Stateless apart from its parameters and random source, so one codec
/// can be shared across threads. Both operations are CPU bound for the
/// duration of the key derivation; run them off latency-sensitive threads.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeCodec<R = OsRandom> {
    params: KdfParams,
    rng: R,
}

impl EnvelopeCodec<OsRandom> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: KdfParams) -> Self {
        Self::with_random(params, OsRandom)
    }
}

impl<R: SecureRandom> EnvelopeCodec<R> {
    pub fn with_random(params: KdfParams, rng: R) -> Self {
        Self { params, rng }
    }

    pub fn params(&self) -> KdfParams {
        self.params
    }

    /// Encrypt `plaintext` under a key derived from `password`.
    ///
    /// Every call draws a fresh salt and nonce. The returned envelope is
    /// always exactly `plaintext.len() + 44` bytes.
    pub fn seal(&self, plaintext: &[u8], password: &[u8]) -> EnvelopeResult<Vec<u8>> {
        let salt: [u8; SALT_LEN] = random_array(&self.rng)?;
        let nonce: [u8; NONCE_LEN] = random_array(&self.rng)?;

        let key = derive_key(password, &salt, self.params)?;
        let ciphertext = aead::encrypt(&key, &nonce, plaintext)?;

        let envelope = EnvelopeParts::new(&salt, &nonce, &ciphertext).to_bytes();
        tracing::debug!(
            plaintext_len = plaintext.len(),
            envelope_len = envelope.len(),
            "sealed envelope"
        );

        Ok(envelope)
    }

    /// Decrypt an envelope produced by [`seal`](Self::seal).
    ///
    /// A wrong password and a modified envelope both fail with
    /// [`EnvelopeError::Decryption`].
    pub fn open(&self, envelope: &[u8], password: &[u8]) -> EnvelopeResult<Zeroizing<Vec<u8>>> {
        let parts = match EnvelopeParts::parse(envelope) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(envelope_len = envelope.len(), "rejected short envelope");
                return Err(e);
            }
        };

        let key = derive_key(password, parts.salt(), self.params)?;
        let plaintext = aead::decrypt(&key, parts.nonce(), parts.ciphertext())?;

        tracing::debug!(envelope_len = envelope.len(), "opened envelope");

        Ok(plaintext)
    }
}

/// Seal with the default parameters and the OS random source.
pub fn seal(plaintext: &[u8], password: &[u8]) -> EnvelopeResult<Vec<u8>> {
    EnvelopeCodec::new().seal(plaintext, password)
}

/// Open with the default parameters.
pub fn open(envelope: &[u8], password: &[u8]) -> EnvelopeResult<Zeroizing<Vec<u8>>> {
    EnvelopeCodec::new().open(envelope, password)
}

/// `report.pdf` -> `report.pdf.enc`
pub fn sealed_file_name(name: &str) -> String {
    format!("{name}{ENCRYPTED_SUFFIX}")
}

/// `report.pdf.enc` -> `report.pdf`; `None` without the suffix or when
/// nothing would remain.
pub fn opened_file_name(name: &str) -> Option<&str> {
    name.strip_suffix(ENCRYPTED_SUFFIX).filter(|stem| !stem.is_empty())
}
