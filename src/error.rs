//! Error types crossing the library boundary.
//!
//! Messages are static on purpose: nothing derived from a password, key
//! or plaintext is ever formatted into an error.

use thiserror::Error;
use uuid::Uuid;

/// Failures of the envelope engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Secure randomness or a cryptographic primitive is unusable.
    #[error("crypto configuration failure: {0}")]
    Configuration(&'static str),

    /// Input to `open` is shorter than the smallest valid envelope.
    #[error("malformed envelope: {len} bytes is below the minimum envelope size")]
    MalformedEnvelope { len: usize },

    /// Tag verification failed. Wrong password and tampering are
    /// deliberately indistinguishable.
    #[error("decryption failed: wrong password or corrupted file")]
    Decryption,

    /// `seal` could not produce an envelope.
    #[error("encryption failed: {0}")]
    Encryption(&'static str),
}

/// Result alias for envelope operations.
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no vault entry with id '{0}'")]
    NotFound(Uuid),
    #[error("vault entry '{0}' already exists")]
    AlreadyExists(Uuid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decryption_message_does_not_hint_at_cause() {
        let msg = EnvelopeError::Decryption.to_string();
        assert!(msg.contains("wrong password or corrupted file"));
        assert!(!msg.contains("tag"));
        assert!(!msg.contains("salt"));
    }

    #[test]
    fn malformed_reports_length() {
        let msg = EnvelopeError::MalformedEnvelope { len: 7 }.to_string();
        assert!(msg.contains("7 bytes"));
    }
}
