//! Password-based envelope encryption.
//!
//! Provides key derivation, authenticated encryption, the injected random
//! source, and the fixed-offset envelope layout tying them together.

pub mod aead;
pub mod envelope;
pub mod kdf;
pub mod random;

pub use envelope::{
    ENCRYPTED_SUFFIX, EnvelopeCodec, EnvelopeParts, open, opened_file_name, seal,
    sealed_file_name,
};
pub use kdf::{DerivedKey, KdfParams, derive_key};
pub use random::{OsRandom, SecureRandom};

/// Length of the salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Length of the nonce (12 bytes for AES-256-GCM).
pub const NONCE_LEN: usize = 12;
/// Length of the authentication tag appended by AES-256-GCM (16 bytes).
pub const TAG_LEN: usize = 16;
/// Length of the encryption key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Salt followed by nonce.
pub const HEADER_LEN: usize = SALT_LEN + NONCE_LEN;
/// Smallest valid envelope: header plus the tag of an empty plaintext.
pub const MIN_ENVELOPE_LEN: usize = HEADER_LEN + TAG_LEN;
