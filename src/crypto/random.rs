use getrandom::fill;

use crate::error::{EnvelopeError, EnvelopeResult};

/// Source of cryptographically secure random bytes.
///
/// Implementations must be safe to share between threads; the codec
/// draws a fresh salt and nonce from it on every `seal`.
pub trait SecureRandom: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> EnvelopeResult<()>;
}

/// The operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    /// Fill buffer with cryptographically secure random bytes
    fn fill(&self, buf: &mut [u8]) -> EnvelopeResult<()> {
        fill(buf).map_err(|_| EnvelopeError::Configuration("OS random generator unavailable"))
    }
}

impl<R: SecureRandom + ?Sized> SecureRandom for &R {
    fn fill(&self, buf: &mut [u8]) -> EnvelopeResult<()> {
        (**self).fill(buf)
    }
}

/// Draw a fixed-size array from `rng`.
pub(crate) fn random_array<const N: usize, R: SecureRandom + ?Sized>(
    rng: &R,
) -> EnvelopeResult<[u8; N]> {
    let mut buf = [0u8; N];
    rng.fill(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_random_fills_buffer() {
        let a: [u8; 32] = random_array(&OsRandom).unwrap();
        let b: [u8; 32] = random_array(&OsRandom).unwrap();

        assert_ne!(a, [0u8; 32]);
        assert_ne!(a, b);
    }

    #[test]
    fn os_random_accepts_empty_buffer() {
        OsRandom.fill(&mut []).unwrap();
    }
}
