//! Referral code generation.
//!
//! Codes are uppercase alphanumeric. Uniqueness is not checked here; the
//! store's unique key on `users.referral_code` rejects collisions and the
//! identity store retries with a fresh code.

use rand::rngs::ThreadRng;
use rand::Rng;

/// Characters a referral code is drawn from.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Source of candidate referral codes.
pub trait CodeGenerator {
    /// Produce the next candidate.
    fn next_code(&mut self) -> String;
}

/// Uniformly random codes of a fixed length.
pub struct RandomCodes<R = ThreadRng> {
    rng: R,
    length: usize,
}

impl RandomCodes<ThreadRng> {
    /// Random codes from the thread-local RNG.
    pub fn new(length: usize) -> Self {
        Self::with_rng(rand::thread_rng(), length)
    }
}

impl<R: Rng> RandomCodes<R> {
    /// Random codes from a caller-supplied RNG.
    pub fn with_rng(rng: R, length: usize) -> Self {
        Self { rng, length }
    }
}

impl<R: Rng> CodeGenerator for RandomCodes<R> {
    fn next_code(&mut self) -> String {
        (0..self.length)
            .map(|_| CODE_ALPHABET[self.rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }
}
