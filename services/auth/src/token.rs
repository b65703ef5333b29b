//! Opaque token generation and comparison

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};

/// Bytes of entropy in every session and CSRF token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Source of opaque, unguessable tokens
pub trait TokenGenerator: Send + Sync {
    /// Produce a URL-safe encoding of `byte_length` random bytes.
    fn generate(&self, byte_length: usize) -> Result<String>;
}

/// Token generator backed by the operating system CSPRNG
#[derive(Debug, Clone, Copy, Default)]
pub struct OsTokenGenerator;

impl TokenGenerator for OsTokenGenerator {
    fn generate(&self, byte_length: usize) -> Result<String> {
        let mut bytes = vec![0u8; byte_length];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to read from the OS entropy source")?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

/// Compare two secrets without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
