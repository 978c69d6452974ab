//! Cryptographic helpers for session credentials
//!
//! Session tokens are 256-bit random values encoded as URL-safe base64 and compared with
//! [`constant_time_compare`].

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use subtle::ConstantTimeEq;

/// Generate a cryptographically secure random token.
///
/// 32 bytes of OS randomness encoded as URL-safe base64 without padding (43 characters).
///
/// # Panics
///
/// Panics if the OS random number generator fails.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time comparison of two byte slices.
///
/// Slices of different lengths compare unequal immediately; the length of a token is not
/// secret.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
