//! Callback signature verification.
//!
//! The platform signs every callback with SHA-1 over the sorted concatenation
//! of the verification token, timestamp, nonce and payload (the `echostr`
//! for URL verification, the `Encrypt` field for message delivery). There is
//! no HMAC key: the token is simply one of the hashed strings.

use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use tracing::warn;

/// Compute the lowercase hex signature for a callback.
///
/// The four strings are sorted byte-wise (plain `str` ordering, not
/// locale-aware) and concatenated without a separator before hashing, so
/// argument order does not affect the result.
pub fn compute_signature(token: &str, timestamp: &str, nonce: &str, payload: &str) -> String {
    let mut parts = [token, timestamp, nonce, payload];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Verify a callback signature.
///
/// # Arguments
///
/// * `token` - The configured verification token
/// * `timestamp` - The `timestamp` query parameter
/// * `nonce` - The `nonce` query parameter
/// * `payload` - The `echostr` parameter or the `Encrypt` element
/// * `signature` - The `msg_signature` query parameter
///
/// # Returns
///
/// `true` if the signature matches exactly (case-sensitive), `false`
/// otherwise. Missing parameters must be rejected by the caller beforehand.
pub fn verify_signature(
    token: &str,
    timestamp: &str,
    nonce: &str,
    payload: &str,
    signature: &str,
) -> bool {
    let expected = compute_signature(token, timestamp, nonce, payload);
    let valid = constant_time_compare(&expected, signature);

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = signature.len(),
            "callback_signature_mismatch"
        );
    }

    valid
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
