//! AES key material derived from the platform's EncodingAESKey.

use std::fmt;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};

use super::error::{CodecError, CodecResult};

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// CBC initialization vector length in bytes.
pub const IV_LEN: usize = 16;

/// Standard-alphabet base64 that tolerates missing padding and non-zero
/// spare bits in the final symbol.
///
/// The platform hands out 43-character keys whose last character is not
/// canonical, so the strict `STANDARD` engine would reject them.
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Symmetric key and IV shared with the platform.
///
/// The IV is not chosen independently: it is always the first 16 bytes of
/// the key.
#[derive(Clone)]
pub struct SharedSecret {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl SharedSecret {
    /// Derive the key and IV from the base64 EncodingAESKey.
    pub fn from_encoding_aes_key(encoding_aes_key: &str) -> CodecResult<Self> {
        let trimmed = encoding_aes_key.trim();
        if trimmed.is_empty() {
            return Err(CodecError::InvalidKey("key is empty".to_string()));
        }

        let decoded = LENIENT_BASE64
            .decode(pad_base64(trimmed))
            .map_err(|e| CodecError::InvalidKey(e.to_string()))?;

        let key: [u8; KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
            CodecError::InvalidKey(format!(
                "decoded key is {} bytes, expected {}",
                decoded.len(),
                KEY_LEN
            ))
        })?;

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&key[..IV_LEN]);

        Ok(Self { key, iv })
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret").finish_non_exhaustive()
    }
}

/// Append `=` until the length is a multiple of 4.
fn pad_base64(raw: &str) -> String {
    let mut padded = raw.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    padded
}
