//! Signature check and envelope decoding for one configured corp.

use aes::Aes256;
use base64::Engine;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use tracing::{debug, warn};

use super::envelope::{recover_content, unpad_pkcs7, Envelope, LengthByteOrder};
use super::error::{CodecError, CodecResult};
use super::key::{SharedSecret, LENIENT_BASE64};
use super::signature::verify_signature;

type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Verifies and decodes callbacks for a single corp.
///
/// Immutable after construction and safe to share across request handlers
/// behind an `Arc`.
///
/// # Integrity
///
/// The wire format carries no authentication tag. AES-CBC decryption of a
/// tampered ciphertext succeeds and yields garbage, so the only integrity
/// guarantee is the outer signature. Always call [`Codec::verify`] before
/// [`Codec::decode`].
#[derive(Clone)]
pub struct Codec {
    secret: SharedSecret,
    token: String,
    corp_id: String,
    byte_order: LengthByteOrder,
}

impl Codec {
    /// Build a codec from the platform credentials.
    ///
    /// Fails with `InvalidKey` if the EncodingAESKey does not decode to 32
    /// bytes.
    pub fn new(
        encoding_aes_key: &str,
        token: impl Into<String>,
        corp_id: impl Into<String>,
    ) -> CodecResult<Self> {
        Ok(Self {
            secret: SharedSecret::from_encoding_aes_key(encoding_aes_key)?,
            token: token.into(),
            corp_id: corp_id.into(),
            byte_order: LengthByteOrder::default(),
        })
    }

    /// Override the byte order of the envelope length field.
    pub fn with_byte_order(mut self, byte_order: LengthByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn corp_id(&self) -> &str {
        &self.corp_id
    }

    pub fn byte_order(&self) -> LengthByteOrder {
        self.byte_order
    }

    #[cfg(test)]
    pub(crate) fn secret(&self) -> &SharedSecret {
        &self.secret
    }

    /// Check `signature` against the token, timestamp, nonce and payload.
    pub fn verify(&self, timestamp: &str, nonce: &str, payload: &str, signature: &str) -> bool {
        verify_signature(&self.token, timestamp, nonce, payload, signature)
    }

    /// Decrypt and unframe a base64 ciphertext, returning the content text.
    pub fn decode(&self, ciphertext_b64: &str) -> CodecResult<String> {
        let plaintext = self.decrypt(ciphertext_b64)?;
        self.open(&plaintext)
    }

    /// Base64-decode, AES-256-CBC decrypt and strip PKCS#7 padding.
    ///
    /// The result is the raw envelope, still framed.
    pub fn decrypt(&self, ciphertext_b64: &str) -> CodecResult<Vec<u8>> {
        let mut buf = LENIENT_BASE64
            .decode(ciphertext_b64.trim())
            .map_err(|e| CodecError::MalformedInput(format!("base64: {}", e)))?;

        if buf.is_empty() || buf.len() % BLOCK_SIZE != 0 {
            return Err(CodecError::MalformedInput(format!(
                "ciphertext length {} is not a positive multiple of {}",
                buf.len(),
                BLOCK_SIZE
            )));
        }

        let cipher = Aes256CbcDec::new_from_slices(self.secret.key(), self.secret.iv())
            .map_err(|e| CodecError::InvalidKey(e.to_string()))?;
        let decrypted_len = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| CodecError::MalformedInput("block decryption failed".to_string()))?
            .len();
        buf.truncate(decrypted_len);

        let unpadded_len = unpad_pkcs7(&buf).len();
        buf.truncate(unpadded_len);

        debug!(
            ciphertext_length = decrypted_len,
            envelope_length = unpadded_len,
            "envelope_decrypted"
        );

        Ok(buf)
    }

    /// Parse a decrypted envelope and return its content as UTF-8 text.
    ///
    /// A tenant id that differs from the configured corp id is logged but
    /// does not fail the call.
    pub fn open(&self, plaintext: &[u8]) -> CodecResult<String> {
        let envelope = Envelope::parse(plaintext, self.byte_order)?;

        if envelope.tenant_id != self.corp_id.as_bytes() {
            warn!(
                expected = %self.corp_id,
                actual = %String::from_utf8_lossy(envelope.tenant_id),
                "envelope_tenant_mismatch"
            );
        }

        Ok(String::from_utf8(envelope.content.to_vec())?)
    }

    /// Degraded recovery for envelopes that [`Codec::open`] rejected.
    ///
    /// Locates the corp id inside the envelope instead of trusting the length
    /// field. Callers compose it explicitly, e.g.
    /// `codec.open(&p).or_else(|_| codec.recover(&p))`.
    pub fn recover(&self, plaintext: &[u8]) -> CodecResult<String> {
        let content = recover_content(plaintext, self.corp_id.as_bytes(), self.byte_order)?;

        warn!(
            envelope_length = plaintext.len(),
            content_length = content.len(),
            "envelope_recovered_degraded"
        );

        Ok(String::from_utf8(content.to_vec())?)
    }
}
