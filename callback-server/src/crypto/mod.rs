//! Envelope codec for platform callbacks.
//!
//! This module is pure and does no I/O:
//! - Verifies the SHA-1 callback signature
//! - Derives the AES key and IV from the EncodingAESKey
//! - Decrypts and unframes the base64 ciphertext
//!
//! ## Decoding Flow
//!
//! ```text
//! base64 → AES-256-CBC → PKCS#7 unpad → [random|len|content|corp id] → UTF-8
//! ```

pub mod codec;
pub mod envelope;
pub mod error;
pub mod key;
pub mod signature;

#[cfg(test)]
pub(crate) mod testing;

pub use codec::{Codec, BLOCK_SIZE};
pub use envelope::{Envelope, LengthByteOrder, DEFAULT_LENGTH_BYTE_ORDER};
pub use error::{CodecError, CodecResult};
pub use key::SharedSecret;
pub use signature::{compute_signature, verify_signature};
