//! Error taxonomy for the envelope codec.

use thiserror::Error;

/// Failure of a single key-derivation or decode call.
///
/// Every variant is terminal for the call that produced it. Callers map all
/// of them to the protocol's failure indicator; a signature mismatch is not
/// an error and never shows up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid EncodingAESKey: {0}")]
    InvalidKey(String),

    #[error("Malformed ciphertext: {0}")]
    MalformedInput(String),

    #[error("Truncated envelope: need {needed} bytes, have {available}")]
    TruncatedEnvelope { needed: usize, available: usize },

    #[error("Envelope content is not valid UTF-8")]
    EncodingError(#[from] std::string::FromUtf8Error),

    #[error("Tenant id not found in envelope")]
    TenantNotFound,
}

pub type CodecResult<T> = Result<T, CodecError>;
