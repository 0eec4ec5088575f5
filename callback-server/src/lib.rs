//! WeCom callback receiver.
//!
//! This library provides the modules behind the `wecom-callback` binary:
//! - `crypto`: Signature verification and envelope decryption
//! - `message`: Callback XML parsing
//! - `web`: URL verification and message delivery endpoints
//!
//! ## Architecture
//!
//! ```text
//! Platform → web handlers → crypto::Codec (verify, decode) → message parser → log
//! ```

pub mod config;
pub mod crypto;
pub mod message;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use crypto::{Codec, CodecError, LengthByteOrder};
pub use message::{CallbackBody, InboundMessage};
pub use web::{router, AppState};
