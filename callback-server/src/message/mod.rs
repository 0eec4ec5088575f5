//! Callback XML parsing.
//!
//! The platform posts one of two XML shapes to the callback URL:
//! - A plaintext message with `FromUserName`, `ToUserName` and friends
//! - An encrypted wrapper whose `Encrypt` element holds a sealed message
//!
//! The wrapper's plaintext is itself a plaintext message document.

pub mod parser;
pub mod types;

pub use parser::{parse_callback, parse_message, MessageError};
pub use types::{CallbackBody, EncryptedMessage, InboundMessage};
