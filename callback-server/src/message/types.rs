//! Type definitions for callback XML documents.

use serde::Deserialize;

/// Every element the receiver looks at, all optional.
///
/// Unknown elements are ignored. Which fields are required depends on the
/// document shape and is checked by the parser.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawCallbackXml {
    #[serde(default, rename = "ToUserName")]
    pub to_user_name: Option<String>,
    #[serde(default, rename = "FromUserName")]
    pub from_user_name: Option<String>,
    #[serde(default, rename = "CreateTime")]
    pub create_time: Option<String>,
    #[serde(default, rename = "MsgType")]
    pub msg_type: Option<String>,
    #[serde(default, rename = "Content")]
    pub content: Option<String>,
    #[serde(default, rename = "MsgId")]
    pub msg_id: Option<String>,
    #[serde(default, rename = "AgentID")]
    pub agent_id: Option<String>,
    #[serde(default, rename = "Encrypt")]
    pub encrypt: Option<String>,
}

/// A plaintext message pushed by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender user id
    pub from_user_name: String,
    /// Receiving corp id
    pub to_user_name: String,
    /// Unix timestamp as sent
    pub create_time: Option<String>,
    /// Message type (`text`, `event`, ...)
    pub msg_type: Option<String>,
    /// Text content, absent for non-text messages
    pub content: Option<String>,
    /// Platform message id
    pub msg_id: Option<String>,
    /// Receiving application id
    pub agent_id: Option<String>,
}

/// Encrypted wrapper posted when the callback runs in safe mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedMessage {
    /// Receiving corp id
    pub to_user_name: Option<String>,
    /// Receiving application id
    pub agent_id: Option<String>,
    /// Base64 ciphertext, also the payload of `msg_signature`
    pub encrypt: String,
}

/// Parsed POST body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackBody {
    Plain(InboundMessage),
    Encrypted(EncryptedMessage),
}
