//! Callback XML parser.

use thiserror::Error;
use tracing::{debug, warn};

use super::types::{CallbackBody, EncryptedMessage, InboundMessage, RawCallbackXml};

#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Invalid callback XML: {0}")]
    Xml(#[from] quick_xml::de::DeError),

    #[error("Callback XML is missing <{0}>")]
    MissingField(&'static str),
}

/// Parse a POST body into either a plaintext message or an encrypted wrapper.
///
/// A non-empty `Encrypt` element wins over any plaintext fields.
pub fn parse_callback(xml: &str) -> Result<CallbackBody, MessageError> {
    let raw = parse_raw(xml)?;

    match raw.encrypt.filter(|s| !s.trim().is_empty()) {
        Some(encrypt) => {
            debug!(
                encrypt_length = encrypt.len(),
                agent_id = ?raw.agent_id,
                "callback_xml_encrypted"
            );
            Ok(CallbackBody::Encrypted(EncryptedMessage {
                to_user_name: raw.to_user_name,
                agent_id: raw.agent_id,
                encrypt: encrypt.trim().to_string(),
            }))
        }
        None => Ok(CallbackBody::Plain(into_message(RawCallbackXml {
            encrypt: None,
            ..raw
        })?)),
    }
}

/// Parse a plaintext message document.
///
/// `FromUserName` and `ToUserName` are required; everything else is optional.
pub fn parse_message(xml: &str) -> Result<InboundMessage, MessageError> {
    into_message(parse_raw(xml)?)
}

fn parse_raw(xml: &str) -> Result<RawCallbackXml, MessageError> {
    quick_xml::de::from_str(xml).map_err(|e| {
        warn!(
            error = %e,
            xml_preview = %preview(xml),
            "callback_xml_parse_failed"
        );
        MessageError::from(e)
    })
}

fn into_message(raw: RawCallbackXml) -> Result<InboundMessage, MessageError> {
    let from_user_name = raw
        .from_user_name
        .ok_or(MessageError::MissingField("FromUserName"))?;
    let to_user_name = raw
        .to_user_name
        .ok_or(MessageError::MissingField("ToUserName"))?;

    Ok(InboundMessage {
        from_user_name,
        to_user_name,
        create_time: raw.create_time,
        msg_type: raw.msg_type,
        content: raw.content,
        msg_id: raw.msg_id,
        agent_id: raw.agent_id,
    })
}

fn preview(s: &str) -> &str {
    match s.char_indices().nth(200) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
