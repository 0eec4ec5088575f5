//! Binary framing of a decrypted callback payload.
//!
//! ```text
//! [16 bytes random][4 bytes length][length bytes content][tenant id]
//! ```
//!
//! followed by PKCS#7 padding to a 32-byte boundary.

use std::str::FromStr;

use super::error::{CodecError, CodecResult};

/// Random prefix the sender puts in front of every envelope.
pub const RANDOM_PREFIX_LEN: usize = 16;

/// Width of the content length field.
pub const LENGTH_FIELD_LEN: usize = 4;

/// Bytes that must be present before the content starts.
pub const HEADER_LEN: usize = RANDOM_PREFIX_LEN + LENGTH_FIELD_LEN;

/// Largest padding length accepted when unpadding.
pub const MAX_PAD_LEN: u8 = 32;

/// Byte order of the 4-byte content length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthByteOrder {
    /// Host byte order. Equals `Little` on x86-64 and aarch64 hosts.
    Native,
    Little,
    Big,
}

/// Length byte order used unless configured otherwise.
///
/// Existing deployments unpack the field in host order, while the platform's
/// published SDKs write network order. Set `WECOM_LENGTH_BYTE_ORDER=big` for
/// senders that follow the SDKs.
pub const DEFAULT_LENGTH_BYTE_ORDER: LengthByteOrder = LengthByteOrder::Native;

impl LengthByteOrder {
    pub fn read_u32(self, bytes: [u8; LENGTH_FIELD_LEN]) -> u32 {
        match self {
            LengthByteOrder::Native => u32::from_ne_bytes(bytes),
            LengthByteOrder::Little => u32::from_le_bytes(bytes),
            LengthByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }

    pub fn write_u32(self, value: u32) -> [u8; LENGTH_FIELD_LEN] {
        match self {
            LengthByteOrder::Native => value.to_ne_bytes(),
            LengthByteOrder::Little => value.to_le_bytes(),
            LengthByteOrder::Big => value.to_be_bytes(),
        }
    }
}

impl Default for LengthByteOrder {
    fn default() -> Self {
        DEFAULT_LENGTH_BYTE_ORDER
    }
}

impl FromStr for LengthByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(LengthByteOrder::Native),
            "little" | "le" => Ok(LengthByteOrder::Little),
            "big" | "be" | "network" => Ok(LengthByteOrder::Big),
            other => Err(format!("unknown byte order: {}", other)),
        }
    }
}

/// Strip PKCS#7 padding.
///
/// A last byte outside `[1, 32]` means the sender did not pad, and the buffer
/// is returned unchanged. A pad length larger than the buffer leaves nothing.
pub fn unpad_pkcs7(data: &[u8]) -> &[u8] {
    let pad_len = match data.last() {
        Some(&n) if (1..=MAX_PAD_LEN).contains(&n) => n as usize,
        _ => 0,
    };
    &data[..data.len().saturating_sub(pad_len)]
}

/// Borrowed view of a parsed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub content: &'a [u8],
    pub tenant_id: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Parse an unpadded envelope.
    ///
    /// Fails with `TruncatedEnvelope` if the header is incomplete or the
    /// declared length runs past the end of the buffer. Never clamps.
    pub fn parse(data: &'a [u8], order: LengthByteOrder) -> CodecResult<Self> {
        let content_len = read_length(data, order)?;
        let body = &data[HEADER_LEN..];

        if content_len > body.len() {
            return Err(CodecError::TruncatedEnvelope {
                needed: HEADER_LEN.saturating_add(content_len),
                available: data.len(),
            });
        }

        let (content, tenant_id) = body.split_at(content_len);
        Ok(Self { content, tenant_id })
    }
}

/// Degraded recovery for envelopes the primary parser rejected.
///
/// Finds the last occurrence of `tenant_id`, drops it and everything after
/// it, then drops the 20-byte header. If the length field happens to fit the
/// remaining bytes it is honoured, otherwise all of them are taken. This
/// rescues senders whose length field disagrees with the configured byte
/// order.
pub fn recover_content<'a>(
    data: &'a [u8],
    tenant_id: &[u8],
    order: LengthByteOrder,
) -> CodecResult<&'a [u8]> {
    if tenant_id.is_empty() {
        return Err(CodecError::TenantNotFound);
    }

    let end = data
        .windows(tenant_id.len())
        .rposition(|window| window == tenant_id)
        .ok_or(CodecError::TenantNotFound)?;
    let head = &data[..end];

    let declared = read_length(head, order)?;
    let body = &head[HEADER_LEN..];

    Ok(if declared <= body.len() {
        &body[..declared]
    } else {
        body
    })
}

fn read_length(data: &[u8], order: LengthByteOrder) -> CodecResult<usize> {
    if data.len() < HEADER_LEN {
        return Err(CodecError::TruncatedEnvelope {
            needed: HEADER_LEN,
            available: data.len(),
        });
    }

    let mut field = [0u8; LENGTH_FIELD_LEN];
    field.copy_from_slice(&data[RANDOM_PREFIX_LEN..HEADER_LEN]);
    Ok(order.read_u32(field) as usize)
}
