//! Callback endpoint handlers.
//!
//! The platform only looks at the response body, so every handler answers
//! 200 and signals failure through the body:
//! - URL verification: decrypted `echostr`, or `fail`
//! - Message delivery: `success`, or an empty body

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::crypto::{Codec, CodecResult};
use crate::message::{parse_callback, parse_message, CallbackBody, EncryptedMessage, InboundMessage};
use crate::Config;

/// Body returned when URL verification fails.
pub const FAIL_BODY: &str = "fail";

/// Body acknowledging a delivered message.
pub const SUCCESS_BODY: &str = "success";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub codec: Arc<Codec>,
}

impl AppState {
    pub fn new(config: Config, codec: Codec) -> Self {
        Self {
            config: Arc::new(config),
            codec: Arc::new(codec),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Callback Query
// =============================================================================

/// Query parameters the platform appends to every callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub msg_signature: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub echostr: Option<String>,
}

impl CallbackQuery {
    /// `(msg_signature, timestamp, nonce)`, if all are present and non-empty.
    pub fn signature_params(&self) -> Option<(&str, &str, &str)> {
        Some((
            non_empty(&self.msg_signature)?,
            non_empty(&self.timestamp)?,
            non_empty(&self.nonce)?,
        ))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

// =============================================================================
// URL Verification
// =============================================================================

/// URL verification endpoint (GET).
///
/// This endpoint:
/// 1. Requires `msg_signature`, `timestamp`, `nonce` and `echostr`
/// 2. Verifies the signature over the token, timestamp, nonce and `echostr`
/// 3. Decrypts `echostr` and returns the plaintext as the raw body
pub async fn verify_url(
    State(state): State<AppState>,
    query: Option<Query<CallbackQuery>>,
) -> Response {
    let query = query.map(|Query(q)| q).unwrap_or_default();

    info!(
        has_signature = query.msg_signature.is_some(),
        has_echostr = query.echostr.is_some(),
        "callback_verify_received"
    );

    let (signature, timestamp, nonce, echostr) =
        match (query.signature_params(), non_empty(&query.echostr)) {
            (Some((signature, timestamp, nonce)), Some(echostr)) => {
                (signature, timestamp, nonce, echostr)
            }
            _ => {
                warn!("callback_verify_missing_params");
                return fail();
            }
        };

    if !state.codec.verify(timestamp, nonce, echostr, signature) {
        warn!(timestamp = %timestamp, nonce = %nonce, "callback_verify_signature_invalid");
        return fail();
    }

    match decode_payload(&state, echostr) {
        Ok(plaintext) => {
            info!(plaintext_length = plaintext.len(), "callback_verify_succeeded");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                plaintext,
            )
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "callback_verify_decode_failed");
            fail()
        }
    }
}

fn fail() -> Response {
    (StatusCode::OK, FAIL_BODY).into_response()
}

// =============================================================================
// Message Delivery
// =============================================================================

/// Message delivery endpoint (POST).
///
/// This endpoint:
/// 1. Parses the XML body
/// 2. For an encrypted wrapper, verifies `msg_signature` over the `Encrypt`
///    element and decodes it into the inner message
/// 3. Logs the message and acknowledges with `success`
///
/// Anything that cannot be parsed or verified gets an empty 200.
pub async fn receive_message(
    State(state): State<AppState>,
    query: Option<Query<CallbackQuery>>,
    body: Bytes,
) -> Response {
    let query = query.map(|Query(q)| q).unwrap_or_default();

    info!(body_length = body.len(), "callback_message_received");

    let xml = match std::str::from_utf8(&body) {
        Ok(xml) => xml,
        Err(e) => {
            warn!(error = %e, "callback_message_not_utf8");
            return empty_ack();
        }
    };

    let message = match parse_callback(xml) {
        Ok(CallbackBody::Plain(message)) => message,
        Ok(CallbackBody::Encrypted(wrapper)) => match open_encrypted(&state, &query, &wrapper) {
            Some(message) => message,
            None => return empty_ack(),
        },
        Err(e) => {
            warn!(error = %e, "callback_message_parse_failed");
            return empty_ack();
        }
    };

    info!(
        from = %message.from_user_name,
        to = %message.to_user_name,
        msg_type = ?message.msg_type,
        msg_id = ?message.msg_id,
        agent_id = ?message.agent_id,
        content_length = message.content.as_ref().map(|s| s.len()).unwrap_or(0),
        "callback_message_accepted"
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        SUCCESS_BODY,
    )
        .into_response()
}

fn empty_ack() -> Response {
    StatusCode::OK.into_response()
}

/// Verify and decode an encrypted wrapper into its inner message.
fn open_encrypted(
    state: &AppState,
    query: &CallbackQuery,
    wrapper: &EncryptedMessage,
) -> Option<InboundMessage> {
    let Some((signature, timestamp, nonce)) = query.signature_params() else {
        warn!("callback_message_missing_params");
        return None;
    };

    if !state.codec.verify(timestamp, nonce, &wrapper.encrypt, signature) {
        warn!(timestamp = %timestamp, nonce = %nonce, "callback_message_signature_invalid");
        return None;
    }

    let plaintext = match decode_payload(state, &wrapper.encrypt) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            warn!(error = %e, "callback_message_decode_failed");
            return None;
        }
    };

    match parse_message(&plaintext) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(error = %e, "callback_message_inner_parse_failed");
            None
        }
    }
}

/// Decrypt a ciphertext, falling back to degraded recovery when enabled.
///
/// If recovery also fails the primary error is returned.
fn decode_payload(state: &AppState, ciphertext: &str) -> CodecResult<String> {
    let codec = &state.codec;
    let plaintext = codec.decrypt(ciphertext)?;

    if !state.config.enable_recovery {
        return codec.open(&plaintext);
    }

    codec.open(&plaintext).or_else(|primary| {
        warn!(error = %primary, "envelope_primary_decode_failed");
        codec.recover(&plaintext).map_err(|_| primary)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, Router};
    use tower::ServiceExt;

    use crate::crypto::testing::seal;
    use crate::crypto::{compute_signature, LengthByteOrder};
    use crate::web::router;

    const KEY: &str = "u5qbvLqUpqNiYlEEBlIZDQAAM75xi0oysfZ5w4VAbGu";
    const TOKEN: &str = "dKRGawa7AuPLkuFNnob3snm1BlruG7GB";
    const CORP_ID: &str = "wwe4ba7c630dcd5ab2";
    const TIMESTAMP: &str = "1409659813";
    const NONCE: &str = "1372623149";

    fn test_state(byte_order: LengthByteOrder, enable_recovery: bool) -> AppState {
        let config = Config {
            port: 0,
            callback_path: "/wecom".to_string(),
            token: TOKEN.to_string(),
            encoding_aes_key: KEY.to_string(),
            corp_id: CORP_ID.to_string(),
            length_byte_order: byte_order,
            enable_recovery,
            log_file: None,
        };
        let codec = config.codec().unwrap();
        AppState::new(config, codec)
    }

    fn app() -> Router {
        router(test_state(LengthByteOrder::Native, false))
    }

    fn query_string(pairs: &[(&str, &str)]) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in pairs {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }

    fn signed_query(payload: &str, echostr: Option<&str>) -> String {
        let signature = compute_signature(TOKEN, TIMESTAMP, NONCE, payload);
        let mut pairs = vec![
            ("msg_signature", signature.as_str()),
            ("timestamp", TIMESTAMP),
            ("nonce", NONCE),
        ];
        if let Some(echostr) = echostr {
            pairs.push(("echostr", echostr));
        }
        query_string(&pairs)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn get(uri: String) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: String, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "text/xml")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _, body) = send(app(), get("/health".to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_verify_url_success() {
        let state = test_state(LengthByteOrder::Native, false);
        let echostr = seal(&state.codec, b"6158417539284519386", CORP_ID.as_bytes());
        let uri = format!("/wecom?{}", signed_query(&echostr, Some(&echostr)));

        let (status, content_type, body) = send(router(state), get(uri)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("text/plain; charset=utf-8"));
        assert_eq!(body, "6158417539284519386");
    }

    #[tokio::test]
    async fn test_verify_url_missing_params() {
        let uri = format!("/wecom?{}", query_string(&[("timestamp", TIMESTAMP), ("nonce", NONCE)]));

        let (status, _, body) = send(app(), get(uri)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, FAIL_BODY);
    }

    #[tokio::test]
    async fn test_verify_url_empty_param() {
        let uri = format!("/wecom?{}", signed_query("", Some("")));

        let (_, _, body) = send(app(), get(uri)).await;

        assert_eq!(body, FAIL_BODY);
    }

    #[tokio::test]
    async fn test_verify_url_no_query() {
        let (status, _, body) = send(app(), get("/wecom".to_string())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, FAIL_BODY);
    }

    #[tokio::test]
    async fn test_verify_url_bad_signature() {
        let state = test_state(LengthByteOrder::Native, false);
        let echostr = seal(&state.codec, b"hello", CORP_ID.as_bytes());
        let uri = format!("/wecom?{}", signed_query("something-else", Some(&echostr)));

        let (_, _, body) = send(router(state), get(uri)).await;

        assert_eq!(body, FAIL_BODY);
    }

    #[tokio::test]
    async fn test_verify_url_undecodable_echostr() {
        // Correctly signed but not a valid ciphertext.
        let uri = format!("/wecom?{}", signed_query("hello", Some("hello")));

        let (status, _, body) = send(app(), get(uri)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, FAIL_BODY);
    }

    #[tokio::test]
    async fn test_verify_url_recovery_disabled_and_enabled() {
        // Sender writes a big-endian length; receiver reads little-endian.
        let sender = test_state(LengthByteOrder::Big, false);
        let echostr = seal(&sender.codec, b"hello wecom", CORP_ID.as_bytes());
        let uri = format!("/wecom?{}", signed_query(&echostr, Some(&echostr)));

        let strict = router(test_state(LengthByteOrder::Little, false));
        let (_, _, body) = send(strict, get(uri.clone())).await;
        assert_eq!(body, FAIL_BODY);

        let lenient = router(test_state(LengthByteOrder::Little, true));
        let (_, _, body) = send(lenient, get(uri)).await;
        assert_eq!(body, "hello wecom");
    }

    const PLAIN_XML: &str = r#"<xml>
<ToUserName><![CDATA[wwe4ba7c630dcd5ab2]]></ToUserName>
<FromUserName><![CDATA[zhangsan]]></FromUserName>
<CreateTime>1348831860</CreateTime>
<MsgType><![CDATA[text]]></MsgType>
<Content><![CDATA[hello]]></Content>
<MsgId>1234567890123456</MsgId>
<AgentID>1000002</AgentID>
</xml>"#;

    #[tokio::test]
    async fn test_receive_plain_message() {
        let (status, content_type, body) =
            send(app(), post("/wecom".to_string(), PLAIN_XML)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/xml"));
        assert_eq!(body, SUCCESS_BODY);
    }

    #[tokio::test]
    async fn test_receive_message_without_content() {
        let xml = "<xml><ToUserName>corp</ToUserName><FromUserName>lisi</FromUserName></xml>";

        let (_, _, body) = send(app(), post("/wecom".to_string(), xml)).await;

        assert_eq!(body, SUCCESS_BODY);
    }

    #[tokio::test]
    async fn test_receive_malformed_message() {
        let (status, _, body) = send(app(), post("/wecom".to_string(), "<xml><oops")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_receive_message_missing_sender() {
        let xml = "<xml><ToUserName>corp</ToUserName></xml>";

        let (status, _, body) = send(app(), post("/wecom".to_string(), xml)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    fn encrypted_xml(encrypt: &str) -> String {
        format!(
            "<xml><ToUserName><![CDATA[{}]]></ToUserName><Encrypt><![CDATA[{}]]></Encrypt><AgentID><![CDATA[1000002]]></AgentID></xml>",
            CORP_ID, encrypt
        )
    }

    #[tokio::test]
    async fn test_receive_encrypted_message() {
        let state = test_state(LengthByteOrder::Native, false);
        let encrypt = seal(&state.codec, PLAIN_XML.as_bytes(), CORP_ID.as_bytes());
        let uri = format!("/wecom?{}", signed_query(&encrypt, None));

        let (status, _, body) = send(router(state), post(uri, &encrypted_xml(&encrypt))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, SUCCESS_BODY);
    }

    #[tokio::test]
    async fn test_receive_encrypted_message_bad_signature() {
        let state = test_state(LengthByteOrder::Native, false);
        let encrypt = seal(&state.codec, PLAIN_XML.as_bytes(), CORP_ID.as_bytes());
        let uri = format!("/wecom?{}", signed_query("tampered", None));

        let (status, _, body) = send(router(state), post(uri, &encrypted_xml(&encrypt))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_receive_encrypted_message_without_query() {
        let state = test_state(LengthByteOrder::Native, false);
        let encrypt = seal(&state.codec, PLAIN_XML.as_bytes(), CORP_ID.as_bytes());

        let (_, _, body) =
            send(router(state), post("/wecom".to_string(), &encrypted_xml(&encrypt))).await;

        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_receive_encrypted_non_xml_payload() {
        let state = test_state(LengthByteOrder::Native, false);
        let encrypt = seal(&state.codec, b"plain words", CORP_ID.as_bytes());
        let uri = format!("/wecom?{}", signed_query(&encrypt, None));

        let (_, _, body) = send(router(state), post(uri, &encrypted_xml(&encrypt))).await;

        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_receive_non_utf8_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/wecom")
            .body(Body::from(vec![0xFFu8, 0xFE, 0x00]))
            .unwrap();

        let (status, _, body) = send(app(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[test]
    fn test_signature_params() {
        let query = CallbackQuery {
            msg_signature: Some("sig".to_string()),
            timestamp: Some("1".to_string()),
            nonce: Some(String::new()),
            echostr: None,
        };
        assert_eq!(query.signature_params(), None);

        let query = CallbackQuery {
            nonce: Some("n".to_string()),
            ..query
        };
        assert_eq!(query.signature_params(), Some(("sig", "1", "n")));
    }
}
