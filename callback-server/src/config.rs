//! Configuration module for environment variable parsing.
//!
//! All configuration is read once at startup and then shared read-only.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

use crate::crypto::{Codec, LengthByteOrder};

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Route that receives both the verification GET and message POSTs
    pub callback_path: String,

    /// Verification token used for callback signatures
    pub token: String,

    /// Base64 EncodingAESKey (43 characters, padding optional)
    pub encoding_aes_key: String,

    /// Corp id embedded in every encrypted envelope
    pub corp_id: String,

    /// Byte order of the envelope content length field
    pub length_byte_order: LengthByteOrder,

    /// Fall back to locating the corp id when the primary decode fails
    pub enable_recovery: bool,

    /// Optional append-only log file, in addition to stdout
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails if any of the platform credentials is missing.
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8081),

            callback_path: parse_path("CALLBACK_PATH", "/"),

            token: required("WECOM_TOKEN")?,

            encoding_aes_key: required("WECOM_ENCODING_AES_KEY")?,

            corp_id: required("WECOM_CORP_ID")?,

            length_byte_order: parse_byte_order("WECOM_LENGTH_BYTE_ORDER"),

            enable_recovery: parse_bool("WECOM_ENABLE_RECOVERY", false),

            log_file: env::var("CALLBACK_LOG_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Build the envelope codec for the configured corp.
    pub fn codec(&self) -> Result<Codec> {
        let codec = Codec::new(&self.encoding_aes_key, &self.token, &self.corp_id)
            .context("Invalid WECOM_ENCODING_AES_KEY")?;
        Ok(codec.with_byte_order(self.length_byte_order))
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("callback_path", &self.callback_path)
            .field("corp_id", &self.corp_id)
            .field("length_byte_order", &self.length_byte_order)
            .field("enable_recovery", &self.enable_recovery)
            .field("log_file", &self.log_file)
            .finish_non_exhaustive()
    }
}

/// Read a variable that must be present and non-blank.
fn required(name: &str) -> Result<String> {
    let value = env::var(name).with_context(|| format!("{} must be set", name))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        anyhow::bail!("{} must not be empty", name);
    }
    Ok(trimmed.to_string())
}

/// Parse a route path, adding the leading slash if it is missing.
fn parse_path(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            let trimmed = raw.trim();
            if trimmed.starts_with('/') {
                trimmed.to_string()
            } else {
                format!("/{}", trimmed)
            }
        }
        _ => default.to_string(),
    }
}

/// Parse the length field byte order, falling back to the default.
fn parse_byte_order(name: &str) -> LengthByteOrder {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return LengthByteOrder::default(),
    };

    raw.parse().unwrap_or_else(|e: String| {
        warn!(env_var = name, value = %raw, error = %e, "Invalid byte order, using default");
        LengthByteOrder::default()
    })
}

/// Parse a boolean flag such as "true", "1" or "yes".
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}
