pub mod upstream;

pub use upstream::{ UpstreamConfig, CHAT_ROUTE, DEFAULT_BASE_URL, DEFAULT_MODEL };

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid upstream URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),
    #[error("TLS configuration error: {0}")]
    Tls(String),
}

/// Settings a chat session edits: where the model server lives and which model to ask.
/// Held only for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub upstream_base_url: String,
    pub model: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            upstream_base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

pub fn validate_base_url(raw: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}
