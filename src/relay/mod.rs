pub mod extract;

pub use extract::extract_reply;

use crate::config::UpstreamConfig;
use crate::models::relay::{ RelayRequest, RelayResponse, UpstreamChatRequest };
use log::{ debug, error };
use reqwest::{ Client as HttpClient, StatusCode };
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("Ollama API error: {}", .0.as_u16())]
    UpstreamStatus(StatusCode),
    #[error("Invalid JSON from Ollama: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RelayError {
    /// Status returned by the upstream, when it answered at all.
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            RelayError::UpstreamStatus(status) => Some(*status),
            RelayError::Transport(e) => e.status(),
            RelayError::Decode(_) => None,
        }
    }
}

/// Stateless forwarder to an Ollama-compatible `/api/chat` endpoint.
///
/// Holds only the HTTP connection pool. Each call resolves its endpoint from
/// the `UpstreamConfig` it is given and keeps nothing afterwards.
#[derive(Debug, Clone, Default)]
pub struct Relay {
    http: HttpClient,
}

impl Relay {
    pub fn new() -> Self {
        Self { http: HttpClient::new() }
    }

    pub async fn forward(
        &self,
        request: &RelayRequest,
        config: &UpstreamConfig
    ) -> Result<RelayResponse, RelayError> {
        let body = self.post_chat(request, config).await?;
        Ok(RelayResponse { content: extract_reply(&body) })
    }

    /// Same call as [`Relay::forward`] but hands back the upstream JSON untouched.
    pub async fn forward_raw(
        &self,
        request: &RelayRequest,
        config: &UpstreamConfig
    ) -> Result<JsonValue, RelayError> {
        self.post_chat(request, config).await
    }

    async fn post_chat(
        &self,
        request: &RelayRequest,
        config: &UpstreamConfig
    ) -> Result<JsonValue, RelayError> {
        let url = config.chat_endpoint(request.base_url.as_deref());
        let model = config.resolve_model(&request.model);
        debug!(
            "Forwarding {} turn(s) to {} (model={})",
            request.messages.len(),
            url,
            model
        );

        let payload = UpstreamChatRequest {
            model,
            messages: &request.messages,
            stream: false,
            extra: &request.extra,
        };

        let resp = self.http.post(&url).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            error!("Ollama at {} answered with status {}", url, status);
            return Err(RelayError::UpstreamStatus(status));
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
