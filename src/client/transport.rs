use crate::config::UpstreamConfig;
use crate::models::relay::{ ChatReply, RelayRequest };
use crate::relay::{ Relay, RelayError };
use crate::server::api::CHAT_PATH;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    /// The relay answered with a non-success status; carries its explanation.
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Relay(#[from] RelayError),
}

/// How a chat session reaches a relay. Returns the assistant reply text.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send(&self, request: RelayRequest) -> Result<String, TransportError>;
}

/// Talks to a relay server over HTTP, the way the browser widget does.
#[derive(Debug, Clone)]
pub struct HttpRelayTransport {
    http: HttpClient,
    endpoint: String,
}

impl HttpRelayTransport {
    pub fn new(relay_url: &str) -> Self {
        Self {
            http: HttpClient::new(),
            endpoint: format!("{}{}", relay_url.trim_end_matches('/'), CHAT_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn send(&self, request: RelayRequest) -> Result<String, TransportError> {
        let resp = self.http.post(&self.endpoint).json(&request).send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.bytes().await.unwrap_or_default();
            let reason = serde_json::from_slice::<ChatReply>(&body)
                .map(|reply| reply.message.content)
                .unwrap_or_else(|_| format!("HTTP error! status: {}", status.as_u16()));
            return Err(TransportError::Rejected(reason));
        }

        let reply = resp.json::<ChatReply>().await?;
        Ok(reply.message.content)
    }
}

/// Calls a [`Relay`] in-process with a fixed upstream configuration.
#[derive(Debug, Clone)]
pub struct DirectTransport {
    relay: Relay,
    config: UpstreamConfig,
}

impl DirectTransport {
    pub fn new(relay: Relay, config: UpstreamConfig) -> Self {
        Self { relay, config }
    }
}

#[async_trait]
impl RelayTransport for DirectTransport {
    async fn send(&self, request: RelayRequest) -> Result<String, TransportError> {
        let resp = self.relay.forward(&request, &self.config).await?;
        Ok(resp.content)
    }
}
