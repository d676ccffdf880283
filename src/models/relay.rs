use crate::models::chat::Transcript;
use serde::{ Deserialize, Serialize };
use serde_json::{ Map, Value as JsonValue };

/// Body accepted by the relay and sent by a chat session.
///
/// Fields other than the named ones are kept in `extra` and forwarded to the
/// upstream untouched (e.g. `options`, `format`, `keep_alive`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Transcript,
    #[serde(default)]
    pub stream: bool,
    /// Upstream base URL requested by the session. A deployment override wins over it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl RelayRequest {
    pub fn new(model: impl Into<String>, messages: Transcript) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            base_url: None,
            extra: Map::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Body posted to `<base>/api/chat`. Streaming is never requested.
#[derive(Serialize, Debug)]
pub struct UpstreamChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a Transcript,
    pub stream: bool,
    #[serde(flatten)]
    pub extra: &'a Map<String, JsonValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayResponse {
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub content: String,
}

/// `{ "message": { "content": ... } }`, returned by the relay on success and on handled failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: ReplyMessage,
}

impl ChatReply {
    pub fn new(content: impl Into<String>) -> Self {
        Self { message: ReplyMessage { content: content.into() } }
    }
}

impl From<RelayResponse> for ChatReply {
    fn from(resp: RelayResponse) -> Self {
        ChatReply::new(resp.content)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
