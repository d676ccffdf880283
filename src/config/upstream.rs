use super::{ validate_base_url, ConfigError };
use crate::cli::Args;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "tinyllama";
pub const CHAT_ROUTE: &str = "/api/chat";

/// Relay-side view of the upstream. Passed into every forward call.
///
/// Base URL precedence: `override_base_url` (deployment/environment), then the
/// value carried by the request, then `default_base_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub override_base_url: Option<String>,
    pub default_base_url: String,
    pub default_model: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            override_base_url: None,
            default_base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl UpstreamConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let override_base_url = non_blank(args.ollama_url.as_deref()).map(str::to_string);
        if let Some(url) = &override_base_url {
            validate_base_url(url)?;
        }
        validate_base_url(&args.default_base_url)?;

        Ok(Self {
            override_base_url,
            default_base_url: args.default_base_url.clone(),
            default_model: args.default_model.clone(),
        })
    }

    pub fn with_override(mut self, base_url: impl Into<String>) -> Self {
        self.override_base_url = Some(base_url.into());
        self
    }

    pub fn resolve_base_url<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        non_blank(self.override_base_url.as_deref())
            .or_else(|| non_blank(requested))
            .unwrap_or(self.default_base_url.as_str())
    }

    pub fn chat_endpoint(&self, requested: Option<&str>) -> String {
        format!("{}{}", self.resolve_base_url(requested).trim_end_matches('/'), CHAT_ROUTE)
    }

    pub fn resolve_model<'a>(&'a self, requested: &'a str) -> &'a str {
        non_blank(Some(requested)).unwrap_or(self.default_model.as_str())
    }
}
