use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Upstream Args ---
    /// Base URL of the Ollama server. When set it overrides whatever base URL a client sends.
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Base URL used when neither OLLAMA_URL nor the request supplies one.
    #[arg(long, env = "DEFAULT_OLLAMA_URL", default_value = "http://localhost:11434")]
    pub default_base_url: String,

    /// Model name used when a request leaves `model` empty (e.g., tinyllama, llama3)
    #[arg(long, env = "DEFAULT_MODEL", default_value = "tinyllama")]
    pub default_model: String,

    // --- Server Args ---
    /// Host address and port for the relay to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
