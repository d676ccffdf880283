use crate::cli::Args;
use crate::config::{ ConfigError, UpstreamConfig };
use crate::models::relay::{ ChatReply, ErrorBody, RelayRequest };
use crate::relay::Relay;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::post,
    Router,
    extract::{ State, rejection::JsonRejection },
    response::{ IntoResponse, Response },
    http::{ Method, StatusCode },
    Json,
};
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn, error };

pub const CHAT_PATH: &str = "/api/ollama-chat";
pub const RAW_CHAT_PATH: &str = "/api/ollama-chats";

#[derive(Clone)]
pub struct AppState {
    relay: Relay,
    upstream: Arc<UpstreamConfig>,
}

impl AppState {
    pub fn new(relay: Relay, upstream: UpstreamConfig) -> Self {
        Self { relay, upstream: Arc::new(upstream) }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(CHAT_PATH, post(chat_handler).fallback(method_not_allowed))
        .route(RAW_CHAT_PATH, post(raw_chat_handler).fallback(method_not_allowed))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    addr: SocketAddr,
    state: AppState,
    args: &Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let app = build_router(state);

    if args.enable_tls {
        let (cert_path, key_path) = match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert), Some(key)) => (cert, key),
            _ => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err(ConfigError::Tls("TLS enabled without cert/key".into()).into());
            }
        };
        info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        info!("Relay listening on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind relay to {}: {}. Try a different port.", addr, e);
            e
        })?;
        info!("Relay listening on: http://{}", addr);
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}

fn bad_request(rejection: JsonRejection) -> Response {
    warn!("Rejected relay request body: {}", rejection.body_text());
    (rejection.status(), Json(ErrorBody {
        error: "Invalid request body".into(),
        message: Some(rejection.body_text()),
    })).into_response()
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection),
    };

    match state.relay.forward(&request, &state.upstream).await {
        Ok(resp) => (StatusCode::OK, Json(ChatReply::from(resp))).into_response(),
        Err(e) => {
            error!("Ollama proxy error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatReply::new(format!("Failed to connect to Ollama: {}", e))),
            ).into_response()
        }
    }
}

async fn raw_chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => return bad_request(rejection),
    };

    match state.relay.forward_raw(&request, &state.upstream).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => {
            error!("Ollama proxy error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody {
                error: "Failed to connect to Ollama".into(),
                message: Some(e.to_string()),
            })).into_response()
        }
    }
}

async fn method_not_allowed(method: Method) -> Response {
    warn!("Rejected {} request to relay", method);
    (StatusCode::METHOD_NOT_ALLOWED, Json(ErrorBody {
        error: "Method not allowed".into(),
        message: None,
    })).into_response()
}
