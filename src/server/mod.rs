pub mod api;

pub use api::{ build_router, AppState };

use crate::cli::Args;
use crate::config::UpstreamConfig;
use crate::relay::Relay;
use std::error::Error;
use std::net::SocketAddr;

pub struct Server {
    addr: String,
    state: AppState,
    args: Args,
}

impl Server {
    pub fn new(addr: String, upstream: UpstreamConfig, args: Args) -> Self {
        Self {
            addr,
            state: AppState::new(Relay::new(), upstream),
            args,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        api::start_http_server(addr, self.state.clone(), &self.args).await
    }
}
