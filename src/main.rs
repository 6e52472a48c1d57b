//! The greenlight API server.
//!
//! Run with:
//!   RUST_LOG=info cargo run -- --port 4000 --env development
//!
//! Try:
//!   curl http://localhost:4000/v1/healthcheck
//!   curl http://localhost:4000/healthz

use anyhow::Context;
use clap::Parser;
use greenlight::config::Config;
use greenlight::middleware::{self, Pipeline};
use greenlight::{health, telemetry, BoxedHandler, Router, Server};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    telemetry::init(config.log_format);

    info!(env = %config.env, port = config.port, version = VERSION, "configuration loaded");

    let server = Server::bind(&config.listen_addr())
        .with_context(|| format!("invalid listen address for port {}", config.port))?
        .max_body_bytes(config.max_body_bytes);

    server
        .serve(app(&config))
        .await
        .context("server error")
}

fn app(config: &Config) -> BoxedHandler {
    let router = Router::new()
        .get("/v1/healthcheck", health::healthcheck(config.env.as_str(), VERSION))
        .get("/healthz", health::liveness)
        .get("/readyz", health::readiness);

    Pipeline::new()
        .layer(middleware::recover_panic)
        .wrap(router.into_handler())
}
