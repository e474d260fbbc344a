//! Finelo · Learning Progress Backend
//!
//! - Axum HTTP API for lesson sequencing, rewards, streaks, levels and leagues
//! - In-memory store, optionally mirrored to a JSON snapshot file
//! - Built-in lesson catalog seeded once (marker row), overridable via TOML
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   PROGRESS_CONFIG_PATH  : path to TOML config (rewards, levels, unlock policy, lessons)
//!   STORE_SNAPSHOT_PATH   : JSON file the store is loaded from and mirrored to
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod badges;
mod config;
mod domain;
mod engine;
mod error;
mod league;
mod levels;
mod protocol;
mod rewards;
mod routes;
mod seeds;
mod sequencer;
mod state;
mod store;
mod streak;
mod telemetry;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Open the store, seed the catalog and build the engine.
  let state = Arc::new(AppState::from_env().await?);

  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "finelo_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "finelo_backend", "HTTP server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "finelo_backend", error = %e, "Failed to listen for ctrl-c");
  }
}
