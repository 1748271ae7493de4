//! The snapshot HTTP endpoint: a single read-only route that renders the
//! currently published pool-snapshot list as a JSON array.
//!
//! Grounded on `fusillicode-dotfiles`'s `nomicon/src/server.rs`, the
//! closest thing in the retrieved pack to a minimal `axum` status service;
//! a single GET route doesn't warrant the heavier `rocket`+`sqlx` stack
//! `tansanrao-nexus` uses for its own, much larger API surface.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::snapshot::{PoolSnapshot, SnapshotStore};

async fn pools(State(store): State<Arc<SnapshotStore>>) -> Json<Vec<PoolSnapshot>> {
    Json(store.read())
}

pub fn router(store: Arc<SnapshotStore>) -> Router {
    Router::new().route("/pools", get(pools)).with_state(store)
}

/// Serves the status endpoint until the process exits. Intended to be
/// spawned as a background task alongside the control loop.
pub async fn serve(addr: SocketAddr, store: Arc<SnapshotStore>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(store)).await?;
    Ok(())
}
