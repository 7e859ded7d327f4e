//! HTTP API subsystem.
//!
//! Serves the cached discovery snapshot with [axum](https://crates.io/crates/axum):
//!
//! * `GET /api/pnodes`: every known node, reachable first.
//! * `GET /api/pnodes/scores`: nodes ranked by health score, optionally
//!   filtered with `tier`, `min_score` and `limit`.
//! * `GET /api/network`: snapshot-wide summary.
//! * `GET /health`: liveness.
//!
//! Handlers read through the [`DiscoveryCache`], so a stale cache is
//! refreshed by whichever request notices first.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::discovery::DiscoveryCache;
use crate::scoring::{score_node, NetworkAggregates};
use crate::types::{CycleStats, HealthScore, NodeRecord, Tier};

/// Bind the API listener.  Done before any task is spawned so that a taken
/// port stops startup instead of leaving a daemon with no API.
pub async fn bind_http(bind_addr: SocketAddr) -> anyhow::Result<TcpListener> {
    TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind HTTP API on {}", bind_addr))
}

/// Serve the API on an already bound listener until it fails.
pub async fn run_http_server(listener: TcpListener, cache: Arc<DiscoveryCache>) -> anyhow::Result<()> {
    info!("HTTP API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(cache)).await?;
    Ok(())
}

pub fn router(cache: Arc<DiscoveryCache>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/pnodes", get(list_pnodes))
        .route("/api/pnodes/scores", get(list_scores))
        .route("/api/network", get(network_summary))
        .with_state(cache)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub success: bool,
    pub cached: bool,
    pub count: usize,
    pub data: Vec<T>,
}

async fn list_pnodes(State(cache): State<Arc<DiscoveryCache>>) -> Json<ListResponse<NodeRecord>> {
    let read = cache.read().await;
    let data = read.snapshot.nodes.clone();
    Json(ListResponse {
        success: true,
        cached: read.cached,
        count: data.len(),
        data,
    })
}

#[derive(Debug, Deserialize)]
pub struct ScoreQuery {
    tier: Option<String>,
    min_score: Option<u8>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ScoredNode {
    pub node: NodeRecord,
    pub health: HealthScore,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

async fn list_scores(
    State(cache): State<Arc<DiscoveryCache>>,
    Query(query): Query<ScoreQuery>,
) -> Response {
    let tier = match query.tier.as_deref().map(str::parse::<Tier>).transpose() {
        Ok(tier) => tier,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    success: false,
                    error,
                }),
            )
                .into_response()
        }
    };

    let read = cache.read().await;
    let aggregates = NetworkAggregates::from_nodes(&read.snapshot.nodes);

    let mut data: Vec<ScoredNode> = read
        .snapshot
        .nodes
        .iter()
        .map(|node| ScoredNode {
            health: score_node(node, &aggregates),
            node: node.clone(),
        })
        .filter(|s| tier.map_or(true, |t| s.health.tier == t))
        .filter(|s| query.min_score.map_or(true, |min| s.health.total >= min))
        .collect();

    data.sort_by(|a, b| {
        b.health
            .total
            .cmp(&a.health.total)
            .then_with(|| a.node.identity.cmp(&b.node.identity))
    });
    if let Some(limit) = query.limit {
        data.truncate(limit);
    }

    Json(ListResponse {
        success: true,
        cached: read.cached,
        count: data.len(),
        data,
    })
    .into_response()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkSummary {
    success: bool,
    cached: bool,
    captured_at: DateTime<Utc>,
    total_nodes: usize,
    reachable_nodes: usize,
    total_storage_committed_bytes: u64,
    most_common_version: Option<String>,
    versions: Vec<String>,
    max_credits: f64,
    seeds: CycleStats,
}

async fn network_summary(State(cache): State<Arc<DiscoveryCache>>) -> Json<NetworkSummary> {
    let read = cache.read().await;
    let nodes = &read.snapshot.nodes;
    let aggregates = NetworkAggregates::from_nodes(nodes);

    Json(NetworkSummary {
        success: true,
        cached: read.cached,
        captured_at: read.snapshot.captured_at,
        total_nodes: nodes.len(),
        reachable_nodes: nodes.iter().filter(|n| n.is_reachable()).count(),
        total_storage_committed_bytes: nodes
            .iter()
            .filter_map(|n| n.storage_committed_bytes)
            .fold(0u64, u64::saturating_add),
        most_common_version: aggregates.most_common_version,
        versions: aggregates.sorted_versions,
        max_credits: aggregates.max_credits,
        seeds: read.snapshot.stats,
    })
}
