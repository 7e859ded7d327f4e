//! Mesh discovery: seed fan-out, merge, credit enrichment and the
//! time-bounded snapshot cache in front of them.
//!
//! A cycle queries every seed concurrently alongside the credit table and
//! finishes once each seed has answered or run out of time.  Nothing in a
//! cycle can fail: unreachable seeds contribute no pods and a missing credit
//! table zeroes every node's credits.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock};
use tokio::time::{timeout, Instant};

use crate::credits::apply_credits;
use crate::merge::merge_seed_results;
use crate::sources::{CreditSource, CreditTable, SeedSource};
use crate::types::{CycleStats, DiscoverySnapshot, NodeRecord, PodStats};

pub struct MeshDiscovery {
    seeds: Vec<String>,
    seed_source: Arc<dyn SeedSource>,
    /// `None` when no credit table is configured; enrichment is skipped.
    credit_source: Option<Arc<dyn CreditSource>>,
    seed_timeout: Duration,
    credits_timeout: Duration,
}

impl MeshDiscovery {
    pub fn new(
        seeds: Vec<String>,
        seed_source: Arc<dyn SeedSource>,
        credit_source: Option<Arc<dyn CreditSource>>,
        seed_timeout: Duration,
        credits_timeout: Duration,
    ) -> Self {
        Self {
            seeds,
            seed_source,
            credit_source,
            seed_timeout,
            credits_timeout,
        }
    }

    /// One bounded query.  Late, failed or malformed answers are `None`.
    async fn query_seed(&self, seed: &str) -> Option<Vec<PodStats>> {
        match timeout(self.seed_timeout, self.seed_source.fetch_pods(seed)).await {
            Ok(Ok(pods)) => {
                debug!("Seed {} reported {} pods", seed, pods.len());
                Some(pods)
            }
            Ok(Err(e)) => {
                warn!("Seed {} unavailable: {}", seed, e);
                None
            }
            Err(_) => {
                warn!("Seed {} did not answer within {:?}", seed, self.seed_timeout);
                None
            }
        }
    }

    async fn fetch_credits(&self) -> Option<CreditTable> {
        let Some(source) = &self.credit_source else {
            debug!("No credit source configured, skipping enrichment");
            return None;
        };
        match timeout(self.credits_timeout, source.fetch_credits()).await {
            Ok(Ok(table)) => {
                debug!("Credit table has {} entries", table.len());
                Some(table)
            }
            Ok(Err(e)) => {
                warn!("Credit source unavailable, defaulting credits to 0: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "Credit source did not answer within {:?}, defaulting credits to 0",
                    self.credits_timeout
                );
                None
            }
        }
    }

    /// Run one full discovery cycle and build a fresh snapshot.
    pub async fn run_cycle(&self) -> DiscoverySnapshot {
        let started = Instant::now();

        let fan_out = join_all(self.seeds.iter().map(|seed| self.query_seed(seed)));
        let (per_seed, credits) = tokio::join!(fan_out, self.fetch_credits());

        let seeds_responded = per_seed.iter().filter(|r| r.is_some()).count();
        // Seed order is merge precedence; failed seeds simply drop out.
        let mut merged =
            merge_seed_results(per_seed.iter().flatten().map(Vec::as_slice));
        apply_credits(&mut merged, credits.as_ref());

        let mut nodes: Vec<NodeRecord> = merged.into_values().collect();
        sort_nodes(&mut nodes);

        let stats = CycleStats {
            seeds_queried: self.seeds.len(),
            seeds_responded,
            credits_applied: credits.is_some(),
        };
        info!(
            "Discovery cycle: {}/{} seeds responded, {} nodes, credits {}, took {:?}",
            stats.seeds_responded,
            stats.seeds_queried,
            nodes.len(),
            if stats.credits_applied { "applied" } else { "skipped" },
            started.elapsed()
        );

        DiscoverySnapshot {
            nodes,
            captured_at: Utc::now(),
            stats,
        }
    }
}

/// Reachable nodes first, then by identity.
pub fn sort_nodes(nodes: &mut [NodeRecord]) {
    nodes.sort_by(|a, b| {
        b.is_reachable()
            .cmp(&a.is_reachable())
            .then_with(|| a.identity.cmp(&b.identity))
    });
}

struct CachedSnapshot {
    snapshot: Arc<DiscoverySnapshot>,
    refreshed_at: Instant,
}

/// What a cache read hands back.
#[derive(Debug, Clone)]
pub struct CacheRead {
    pub snapshot: Arc<DiscoverySnapshot>,
    /// True when served without running a cycle.
    pub cached: bool,
}

/// Owns the current snapshot.  Readers share it through an `Arc`; only a
/// discovery cycle replaces it, and always as a whole.
pub struct DiscoveryCache {
    discovery: MeshDiscovery,
    ttl: Duration,
    current: RwLock<Option<CachedSnapshot>>,
    // Single-flight: at most one cycle runs at a time.
    refresh_lock: Mutex<()>,
}

impl DiscoveryCache {
    pub fn new(discovery: MeshDiscovery, ttl: Duration) -> Self {
        Self {
            discovery,
            ttl,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn fresh(&self) -> Option<Arc<DiscoverySnapshot>> {
        let current = self.current.read().await;
        current
            .as_ref()
            .filter(|c| c.refreshed_at.elapsed() < self.ttl)
            .map(|c| Arc::clone(&c.snapshot))
    }

    /// Current snapshot, running a cycle first if it is missing or older
    /// than the TTL.
    pub async fn read(&self) -> CacheRead {
        if let Some(snapshot) = self.fresh().await {
            return CacheRead {
                snapshot,
                cached: true,
            };
        }

        let _guard = self.refresh_lock.lock().await;
        // Someone else may have refreshed while we waited.
        if let Some(snapshot) = self.fresh().await {
            return CacheRead {
                snapshot,
                cached: true,
            };
        }

        CacheRead {
            snapshot: self.run_and_store().await,
            cached: false,
        }
    }

    /// Fill the cache at startup.  Goes through [`read`](Self::read), so a
    /// request that already populated the cache is not followed by a
    /// second cycle.
    pub async fn prewarm(&self) -> Arc<DiscoverySnapshot> {
        self.read().await.snapshot
    }

    /// Whatever is stored, fresh or not, without doing any work.
    pub async fn peek(&self) -> Option<Arc<DiscoverySnapshot>> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|c| Arc::clone(&c.snapshot))
    }

    // Caller must hold `refresh_lock`.
    async fn run_and_store(&self) -> Arc<DiscoverySnapshot> {
        let snapshot = Arc::new(self.discovery.run_cycle().await);
        *self.current.write().await = Some(CachedSnapshot {
            snapshot: Arc::clone(&snapshot),
            refreshed_at: Instant::now(),
        });
        snapshot
    }
}
