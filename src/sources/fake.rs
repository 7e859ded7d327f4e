//! In-memory upstreams for exercising discovery without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{CreditSource, CreditTable, FetchError, SeedSource};
use crate::types::PodStats;

#[derive(Clone)]
pub enum SeedReply {
    Pods(Vec<PodStats>),
    Fail,
    /// Never answers.
    Hang,
    Delayed(Duration, Vec<PodStats>),
}

#[derive(Clone, Default)]
pub struct FakeSeeds {
    replies: HashMap<String, SeedReply>,
    calls: Arc<AtomicUsize>,
}

impl FakeSeeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, seed: &str, reply: SeedReply) -> Self {
        self.replies.insert(seed.to_string(), reply);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SeedSource for FakeSeeds {
    async fn fetch_pods(&self, seed: &str) -> Result<Vec<PodStats>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(seed).cloned() {
            Some(SeedReply::Pods(pods)) => Ok(pods),
            Some(SeedReply::Delayed(delay, pods)) => {
                tokio::time::sleep(delay).await;
                Ok(pods)
            }
            Some(SeedReply::Hang) => std::future::pending().await,
            Some(SeedReply::Fail) | None => Err(FetchError::malformed("fake seed failure")),
        }
    }
}

#[derive(Clone)]
pub struct FakeCredits {
    table: Option<CreditTable>,
    calls: Arc<AtomicUsize>,
}

impl FakeCredits {
    pub fn table(entries: &[(&str, f64)]) -> Self {
        Self {
            table: Some(entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            table: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CreditSource for FakeCredits {
    async fn fetch_credits(&self) -> Result<CreditTable, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table
            .clone()
            .ok_or_else(|| FetchError::malformed("fake credit failure"))
    }
}

pub fn pod(id: &str) -> PodStats {
    PodStats {
        pubkey: Some(id.to_string()),
        ..Default::default()
    }
}
