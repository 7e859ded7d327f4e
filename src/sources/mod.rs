use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::PodStats;

pub mod http;
pub use http::{HttpCreditClient, HttpSeedClient};

#[cfg(test)]
pub mod fake;

/// Credits keyed by pod identity.
pub type CreditTable = HashMap<String, f64>;

/// Why an upstream produced nothing usable.  Never leaves the discovery
/// layer: every variant degrades to an empty contribution.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        FetchError::Malformed(msg.into())
    }
}

#[async_trait]
pub trait SeedSource: Send + Sync {
    /// Ask one seed for every pod it knows, with stats.
    async fn fetch_pods(&self, seed: &str) -> Result<Vec<PodStats>, FetchError>;
}

#[async_trait]
pub trait CreditSource: Send + Sync {
    async fn fetch_credits(&self) -> Result<CreditTable, FetchError>;
}

