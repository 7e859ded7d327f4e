use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::sources::http::seed_rpc_url;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Seed hosts, `host` or `host:port`.  Order is merge precedence.
    pub seeds: Vec<String>,
    pub seed_rpc_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_url: Option<String>,
    pub cache_ttl_ms: u64,
    pub seed_timeout_ms: u64,
    pub credits_timeout_ms: u64,
    pub http_bind: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            seed_rpc_port: 6000,
            credits_url: None,
            cache_ttl_ms: 30_000,
            seed_timeout_ms: 10_000,
            credits_timeout_ms: 5_000,
            http_bind: SocketAddr::from(([0, 0, 0, 0], 3001)),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("meshwatch.toml"))
                .merge(Json::file("meshwatch.json"))
                .merge(Env::prefixed("MESHWATCH_")),
        )
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let mut config: Config = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        if config.seed_timeout_ms == 0 || config.credits_timeout_ms == 0 {
            anyhow::bail!("seed_timeout_ms and credits_timeout_ms must be non-zero");
        }

        // Duplicates would only repeat a query; keep the first occurrence so
        // precedence is unchanged.
        let mut seen = std::collections::HashSet::new();
        config.seeds = config
            .seeds
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();

        if config.seeds.is_empty() {
            warn!("No seeds configured; every discovery cycle will be empty");
        }

        config.credits_url = config
            .credits_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn seed_timeout(&self) -> Duration {
        Duration::from_millis(self.seed_timeout_ms)
    }

    pub fn credits_timeout(&self) -> Duration {
        Duration::from_millis(self.credits_timeout_ms)
    }

    pub fn seed_rpc_url(&self, seed: &str) -> String {
        seed_rpc_url(seed, self.seed_rpc_port)
    }
}
