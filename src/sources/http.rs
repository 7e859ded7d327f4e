//! HTTP-backed upstreams: the seed JSON-RPC endpoint and the credit table.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

use super::{CreditSource, CreditTable, FetchError, SeedSource};
use crate::credits::parse_credit_table;
use crate::types::PodStats;

const RPC_METHOD: &str = "get-pods-with-stats";

/// Queries seeds with `POST http://{seed}/rpc`.
#[derive(Clone)]
pub struct HttpSeedClient {
    http: Client,
    default_port: u16,
    timeout: Duration,
}

impl HttpSeedClient {
    pub fn new(default_port: u16, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            default_port,
            timeout,
        })
    }

    pub fn rpc_url(&self, seed: &str) -> String {
        seed_rpc_url(seed, self.default_port)
    }
}

/// `host` gets the default port appended; `host:port` and full URLs are kept.
pub fn seed_rpc_url(seed: &str, default_port: u16) -> String {
    let seed = seed.trim().trim_end_matches('/');
    if seed.starts_with("http://") || seed.starts_with("https://") {
        return format!("{}/rpc", seed);
    }
    let has_port = match seed.rsplit_once(':') {
        Some((host, port)) => port.parse::<u16>().is_ok() && (!host.contains(':') || host.ends_with(']')),
        None => false,
    };
    if has_port {
        format!("http://{}/rpc", seed)
    } else {
        format!("http://{}:{}/rpc", seed, default_port)
    }
}

fn map_transport(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Transport(err)
    }
}

/// Pull `result.pods` out of a JSON-RPC response.  Pods that fail to decode
/// are skipped rather than failing the whole seed.
pub fn parse_pods_response(body: Value) -> Result<Vec<PodStats>, FetchError> {
    if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
        return Err(FetchError::malformed(format!("rpc error: {}", err)));
    }
    let pods = body
        .get("result")
        .and_then(|r| r.get("pods"))
        .ok_or_else(|| FetchError::malformed("missing result.pods"))?;
    let Value::Array(items) = pods else {
        return Err(FetchError::malformed("result.pods is not an array"));
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<PodStats>(item.clone()) {
            Ok(pod) => out.push(pod),
            Err(e) => debug!("Skipping undecodable pod entry: {}", e),
        }
    }
    Ok(out)
}

#[async_trait]
impl SeedSource for HttpSeedClient {
    async fn fetch_pods(&self, seed: &str) -> Result<Vec<PodStats>, FetchError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": RPC_METHOD,
            "params": [],
        });

        let response = self
            .http
            .post(self.rpc_url(seed))
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| match map_transport(e, self.timeout) {
                FetchError::Transport(e) if e.is_decode() => FetchError::malformed(e.to_string()),
                other => other,
            })?;
        parse_pods_response(body)
    }
}

/// Fetches the credit table with `GET {url}`.
#[derive(Clone)]
pub struct HttpCreditClient {
    http: Client,
    url: String,
    timeout: Duration,
}

impl HttpCreditClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl CreditSource for HttpCreditClient {
    async fn fetch_credits(&self) -> Result<CreditTable, FetchError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| map_transport(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| match map_transport(e, self.timeout) {
                FetchError::Transport(e) if e.is_decode() => FetchError::malformed(e.to_string()),
                other => other,
            })?;
        parse_credit_table(body)
    }
}
