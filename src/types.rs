//! Data structures shared across the monitor.
//!
//! [`PodStats`] is the partial, per-seed view of a pod exactly as a seed
//! reports it over JSON-RPC.  [`NodeRecord`] is the merged, canonical view
//! that the cache hands out.  [`HealthScore`] is derived on demand and never
//! stored.

use std::net::{IpAddr, SocketAddr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One pod entry from a seed's `get-pods-with-stats` result.
///
/// Every field is optional because seeds only know what they have gossiped
/// about.  Numeric fields accept numbers or numeric strings; negative or
/// non-finite values are treated as unknown.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PodStats {
    #[serde(default, deserialize_with = "non_empty_string")]
    pub pubkey: Option<String>,
    /// Gossip endpoint, `host:port`.
    #[serde(default, alias = "gossip_address", deserialize_with = "non_empty_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub rpc_address: Option<String>,
    #[serde(default, deserialize_with = "metric")]
    pub rpc_port: Option<f64>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "metric")]
    pub storage_committed: Option<f64>,
    #[serde(default, deserialize_with = "metric")]
    pub storage_used: Option<f64>,
    #[serde(default, deserialize_with = "metric")]
    pub storage_usage_percent: Option<f64>,
    #[serde(default, deserialize_with = "metric")]
    pub uptime: Option<f64>,
}

impl PodStats {
    /// RPC endpoint as reported, or synthesized from the gossip host and
    /// `rpc_port` when only the pair is known.
    pub fn resolved_rpc_address(&self) -> Option<String> {
        if let Some(rpc) = &self.rpc_address {
            return Some(rpc.clone());
        }
        let address = self.address.as_deref()?;
        let port = self.rpc_port.filter(|p| *p >= 1.0 && *p <= u16::MAX as f64)? as u16;
        Some(join_host_port(&host_of(address), port))
    }
}

/// Host part of a `host:port` string.  IPv6 hosts come back bracketed.
pub fn host_of(address: &str) -> String {
    if let Ok(sock) = address.parse::<SocketAddr>() {
        return match sock.ip() {
            IpAddr::V4(ip) => ip.to_string(),
            IpAddr::V6(ip) => format!("[{}]", ip),
        };
    }
    match address.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host.to_string(),
        _ => address.to_string(),
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Canonical, merged record for one pod identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub identity: String,
    pub gossip_address: Option<String>,
    /// Presence of this field is what "reachable" means.
    pub rpc_address: Option<String>,
    pub version: Option<String>,
    pub storage_committed_bytes: Option<u64>,
    pub storage_used_bytes: Option<u64>,
    pub storage_usage_percent: Option<f64>,
    pub uptime_seconds: Option<u64>,
    #[serde(default)]
    pub credits: f64,
}

impl NodeRecord {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Default::default()
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.rpc_address.is_some()
    }
}

/// Per-cycle bookkeeping, kept next to the nodes for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStats {
    pub seeds_queried: usize,
    pub seeds_responded: usize,
    pub credits_applied: bool,
}

/// One complete discovery result.  Immutable once built; the cache swaps
/// whole snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySnapshot {
    /// Sorted reachable-first, then by identity.
    pub nodes: Vec<NodeRecord>,
    pub captured_at: DateTime<Utc>,
    pub stats: CycleStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Healthy,
    Warning,
    Critical,
}

impl Tier {
    pub fn from_total(total: u8) -> Self {
        match total {
            t if t < 30 => Tier::Critical,
            t if t < 70 => Tier::Warning,
            _ => Tier::Healthy,
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HEALTHY" => Ok(Tier::Healthy),
            "WARNING" => Ok(Tier::Warning),
            "CRITICAL" => Ok(Tier::Critical),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub version: u8,
    pub uptime: u8,
    pub storage: u8,
    pub credits: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthScore {
    pub total: u8,
    pub tier: Tier,
    pub breakdown: ScoreBreakdown,
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    })
}

fn metric<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

/// Finite, non-negative number from a JSON number or numeric string.
pub fn number_from_value(value: &serde_json::Value) -> Option<f64> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (n.is_finite() && n >= 0.0).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pod_stats_accepts_numeric_strings_and_drops_bad_numbers() {
        let pod: PodStats = serde_json::from_value(json!({
            "pubkey": "abc",
            "address": "10.0.0.1:9001",
            "storage_committed": "1024",
            "storage_used": -5,
            "uptime": null,
            "version": "  ",
        }))
        .unwrap();

        assert_eq!(pod.pubkey.as_deref(), Some("abc"));
        assert_eq!(pod.storage_committed, Some(1024.0));
        assert_eq!(pod.storage_used, None);
        assert_eq!(pod.uptime, None);
        assert_eq!(pod.version, None);
    }

    #[test]
    fn rpc_address_is_synthesized_from_gossip_host() {
        let pod = PodStats {
            address: Some("10.0.0.1:9001".into()),
            rpc_port: Some(6000.0),
            ..Default::default()
        };
        assert_eq!(pod.resolved_rpc_address().as_deref(), Some("10.0.0.1:6000"));

        let v6 = PodStats {
            address: Some("[2001:db8::1]:9001".into()),
            rpc_port: Some(6000.0),
            ..Default::default()
        };
        assert_eq!(v6.resolved_rpc_address().as_deref(), Some("[2001:db8::1]:6000"));
    }

    #[test]
    fn explicit_rpc_address_beats_synthesis() {
        let pod = PodStats {
            address: Some("10.0.0.1:9001".into()),
            rpc_address: Some("10.0.0.9:7000".into()),
            rpc_port: Some(6000.0),
            ..Default::default()
        };
        assert_eq!(pod.resolved_rpc_address().as_deref(), Some("10.0.0.9:7000"));
    }

    #[test]
    fn rpc_address_synthesis_tolerates_zero_padded_ports() {
        let pod = PodStats {
            address: Some("10.0.0.1:09001".into()),
            rpc_port: Some(6000.0),
            ..Default::default()
        };
        assert_eq!(pod.resolved_rpc_address().as_deref(), Some("10.0.0.1:6000"));
        assert_eq!(host_of("10.0.0.1:09001"), "10.0.0.1");
        assert_eq!(host_of("[2001:db8::1]:09001"), "[2001:db8::1]");
    }

    #[test]
    fn no_rpc_address_without_port() {
        let pod = PodStats {
            address: Some("10.0.0.1:9001".into()),
            ..Default::default()
        };
        assert_eq!(pod.resolved_rpc_address(), None);
    }

    #[test]
    fn host_of_handles_bare_hosts() {
        assert_eq!(host_of("example.org:80"), "example.org");
        assert_eq!(host_of("example.org"), "example.org");
        assert_eq!(host_of("10.1.2.3"), "10.1.2.3");
    }

    #[test]
    fn tier_thresholds() {
        assert_eq!(Tier::from_total(0), Tier::Critical);
        assert_eq!(Tier::from_total(29), Tier::Critical);
        assert_eq!(Tier::from_total(30), Tier::Warning);
        assert_eq!(Tier::from_total(69), Tier::Warning);
        assert_eq!(Tier::from_total(70), Tier::Healthy);
        assert_eq!(Tier::from_total(100), Tier::Healthy);
    }

    #[test]
    fn node_record_serializes_camel_case() {
        let mut node = NodeRecord::new("id-1");
        node.rpc_address = Some("1.2.3.4:6000".into());
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["identity"], "id-1");
        assert_eq!(value["rpcAddress"], "1.2.3.4:6000");
        assert_eq!(value["credits"], 0.0);
    }
}
