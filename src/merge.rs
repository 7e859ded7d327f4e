//! Folding per-seed pod lists into canonical node records.
//!
//! Seeds disagree.  Endpoints are stable facts, so the first seed (in
//! configured order) to report one keeps it.  Metrics go stale, so the last
//! processed non-empty, non-zero observation replaces whatever came before.
//! The split is spelled out once in [`FIELD_POLICIES`] and applied
//! mechanically by [`merge_pod`].

use std::collections::BTreeMap;

use crate::types::{NodeRecord, PodStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// Keep the existing value; adopt the incoming one only if unset.
    FirstWriteWins,
    /// Overwrite when the incoming value is present and non-zero/non-empty.
    LastTruthyWins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    GossipAddress,
    RpcAddress,
    Version,
    StorageCommittedBytes,
    StorageUsedBytes,
    StorageUsagePercent,
    UptimeSeconds,
}

pub const FIELD_POLICIES: &[(Field, Precedence)] = &[
    (Field::GossipAddress, Precedence::FirstWriteWins),
    (Field::RpcAddress, Precedence::FirstWriteWins),
    (Field::Version, Precedence::LastTruthyWins),
    (Field::StorageCommittedBytes, Precedence::LastTruthyWins),
    (Field::StorageUsedBytes, Precedence::LastTruthyWins),
    (Field::StorageUsagePercent, Precedence::LastTruthyWins),
    (Field::UptimeSeconds, Precedence::LastTruthyWins),
];

trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for u64 {
    fn is_truthy(&self) -> bool {
        *self != 0
    }
}

impl Truthy for f64 {
    fn is_truthy(&self) -> bool {
        *self != 0.0
    }
}

fn apply<T: Truthy>(slot: &mut Option<T>, incoming: Option<T>, precedence: Precedence) {
    match precedence {
        Precedence::FirstWriteWins => {
            if slot.is_none() {
                *slot = incoming;
            }
        }
        Precedence::LastTruthyWins => {
            if let Some(value) = incoming.filter(|v| v.is_truthy()) {
                *slot = Some(value);
            }
        }
    }
}

/// Normalised incoming values, one per mergeable field.
struct Incoming {
    gossip_address: Option<String>,
    rpc_address: Option<String>,
    version: Option<String>,
    storage_committed_bytes: Option<u64>,
    storage_used_bytes: Option<u64>,
    storage_usage_percent: Option<f64>,
    uptime_seconds: Option<u64>,
}

impl From<&PodStats> for Incoming {
    fn from(pod: &PodStats) -> Self {
        Self {
            gossip_address: pod.address.clone(),
            rpc_address: pod.resolved_rpc_address(),
            version: pod.version.clone(),
            storage_committed_bytes: pod.storage_committed.map(|v| v as u64),
            storage_used_bytes: pod.storage_used.map(|v| v as u64),
            storage_usage_percent: pod.storage_usage_percent,
            uptime_seconds: pod.uptime.map(|v| v as u64),
        }
    }
}

/// Merge one partial observation into `record` following [`FIELD_POLICIES`].
pub fn merge_pod(record: &mut NodeRecord, pod: &PodStats) {
    let mut incoming = Incoming::from(pod);
    for (field, precedence) in FIELD_POLICIES {
        let p = *precedence;
        match field {
            Field::GossipAddress => {
                apply(&mut record.gossip_address, incoming.gossip_address.take(), p)
            }
            Field::RpcAddress => apply(&mut record.rpc_address, incoming.rpc_address.take(), p),
            Field::Version => apply(&mut record.version, incoming.version.take(), p),
            Field::StorageCommittedBytes => apply(
                &mut record.storage_committed_bytes,
                incoming.storage_committed_bytes.take(),
                p,
            ),
            Field::StorageUsedBytes => apply(
                &mut record.storage_used_bytes,
                incoming.storage_used_bytes.take(),
                p,
            ),
            Field::StorageUsagePercent => apply(
                &mut record.storage_usage_percent,
                incoming.storage_usage_percent.take(),
                p,
            ),
            Field::UptimeSeconds => {
                apply(&mut record.uptime_seconds, incoming.uptime_seconds.take(), p)
            }
        }
    }
}

/// Flatten seed results in the given order and fold them into one map keyed
/// by identity.  Pods without a pubkey are dropped.
pub fn merge_seed_results<'a, I>(seed_results: I) -> BTreeMap<String, NodeRecord>
where
    I: IntoIterator<Item = &'a [PodStats]>,
{
    let mut nodes = BTreeMap::new();
    for pod in seed_results.into_iter().flatten() {
        merge_into(&mut nodes, pod);
    }
    nodes
}

pub fn merge_into(nodes: &mut BTreeMap<String, NodeRecord>, pod: &PodStats) {
    let Some(identity) = pod.pubkey.as_deref() else {
        return;
    };
    let record = nodes
        .entry(identity.to_string())
        .or_insert_with(|| NodeRecord::new(identity));
    merge_pod(record, pod);
}
