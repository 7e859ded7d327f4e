//! Health scoring.
//!
//! A node's composite score blends four sub-scores, each on 0-100:
//!
//! | component | weight | curve |
//! |-----------|--------|-------|
//! | version   | 0.15   | distance behind the majority version |
//! | uptime    | 0.35   | logistic in days, centred at half a day |
//! | storage   | 0.30   | logarithmic in committed TiB, capped near 3 TiB |
//! | credits   | 0.20   | linear against the snapshot maximum |
//!
//! Credits and version scores are relative to one snapshot, so scores are
//! only comparable within the snapshot they were computed against.
//! Everything here is pure; [`NetworkAggregates`] is computed once per
//! snapshot by the caller.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::{HealthScore, NodeRecord, ScoreBreakdown, Tier};

const VERSION_WEIGHT: f64 = 0.15;
const UPTIME_WEIGHT: f64 = 0.35;
const STORAGE_WEIGHT: f64 = 0.30;
const CREDITS_WEIGHT: f64 = 0.20;

const SECS_PER_DAY: f64 = 86_400.0;
const BYTES_PER_TIB: f64 = (1u64 << 40) as f64;
const UNREACHABLE_UPTIME_FACTOR: f64 = 0.8;

/// Penalty per release behind the majority.
const MAJORITY_LAG_STEP: f64 = 30.0;
/// Penalty per rank when no majority is known.
const RANK_STEP: f64 = 20.0;

/// Snapshot-wide inputs to [`score`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkAggregates {
    pub max_credits: f64,
    /// Distinct version tokens, newest first.
    pub sorted_versions: Vec<String>,
    pub most_common_version: Option<String>,
}

impl NetworkAggregates {
    pub fn from_nodes(nodes: &[NodeRecord]) -> Self {
        let max_credits = nodes
            .iter()
            .map(|n| n.credits)
            .filter(|c| c.is_finite())
            .fold(0.0_f64, f64::max);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in nodes.iter().filter_map(|n| n.version.as_deref().and_then(version_token)) {
            *counts.entry(token).or_default() += 1;
        }

        let most_common_version = counts
            .iter()
            .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| compare_versions(va, vb)))
            .map(|(v, _)| v.to_string());

        let mut sorted_versions: Vec<String> = counts.keys().map(|v| v.to_string()).collect();
        sorted_versions.sort_by(|a, b| compare_versions(b, a));

        Self {
            max_credits,
            sorted_versions,
            most_common_version,
        }
    }
}

/// First whitespace-delimited token of a reported version string, without
/// a leading `v`.  `v0.8.0` and `0.8.0` are the same release.
pub fn version_token(raw: &str) -> Option<&str> {
    raw.split_whitespace()
        .next()
        .map(|token| token.trim_start_matches(['v', 'V']))
        .filter(|token| !token.is_empty())
}

fn numeric_components(version: &str) -> Vec<u64> {
    version
        .trim_start_matches(['v', 'V'])
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u64>().unwrap_or(0)
        })
        .collect()
}

/// Component-wise numeric comparison; missing components count as 0.
pub fn compare_numeric(a: &str, b: &str) -> Ordering {
    let (a, b) = (numeric_components(a), numeric_components(b));
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Total order over version tokens: numeric first, text as tie-break.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    compare_numeric(a, b).then_with(|| a.cmp(b))
}

fn clamp(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

pub fn version_score(
    raw_version: Option<&str>,
    sorted_versions: &[String],
    most_common_version: Option<&str>,
) -> f64 {
    let Some(current) = raw_version.and_then(version_token) else {
        return 0.0;
    };
    let index_of = |v: &str| {
        sorted_versions
            .iter()
            .position(|s| version_token(s) == Some(v))
    };

    let score = match most_common_version.and_then(version_token) {
        Some(majority) => {
            if compare_numeric(current, majority) != Ordering::Less {
                100.0
            } else {
                match (index_of(current), index_of(majority)) {
                    (Some(cur), Some(maj)) => {
                        let lag = cur.saturating_sub(maj) as f64;
                        100.0 - MAJORITY_LAG_STEP * lag
                    }
                    _ => 0.0,
                }
            }
        }
        None => match index_of(current) {
            Some(0) => 100.0,
            Some(rank) => 100.0 - RANK_STEP * rank as f64,
            None => 0.0,
        },
    };
    clamp(score)
}

pub fn uptime_score(uptime_seconds: Option<u64>, reachable: bool) -> f64 {
    let days = uptime_seconds.unwrap_or(0) as f64 / SECS_PER_DAY;
    let score = 100.0 / (1.0 + (-2.0 * (days - 0.5)).exp());
    let score = if reachable {
        score
    } else {
        score * UNREACHABLE_UPTIME_FACTOR
    };
    clamp(score)
}

pub fn storage_score(committed_bytes: Option<u64>) -> f64 {
    let tib = committed_bytes.unwrap_or(0) as f64 / BYTES_PER_TIB;
    clamp((25.0 * (15.0 * tib + 1.0).log2()).min(100.0))
}

pub fn credits_score(credits: f64, max_network_credits: f64) -> f64 {
    let score = if max_network_credits > 0.0 {
        (credits / max_network_credits * 100.0).min(100.0)
    } else if credits > 0.0 {
        100.0
    } else {
        0.0
    };
    clamp(score)
}

fn round_score(score: f64) -> u8 {
    clamp(score).round() as u8
}

/// Composite health of one node against snapshot-wide aggregates.
pub fn score(
    node: &NodeRecord,
    max_network_credits: f64,
    sorted_versions: &[String],
    most_common_version: Option<&str>,
) -> HealthScore {
    let version = version_score(node.version.as_deref(), sorted_versions, most_common_version);
    let uptime = uptime_score(node.uptime_seconds, node.is_reachable());
    let storage = storage_score(node.storage_committed_bytes);
    let credits = credits_score(node.credits, max_network_credits);

    let weighted = VERSION_WEIGHT * version
        + UPTIME_WEIGHT * uptime
        + STORAGE_WEIGHT * storage
        + CREDITS_WEIGHT * credits;
    let total = round_score(weighted);

    HealthScore {
        total,
        tier: Tier::from_total(total),
        breakdown: ScoreBreakdown {
            version: round_score(version),
            uptime: round_score(uptime),
            storage: round_score(storage),
            credits: round_score(credits),
        },
    }
}

pub fn score_node(node: &NodeRecord, aggregates: &NetworkAggregates) -> HealthScore {
    score(
        node,
        aggregates.max_credits,
        &aggregates.sorted_versions,
        aggregates.most_common_version.as_deref(),
    )
}
