//! Credit table parsing and enrichment.
//!
//! The credit service has shipped two shapes over time, a bare array and an
//! object wrapping `credits`, and two spellings for each entry's keys.  All
//! of them are accepted.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::sources::{CreditTable, FetchError};
use crate::types::{number_from_value, NodeRecord};

const ID_KEYS: &[&str] = &["pod_id", "pubkey"];
const SCORE_KEYS: &[&str] = &["credits", "total_credits"];

pub fn parse_credit_table(body: Value) -> Result<CreditTable, FetchError> {
    let entries = match body {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("credits") {
            Some(Value::Array(entries)) => entries,
            _ => return Err(FetchError::malformed("expected `credits` array")),
        },
        _ => return Err(FetchError::malformed("expected array or object")),
    };

    let mut table = CreditTable::with_capacity(entries.len());
    for entry in &entries {
        let id = ID_KEYS
            .iter()
            .find_map(|k| entry.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let score = SCORE_KEYS
            .iter()
            .find_map(|k| entry.get(*k).and_then(number_from_value));
        if let (Some(id), Some(score)) = (id, score) {
            table.insert(id.to_string(), score);
        }
    }
    Ok(table)
}

/// Attach credits to every node; unknown identities and a missing table both
/// mean 0.
pub fn apply_credits(nodes: &mut BTreeMap<String, NodeRecord>, table: Option<&CreditTable>) {
    for (identity, node) in nodes.iter_mut() {
        node.credits = table
            .and_then(|t| t.get(identity))
            .copied()
            .unwrap_or(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_array() {
        let table = parse_credit_table(json!([
            {"pod_id": "a", "credits": 10},
            {"pubkey": "b", "total_credits": 2.5},
        ]))
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["a"], 10.0);
        assert_eq!(table["b"], 2.5);
    }

    #[test]
    fn parses_wrapped_object() {
        let table = parse_credit_table(json!({
            "credits": [{"pod_id": "a", "credits": "7"}]
        }))
        .unwrap();
        assert_eq!(table["a"], 7.0);
    }

    #[test]
    fn skips_entries_without_id_or_score() {
        let table = parse_credit_table(json!([
            {"pod_id": "a"},
            {"credits": 3},
            {"pod_id": "", "credits": 3},
            {"pod_id": "c", "credits": -1},
            {"pod_id": "d", "credits": 4},
        ]))
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table["d"], 4.0);
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(parse_credit_table(json!({"data": []})).is_err());
        assert!(parse_credit_table(json!({"credits": 5})).is_err());
        assert!(parse_credit_table(json!("nope")).is_err());
    }

    #[test]
    fn duplicate_identity_keeps_last_entry() {
        let table = parse_credit_table(json!([
            {"pod_id": "a", "credits": 1},
            {"pubkey": "a", "credits": 9},
        ]))
        .unwrap();
        assert_eq!(table["a"], 9.0);
    }

    #[test]
    fn apply_defaults_missing_identities_to_zero() {
        let mut nodes = BTreeMap::new();
        nodes.insert("a".to_string(), NodeRecord::new("a"));
        nodes.insert("b".to_string(), NodeRecord::new("b"));
        let table: CreditTable = [("a".to_string(), 42.0)].into_iter().collect();

        apply_credits(&mut nodes, Some(&table));
        assert_eq!(nodes["a"].credits, 42.0);
        assert_eq!(nodes["b"].credits, 0.0);
    }

    #[test]
    fn apply_without_table_zeroes_everything() {
        let mut nodes = BTreeMap::new();
        let mut a = NodeRecord::new("a");
        a.credits = 5.0;
        nodes.insert("a".to_string(), a);

        apply_credits(&mut nodes, None);
        assert_eq!(nodes["a"].credits, 0.0);
    }
}
