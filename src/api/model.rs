//! Wire shapes of the collection endpoints, decoded strictly at the boundary.
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::FetchError;

/// `GET /{resource}` answers either `{items, total}` or a bare array.
#[derive(Debug, Clone, PartialEq)]
pub enum ListResponse<E> {
    Paged { items: Vec<E>, total: Option<u64> },
    Bare(Vec<E>),
}

/// One page as seen by the view-model. `total` is `None` when the backend
/// did not report it (bare array responses).
#[derive(Debug, Clone, PartialEq)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub total: Option<u64>,
}

impl<E: DeserializeOwned> ListResponse<E> {
    pub fn decode(body: Value) -> Result<Self, FetchError> {
        match body {
            Value::Array(rows) => Ok(ListResponse::Bare(decode_rows(rows)?)),
            Value::Object(mut map) => {
                let rows = match map.remove("items") {
                    Some(Value::Array(rows)) => rows,
                    Some(other) => {
                        return Err(FetchError::Decode(format!(
                            "`items` must be an array, got {}",
                            json_kind(&other)
                        )))
                    }
                    None => {
                        return Err(FetchError::Decode(
                            "object response without an `items` array".into(),
                        ))
                    }
                };
                let total = match map.get("total") {
                    None | Some(Value::Null) => None,
                    Some(v) => Some(v.as_u64().ok_or_else(|| {
                        FetchError::Decode(format!("`total` must be a non-negative integer, got {}", v))
                    })?),
                };
                Ok(ListResponse::Paged {
                    items: decode_rows(rows)?,
                    total,
                })
            }
            other => Err(FetchError::Decode(format!(
                "expected an array or {{items, total}}, got {}",
                json_kind(&other)
            ))),
        }
    }
}

impl<E> ListResponse<E> {
    pub fn into_page(self) -> Page<E> {
        match self {
            ListResponse::Paged { items, total } => Page { items, total },
            ListResponse::Bare(items) => Page { items, total: None },
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            ListResponse::Paged { .. } => "paged",
            ListResponse::Bare(_) => "bare",
        }
    }
}

fn decode_rows<E: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<E>, FetchError> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            serde_json::from_value(row)
                .map_err(|err| FetchError::Decode(format!("item {}: {}", idx, err)))
        })
        .collect()
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Aggregate counters from `GET /{resource}/stats`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub total: Option<u64>,
    pub active: Option<u64>,
    pub inactive: Option<u64>,
    /// Every other numeric field, e.g. `totalRevenue`.
    pub extra: BTreeMap<String, f64>,
}

impl Stats {
    /// Accepts `total`/`active`/`inactive`, their `_count`/`Count` forms and
    /// camelCase `totalTenants`-style keys.
    pub fn decode(body: &Value) -> Result<Self, FetchError> {
        let Value::Object(map) = body else {
            return Err(FetchError::Decode(format!(
                "stats must be an object, got {}",
                json_kind(body)
            )));
        };

        let mut used: Vec<&str> = Vec::new();
        let mut pick = |prefix: &str| -> Option<u64> {
            let exact = [
                prefix.to_string(),
                format!("{}_count", prefix),
                format!("{}Count", prefix),
            ];
            let key = exact
                .iter()
                .find(|k| map.get(k.as_str()).and_then(Value::as_u64).is_some())
                .map(|k| k.as_str())
                .and_then(|k| map.get_key_value(k).map(|(k, _)| k.as_str()))
                .or_else(|| prefixed_key(map, prefix))?;
            used.push(key);
            map.get(key).and_then(Value::as_u64)
        };

        let total = pick("total");
        let inactive = pick("inactive");
        let active = pick("active");

        let extra = map
            .iter()
            .filter(|(k, _)| !used.contains(&k.as_str()))
            .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
            .collect();

        Ok(Self {
            total,
            active,
            inactive,
            extra,
        })
    }
}

const COUNTER_PREFIXES: [&str; 3] = ["total", "active", "inactive"];

/// Find the `totalTenants`-style key for `prefix`. With several candidates,
/// the one whose suffix also appears under another counter prefix wins
/// (`totalTenants` beside `activeTenants`, not `totalRevenue`). If that
/// still leaves no single key, none is picked.
fn prefixed_key<'a>(map: &'a Map<String, Value>, prefix: &str) -> Option<&'a str> {
    let candidates: Vec<&str> = map
        .iter()
        .filter(|(k, v)| is_prefixed_key(k, prefix) && v.as_u64().is_some())
        .map(|(k, _)| k.as_str())
        .collect();
    if candidates.len() <= 1 {
        return candidates.first().copied();
    }

    let paired: Vec<&str> = candidates
        .iter()
        .copied()
        .filter(|key| {
            let suffix = &key[prefix.len()..];
            COUNTER_PREFIXES
                .iter()
                .filter(|other| **other != prefix)
                .any(|other| map.contains_key(&format!("{}{}", other, suffix)))
        })
        .collect();
    if let [key] = paired.as_slice() {
        return Some(*key);
    }
    warn!(prefix, ?candidates, "ambiguous stats keys; counter left unset");
    None
}

// `totalTenants` or `total_tenants`, but not `totally`.
fn is_prefixed_key(key: &str, prefix: &str) -> bool {
    match key.strip_prefix(prefix) {
        Some(rest) => rest
            .chars()
            .next()
            .map(|c| c.is_ascii_uppercase() || c == '_')
            .unwrap_or(false),
        None => false,
    }
}

/// Side payload for `DELETE /{resource}/{id}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteOptions {
    #[serde(rename = "deleteAllData")]
    pub delete_all_data: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;
    use serde_json::json;

    #[test]
    fn decodes_paged_and_bare_shapes() {
        let paged: ListResponse<Record> =
            ListResponse::decode(json!({"items": [{"id": 1}, {"id": 2}], "total": 9})).unwrap();
        assert_eq!(paged.shape(), "paged");
        let page = paged.into_page();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, Some(9));

        let bare: ListResponse<Record> = ListResponse::decode(json!([{"id": "x"}])).unwrap();
        assert_eq!(bare.shape(), "bare");
        assert_eq!(bare.into_page().total, None);
    }

    #[test]
    fn rejects_unknown_shapes() {
        let err = ListResponse::<Record>::decode(json!({"data": []})).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
        let err = ListResponse::<Record>::decode(json!("nope")).unwrap_err();
        assert!(err.to_string().contains("a string"));
        let err = ListResponse::<Record>::decode(json!({"items": [], "total": -1})).unwrap_err();
        assert!(err.to_string().contains("total"));
    }

    #[test]
    fn bad_row_names_its_index() {
        let err = ListResponse::<Record>::decode(json!([{"id": 1}, {"name": "no id"}])).unwrap_err();
        assert!(err.to_string().contains("item 1"));
    }

    #[test]
    fn stats_accepts_naming_variants() {
        let s = Stats::decode(&json!({
            "totalTenants": 12,
            "activeTenants": 9,
            "inactive_count": 3,
            "totalRevenue": 1500.5
        }))
        .unwrap();
        assert_eq!(s.inactive, Some(3));
        assert_eq!(s.active, Some(9));
        // `totalRevenue` is fractional, so it cannot be the row count
        assert_eq!(s.total, Some(12));
        assert_eq!(s.extra.get("totalRevenue"), Some(&1500.5));
        assert!(!s.extra.contains_key("totalTenants"));

        let s = Stats::decode(&json!({"total": 4, "active": 1})).unwrap();
        assert_eq!((s.total, s.active, s.inactive), (Some(4), Some(1), None));
        assert!(Stats::decode(&json!([1, 2])).is_err());
    }

    #[test]
    fn stats_prefers_entity_counter_over_integer_aggregate() {
        let s = Stats::decode(&json!({
            "totalTenants": 12,
            "totalRevenue": 1500,
            "activeTenants": 9
        }))
        .unwrap();
        assert_eq!(s.total, Some(12));
        assert_eq!(s.active, Some(9));
        assert_eq!(s.extra.get("totalRevenue"), Some(&1500.0));
        assert!(!s.extra.contains_key("totalTenants"));
    }

    #[test]
    fn stats_leaves_ambiguous_total_unset() {
        let s = Stats::decode(&json!({"totalRevenue": 1500, "totalOrders": 30})).unwrap();
        assert_eq!(s.total, None);
        assert_eq!(s.extra.len(), 2);

        let s = Stats::decode(&json!({"total_orders": 30})).unwrap();
        assert_eq!(s.total, Some(30));
    }

    #[test]
    fn delete_options_wire_name() {
        let body = serde_json::to_value(DeleteOptions {
            delete_all_data: true,
        })
        .unwrap();
        assert_eq!(body, json!({"deleteAllData": true}));
    }
}
