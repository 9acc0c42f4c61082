//! `QueryFilter`: a storage-neutral predicate fragment produced by the
//! policy engine and consumed by the search engine.
//!
//! Placeholders in the fragment are named `:identifier` and are resolved
//! against claims (or the `:UTCNOW` pseudo-claim) at authorize time, then
//! bound as parameters by the storage layer — never concatenated into SQL.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::claims::Claims;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// A bound value for a placeholder. `None` means the claim the
/// placeholder referred to was absent; the storage layer decides what a
/// nil bound value means for its clause.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    Text(String),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    pub fragment: String,
    pub bindings: BTreeMap<String, BoundValue>,
}

impl QueryFilter {
    /// Parses `fragment` once, discovering `:name` placeholders, and
    /// resolves each against `claims` (or `UTCNOW`, formatted RFC 3339 UTC).
    pub fn build(fragment: &str, claims: &Claims) -> Self {
        let mut bindings = BTreeMap::new();
        for capture in PLACEHOLDER.captures_iter(fragment) {
            let name = capture[1].to_string();
            let value = if name == "UTCNOW" {
                BoundValue::Text(Utc::now().to_rfc3339())
            } else {
                match claims.get_string(&name) {
                    Some(v) => BoundValue::Text(v),
                    None => BoundValue::Null,
                }
            };
            bindings.insert(name, value);
        }
        Self {
            fragment: fragment.to_string(),
            bindings,
        }
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims_with_tenant(tenant: &str) -> Claims {
        Claims::from_map(json!({"tenant": tenant}).as_object().unwrap().clone())
    }

    #[test]
    fn resolves_claim_placeholders() {
        let filter = QueryFilter::build("tenant = :tenant", &claims_with_tenant("acme"));
        assert_eq!(
            filter.bindings.get("tenant"),
            Some(&BoundValue::Text("acme".to_string()))
        );
    }

    #[test]
    fn missing_claim_binds_to_null() {
        let filter = QueryFilter::build("x = :missing", &Claims::empty());
        assert_eq!(filter.bindings.get("missing"), Some(&BoundValue::Null));
    }

    #[test]
    fn utcnow_is_rfc3339() {
        let filter = QueryFilter::build("t < :UTCNOW", &Claims::empty());
        match filter.bindings.get("UTCNOW") {
            Some(BoundValue::Text(s)) => assert!(chrono::DateTime::parse_from_rfc3339(s).is_ok()),
            other => panic!("expected UTCNOW binding, got {other:?}"),
        }
    }

    #[test]
    fn idempotent_rebuild_yields_identical_filter() {
        let claims = claims_with_tenant("acme");
        let a = QueryFilter::build("tenant = :tenant", &claims);
        let b = QueryFilter::build("tenant = :tenant", &claims);
        assert_eq!(a, b);
    }
}
