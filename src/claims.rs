//! Verified token claims.
//!
//! Claims are a dynamically-typed, case-sensitive string-keyed bag
//! produced by the token verifier. They are read-only from here down.
//! Numeric claims are kept as `serde_json::Number` (the crate is built
//! with `arbitrary_precision`) so large integers and decimals survive
//! round-tripping without lossy `f64` coercion.

use serde_json::{Map, Value};

/// Verified claims from a bearer credential, or an empty set for
/// anonymous/unauthenticated requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn empty() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn is_present(&self) -> bool {
        !self.0.is_empty()
    }

    /// Raw claim lookup by name (case-sensitive).
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Stringified form of a claim value, used by attribute matching and
    /// placeholder substitution. `null` and missing both yield `None`.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).and_then(value_to_string)
    }

    /// True when `claims[name]` is present and its stringified form is
    /// non-empty (the ATTRIBUTES `{CLAIM: k}` predicate from the spec).
    pub fn has_nonempty(&self, name: &str) -> bool {
        self.get_string(name).map(|s| !s.is_empty()).unwrap_or(false)
    }

    /// Space-delimited `scope` claim, split into a set of scope names.
    pub fn scopes(&self) -> Vec<String> {
        self.get_string("scope")
            .map(|s| s.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().iter().any(|s| s == scope)
    }

    /// Union of `realm_access.roles` and `resource_access.<clientId>.roles`
    /// for every client id in `audiences`, per the two conventional shapes
    /// the spec recognizes.
    pub fn roles(&self, audiences: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(roles) = self
            .get("realm_access")
            .and_then(Value::as_object)
            .and_then(|m| m.get("roles"))
            .and_then(Value::as_array)
        {
            out.extend(roles.iter().filter_map(|v| v.as_str().map(str::to_owned)));
        }
        if let Some(resource_access) = self.get("resource_access").and_then(Value::as_object) {
            for client_id in audiences {
                if let Some(roles) = resource_access
                    .get(client_id)
                    .and_then(Value::as_object)
                    .and_then(|m| m.get("roles"))
                    .and_then(Value::as_array)
                {
                    out.extend(roles.iter().filter_map(|v| v.as_str().map(str::to_owned)));
                }
            }
        }
        out
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        // Stringified "canonical form" of composite values, used by
        // equality comparisons in the logical expression evaluator.
        other => Some(other.to_string()),
    }
}
