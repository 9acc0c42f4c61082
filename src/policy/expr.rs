//! Logical expression evaluator.
//!
//! Recursive descent over a small tagged-sum AST. Evaluation is strict
//! and pure: no I/O, no short-circuit is *required* (though `and`/`or`
//! may short-circuit internally since the spec only constrains the
//! observed result, not evaluation order).

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::claims::Claims;

/// A value that can be resolved to a string/number at evaluation time.
///
/// Variant order matters: untagged deserialization tries each variant in
/// declaration order and keeps the first that parses, so `Literal(Json)`
/// — which would accept any object shape — must come last or it would
/// swallow every other variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvableValue {
    Attribute { attribute: AttributeRef },
    Field { field: String },
    StrCast { str_cast: Box<ResolvableValue> },
    NumCast { num_cast: Box<ResolvableValue> },
    BoolCast { bool_cast: Box<ResolvableValue> },
    TimeCast { time_cast: Box<ResolvableValue> },
    DateTimeCast { date_time_cast: Box<ResolvableValue> },
    HexCast { hex_cast: Box<ResolvableValue> },
    Literal(Json),
}

/// `$attribute` reference: either a claim name or the global `UTCNOW`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeRef {
    Global(GlobalAttribute),
    Claim(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GlobalAttribute {
    #[serde(rename = "UTCNOW")]
    UtcNow,
}

/// An object whose fields `$field` can read. `$field` resolution is
/// optional per the spec; unimplemented lookups resolve to empty string
/// rather than failing.
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<String>;
}

/// Default object with no fields — every `$field` read resolves empty.
pub struct NoFields;
impl FieldSource for NoFields {
    fn field(&self, _name: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum LogicalExpression {
    Bool { value: bool },
    Gt { left: ResolvableValue, right: ResolvableValue },
    Ge { left: ResolvableValue, right: ResolvableValue },
    Lt { left: ResolvableValue, right: ResolvableValue },
    Le { left: ResolvableValue, right: ResolvableValue },
    Eq { left: ResolvableValue, right: ResolvableValue },
    Ne { left: ResolvableValue, right: ResolvableValue },
    Regex { value: ResolvableValue, pattern: ResolvableValue },
    Contains { value: ResolvableValue, needle: ResolvableValue },
    StartsWith { value: ResolvableValue, prefix: ResolvableValue },
    EndsWith { value: ResolvableValue, suffix: ResolvableValue },
    And { operands: Vec<LogicalExpression> },
    Or { operands: Vec<LogicalExpression> },
    Not { operand: Box<LogicalExpression> },
    Match { operands: Vec<LogicalExpression> },
}

/// Resolves a `ResolvableValue` to its stringified canonical form.
pub fn resolve(value: &ResolvableValue, claims: &Claims, fields: &dyn FieldSource) -> String {
    match value {
        ResolvableValue::Literal(json) => literal_to_string(json),
        ResolvableValue::Attribute { attribute } => match attribute {
            AttributeRef::Global(GlobalAttribute::UtcNow) => Utc::now().to_rfc3339(),
            AttributeRef::Claim(name) => claims.get_string(name).unwrap_or_default(),
        },
        ResolvableValue::Field { field } => fields.field(field).unwrap_or_default(),
        ResolvableValue::StrCast { str_cast } => resolve(str_cast, claims, fields),
        ResolvableValue::NumCast { num_cast } => {
            let raw = resolve(num_cast, claims, fields);
            parse_number(&raw).map(|n| n.to_string()).unwrap_or_default()
        }
        ResolvableValue::BoolCast { bool_cast } => {
            let raw = resolve(bool_cast, claims, fields);
            (raw.eq_ignore_ascii_case("true") || raw == "1").to_string()
        }
        ResolvableValue::TimeCast { time_cast } | ResolvableValue::DateTimeCast { date_time_cast: time_cast } => {
            resolve(time_cast, claims, fields)
        }
        ResolvableValue::HexCast { hex_cast } => {
            let raw = resolve(hex_cast, claims, fields);
            parse_number(&raw)
                .map(|n| format!("{:x}", n as i64))
                .unwrap_or(raw)
        }
    }
}

fn literal_to_string(json: &Json) -> String {
    match json {
        Json::String(s) => s.clone(),
        Json::Number(n) => n.to_string(),
        Json::Bool(b) => b.to_string(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

/// Tolerant numeric parser: accepts machine ints, floats, and numeric
/// strings. Returns `None` if the value cannot be parsed as a number —
/// numeric comparisons then return `false` rather than erroring.
fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

impl LogicalExpression {
    pub fn evaluate(&self, claims: &Claims, fields: &dyn FieldSource) -> bool {
        match self {
            LogicalExpression::Bool { value } => *value,
            LogicalExpression::Gt { left, right } => numeric_cmp(left, right, claims, fields, |a, b| a > b),
            LogicalExpression::Ge { left, right } => numeric_cmp(left, right, claims, fields, |a, b| a >= b),
            LogicalExpression::Lt { left, right } => numeric_cmp(left, right, claims, fields, |a, b| a < b),
            LogicalExpression::Le { left, right } => numeric_cmp(left, right, claims, fields, |a, b| a <= b),
            LogicalExpression::Eq { left, right } => {
                resolve(left, claims, fields) == resolve(right, claims, fields)
            }
            LogicalExpression::Ne { left, right } => {
                resolve(left, claims, fields) != resolve(right, claims, fields)
            }
            LogicalExpression::Regex { value, pattern } => {
                let haystack = resolve(value, claims, fields);
                let pattern = resolve(pattern, claims, fields);
                Regex::new(&pattern)
                    .map(|re| re.is_match(&haystack))
                    .unwrap_or(false)
            }
            LogicalExpression::Contains { value, needle } => {
                resolve(value, claims, fields).contains(&resolve(needle, claims, fields))
            }
            LogicalExpression::StartsWith { value, prefix } => {
                resolve(value, claims, fields).starts_with(&resolve(prefix, claims, fields))
            }
            LogicalExpression::EndsWith { value, suffix } => {
                resolve(value, claims, fields).ends_with(&resolve(suffix, claims, fields))
            }
            LogicalExpression::And { operands } => operands.iter().all(|op| op.evaluate(claims, fields)),
            LogicalExpression::Or { operands } => operands.iter().any(|op| op.evaluate(claims, fields)),
            LogicalExpression::Not { operand } => !operand.evaluate(claims, fields),
            LogicalExpression::Match { operands } => operands.iter().all(|op| op.evaluate(claims, fields)),
        }
    }
}

fn numeric_cmp(
    left: &ResolvableValue,
    right: &ResolvableValue,
    claims: &Claims,
    fields: &dyn FieldSource,
    op: impl Fn(f64, f64) -> bool,
) -> bool {
    let (Some(a), Some(b)) = (
        parse_number(&resolve(left, claims, fields)),
        parse_number(&resolve(right, claims, fields)),
    ) else {
        return false;
    };
    op(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lit(v: Json) -> ResolvableValue {
        ResolvableValue::Literal(v)
    }

    fn claim(name: &str) -> ResolvableValue {
        ResolvableValue::Attribute {
            attribute: AttributeRef::Claim(name.to_string()),
        }
    }

    fn claims_with(value: Json) -> Claims {
        Claims::from_map(value.as_object().unwrap().clone())
    }

    #[test]
    fn numeric_comparison_coerces_strings() {
        let expr = LogicalExpression::Gt {
            left: claim("age"),
            right: lit(json!(18)),
        };
        assert!(expr.evaluate(&claims_with(json!({"age": "21"})), &NoFields));
        assert!(!expr.evaluate(&claims_with(json!({"age": "16"})), &NoFields));
    }

    #[test]
    fn unparseable_numeric_comparison_is_false_not_error() {
        let expr = LogicalExpression::Gt {
            left: claim("age"),
            right: lit(json!(18)),
        };
        assert!(!expr.evaluate(&claims_with(json!({"age": "not-a-number"})), &NoFields));
    }

    #[test]
    fn equality_compares_stringified_canonical_forms() {
        let expr = LogicalExpression::Eq {
            left: claim("tenant"),
            right: lit(json!("acme")),
        };
        assert!(expr.evaluate(&claims_with(json!({"tenant": "acme"})), &NoFields));
    }

    #[test]
    fn invalid_regex_returns_false() {
        let expr = LogicalExpression::Regex {
            value: lit(json!("hello")),
            pattern: lit(json!("(unterminated")),
        };
        assert!(!expr.evaluate(&Claims::empty(), &NoFields));
    }

    #[test]
    fn and_or_not_compose() {
        let t = LogicalExpression::Bool { value: true };
        let f = LogicalExpression::Bool { value: false };
        assert!(!LogicalExpression::And {
            operands: vec![t.clone(), f.clone()]
        }
        .evaluate(&Claims::empty(), &NoFields));
        assert!(LogicalExpression::Or {
            operands: vec![t.clone(), f.clone()]
        }
        .evaluate(&Claims::empty(), &NoFields));
        assert!(LogicalExpression::Not {
            operand: Box::new(f.clone())
        }
        .evaluate(&Claims::empty(), &NoFields));
    }

    #[test]
    fn match_is_and_over_operands() {
        let t = LogicalExpression::Bool { value: true };
        let f = LogicalExpression::Bool { value: false };
        assert!(LogicalExpression::Match {
            operands: vec![t.clone(), t.clone()]
        }
        .evaluate(&Claims::empty(), &NoFields));
        assert!(!LogicalExpression::Match {
            operands: vec![t, f]
        }
        .evaluate(&Claims::empty(), &NoFields));
    }

    #[test]
    fn unknown_field_resolves_to_empty_string() {
        let expr = LogicalExpression::Eq {
            left: ResolvableValue::Field {
                field: "missing".to_string(),
            },
            right: lit(json!("")),
        };
        assert!(expr.evaluate(&Claims::empty(), &NoFields));
    }

    #[test]
    fn utcnow_global_attribute_resolves() {
        let value = resolve(
            &ResolvableValue::Attribute {
                attribute: AttributeRef::Global(GlobalAttribute::UtcNow),
            },
            &Claims::empty(),
            &NoFields,
        );
        assert!(chrono::DateTime::parse_from_rfc3339(&value).is_ok());
    }
}
