//! The Access Model: an immutable, materialized representation of the
//! declarative policy document.
//!
//! Loading is a two-phase process: optional JSON-Schema structural
//! validation (all violations aggregated), then deserialization into the
//! raw document shape, then materialization — resolving `USEACL` /
//! `USEATTRIBUTES` / `USEOBJECTS` / `USEFORMULA` references against the
//! `DEF*` tables into self-contained rules. After materialization the
//! model holds no references back into the original document.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::policy::expr::LogicalExpression;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Access {
    Allow,
    Disabled,
}

/// `ACCESS` is matched case-insensitively: `"allow"`, `"Allow"` and
/// `"ALLOW"` all deserialize to `Access::Allow`.
impl<'de> Deserialize<'de> for Access {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_uppercase().as_str() {
            "ALLOW" => Ok(Access::Allow),
            "DISABLED" => Ok(Access::Disabled),
            other => Err(DeError::custom(format!("unknown ACCESS value: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Right {
    Read,
    Create,
    Update,
    Delete,
    All,
}

/// `RIGHTS` entries are matched case-insensitively, per the spec's
/// requirement that the RIGHTS-vs-required-right comparison (including
/// the `ALL` literal) tolerate any case.
impl<'de> Deserialize<'de> for Right {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_uppercase().as_str() {
            "READ" => Ok(Right::Read),
            "CREATE" => Ok(Right::Create),
            "UPDATE" => Ok(Right::Update),
            "DELETE" => Ok(Right::Delete),
            "ALL" => Ok(Right::All),
            other => Err(DeError::custom(format!("unknown RIGHTS value: {other}"))),
        }
    }
}

impl Right {
    /// Maps an HTTP method to the right it requires, per the spec's
    /// `GET/HEAD->READ, POST->CREATE, PUT/PATCH->UPDATE, DELETE->DELETE,
    /// anything else->READ` table.
    pub fn for_method(method: &str) -> Right {
        match method.to_ascii_uppercase().as_str() {
            "POST" => Right::Create,
            "PUT" | "PATCH" => Right::Update,
            "DELETE" => Right::Delete,
            _ => Right::Read,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acl {
    #[serde(rename = "ACCESS")]
    pub access: Access,
    #[serde(rename = "RIGHTS", default)]
    pub rights: Vec<Right>,
}

impl Acl {
    /// A rule's rights satisfy `required` when they contain it or the
    /// literal `ALL`. Case-insensitivity is handled at deserialization
    /// time by `Right`'s custom `Deserialize` impl, so the comparison
    /// here only ever sees normalized variants.
    pub fn grants(&self, required: Right) -> bool {
        self.rights.iter().any(|r| *r == required || *r == Right::All)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObjectItem {
    #[serde(rename = "ROUTE")]
    pub route: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttributeItem {
    Global(GlobalAttribute),
    /// `{"CLAIM": k}` — `k` is the claim name directly, not a nested object.
    Claim(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum GlobalAttribute {
    Anonymous,
    Authenticated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCondition {
    #[serde(rename = "FORMULA")]
    pub formula: Option<LogicalExpression>,
    #[serde(rename = "USEFORMULA")]
    pub use_formula: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    #[serde(rename = "FRAGMENT")]
    pub fragment: String,
    #[serde(rename = "CONDITION")]
    pub condition: Option<FilterCondition>,
}

/// A rule after `USE*` references have been resolved against the `DEF*`
/// tables. Holds no back-reference to the source document.
#[derive(Debug, Clone)]
pub struct Rule {
    pub acl: Acl,
    pub objects: Vec<ObjectItem>,
    pub attributes: Vec<AttributeItem>,
    pub formula: Option<LogicalExpression>,
    pub filter: Option<Filter>,
}

/// Raw, on-the-wire shape of one rule entry, before materialization.
#[derive(Debug, Clone, Deserialize)]
struct RawRule {
    #[serde(rename = "ACL")]
    acl: Option<Acl>,
    #[serde(rename = "USEACL")]
    use_acl: Option<String>,
    #[serde(rename = "OBJECTS", default)]
    objects: Vec<ObjectItem>,
    #[serde(rename = "USEOBJECTS", default)]
    use_objects: Vec<String>,
    #[serde(rename = "ATTRIBUTES", default)]
    attributes: Vec<AttributeItem>,
    #[serde(rename = "USEATTRIBUTES", default)]
    use_attributes: Vec<String>,
    #[serde(rename = "FORMULA")]
    formula: Option<LogicalExpression>,
    #[serde(rename = "USEFORMULA")]
    use_formula: Option<String>,
    #[serde(rename = "FILTER")]
    filter: Option<Filter>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDocument {
    #[serde(rename = "RULES", default)]
    rules: Vec<RawRule>,
    #[serde(rename = "DEFACLS", default)]
    defacls: HashMap<String, Acl>,
    #[serde(rename = "DEFATTRIBUTES", default)]
    defattributes: HashMap<String, Vec<AttributeItem>>,
    #[serde(rename = "DEFOBJECTS", default)]
    defobjects: HashMap<String, Vec<ObjectItem>>,
    #[serde(rename = "DEFFORMULAS", default)]
    defformulas: HashMap<String, LogicalExpression>,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyLoadError {
    #[error("policy document failed schema validation: {0:?}")]
    Schema(Vec<String>),
    #[error("policy document is not well-formed: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct AccessModel {
    pub rules: Vec<Rule>,
}

impl AccessModel {
    /// Loads and materializes a model from a JSON byte buffer. If
    /// `schema` is provided, structural validation runs first and
    /// aggregates every violation before any semantic materialization is
    /// attempted.
    pub fn load(bytes: &[u8], schema: Option<&[u8]>) -> Result<Self, PolicyLoadError> {
        let document: serde_json::Value = serde_json::from_slice(bytes)?;

        if let Some(schema_bytes) = schema {
            let schema_doc: serde_json::Value =
                serde_json::from_slice(schema_bytes).map_err(PolicyLoadError::Parse)?;
            let validator = jsonschema::validator_for(&schema_doc).map_err(|e| {
                PolicyLoadError::Schema(vec![format!("invalid schema document: {e}")])
            })?;
            let errors: Vec<String> = validator
                .iter_errors(&document)
                .map(|e| e.to_string())
                .collect();
            if !errors.is_empty() {
                return Err(PolicyLoadError::Schema(errors));
            }
        }

        let raw: RawDocument = serde_json::from_value(document)?;
        Ok(Self::materialize(raw))
    }

    /// Resolves every rule's `USE*` references against the `DEF*` tables.
    /// Missing references are non-fatal and contribute nothing — the
    /// model is permissive in composition; strictness happens later, at
    /// evaluation.
    fn materialize(raw: RawDocument) -> Self {
        let rules = raw
            .rules
            .into_iter()
            .map(|r| materialize_rule(r, &raw.defacls, &raw.defattributes, &raw.defobjects, &raw.defformulas))
            .collect();
        AccessModel { rules }
    }
}

fn materialize_rule(
    raw: RawRule,
    defacls: &HashMap<String, Acl>,
    defattributes: &HashMap<String, Vec<AttributeItem>>,
    defobjects: &HashMap<String, Vec<ObjectItem>>,
    defformulas: &HashMap<String, LogicalExpression>,
) -> Rule {
    let acl = raw
        .acl
        .or_else(|| raw.use_acl.as_ref().and_then(|name| defacls.get(name).cloned()))
        .unwrap_or(Acl {
            access: Access::Disabled,
            rights: Vec::new(),
        });

    let mut attributes = raw.attributes;
    for name in &raw.use_attributes {
        if let Some(items) = defattributes.get(name) {
            attributes.extend(items.clone());
        }
    }

    let mut objects = raw.objects;
    for name in &raw.use_objects {
        if let Some(items) = resolve_object_group(name, defobjects) {
            objects.extend(items);
        }
    }

    let formula = raw
        .formula
        .or_else(|| raw.use_formula.as_ref().and_then(|name| defformulas.get(name).cloned()));

    let filter = raw.filter.map(|f| Filter {
        fragment: f.fragment,
        condition: f.condition.map(|c| FilterCondition {
            formula: c.formula.or_else(|| {
                c.use_formula
                    .as_ref()
                    .and_then(|name| defformulas.get(name).cloned())
            }),
            use_formula: None,
        }),
    });

    Rule {
        acl,
        objects,
        attributes,
        formula,
        filter,
    }
}

/// Object groups may indirect one further level: a `DEFOBJECTS` entry's
/// items are not themselves expanded again.
fn resolve_object_group(name: &str, defobjects: &HashMap<String, Vec<ObjectItem>>) -> Option<Vec<ObjectItem>> {
    defobjects.get(name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn access_and_rights_parse_case_insensitively() {
        let doc = json!({
            "RULES": [{
                "ACL": {"ACCESS": "allow", "RIGHTS": ["read", "Delete"]}
            }]
        });
        let model = AccessModel::load(serde_json::to_vec(&doc).unwrap().as_slice(), None).unwrap();
        assert_eq!(model.rules[0].acl.access, Access::Allow);
        assert!(model.rules[0].acl.grants(Right::Read));
        assert!(model.rules[0].acl.grants(Right::Delete));
        assert!(!model.rules[0].acl.grants(Right::Update));
    }

    #[test]
    fn missing_use_references_are_non_fatal() {
        let doc = json!({
            "RULES": [{
                "USEACL": "does-not-exist",
                "USEOBJECTS": ["also-missing"],
                "USEATTRIBUTES": ["nope"],
                "USEFORMULA": "none"
            }]
        });
        let model = AccessModel::load(serde_json::to_vec(&doc).unwrap().as_slice(), None).unwrap();
        assert_eq!(model.rules.len(), 1);
        assert_eq!(model.rules[0].acl.access, Access::Disabled);
        assert!(model.rules[0].objects.is_empty());
        assert!(model.rules[0].attributes.is_empty());
        assert!(model.rules[0].formula.is_none());
    }

    #[test]
    fn useacl_resolves_into_inline_acl() {
        let doc = json!({
            "DEFACLS": {"reader": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]}},
            "RULES": [{"USEACL": "reader"}]
        });
        let model = AccessModel::load(serde_json::to_vec(&doc).unwrap().as_slice(), None).unwrap();
        assert_eq!(model.rules[0].acl.access, Access::Allow);
        assert!(model.rules[0].acl.grants(Right::Read));
    }

    #[test]
    fn useattributes_appended_after_inline_attributes() {
        let doc = json!({
            "DEFATTRIBUTES": {"tenant-present": [{"CLAIM": "tenant"}]},
            "RULES": [{
                "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                "ATTRIBUTES": [{"GLOBAL": "AUTHENTICATED"}],
                "USEATTRIBUTES": ["tenant-present"]
            }]
        });
        let model = AccessModel::load(serde_json::to_vec(&doc).unwrap().as_slice(), None).unwrap();
        assert_eq!(model.rules[0].attributes.len(), 2);
    }

    #[test]
    fn bad_document_yields_parse_error() {
        let result = AccessModel::load(b"{not json", None);
        assert!(matches!(result, Err(PolicyLoadError::Parse(_))));
    }

    #[test]
    fn schema_violations_are_aggregated() {
        let schema = json!({
            "type": "object",
            "required": ["RULES"],
            "properties": {"RULES": {"type": "array"}}
        });
        let doc = json!({"notRULES": []});
        let result = AccessModel::load(
            serde_json::to_vec(&doc).unwrap().as_slice(),
            Some(serde_json::to_vec(&schema).unwrap().as_slice()),
        );
        match result {
            Err(PolicyLoadError::Schema(errors)) => assert!(!errors.is_empty()),
            other => panic!("expected schema error, got {other:?}"),
        }
    }
}
