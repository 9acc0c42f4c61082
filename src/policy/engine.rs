//! The policy engine: turns an `AccessModel` plus a request's method,
//! path and claims into an authorization verdict and, when the matching
//! rule carries one, a `QueryFilter` for the caller to apply at the
//! storage layer.

use crate::claims::Claims;
use crate::policy::expr::NoFields;
use crate::policy::filter::QueryFilter;
use crate::policy::glob::glob_match;
use crate::policy::model::{Access, AccessModel, AttributeItem, GlobalAttribute, ObjectItem, Right, Rule};

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Allow { filter: Option<QueryFilter> },
    Deny { reason: &'static str },
}

pub struct PolicyEngine<'a> {
    model: &'a AccessModel,
}

impl<'a> PolicyEngine<'a> {
    pub fn new(model: &'a AccessModel) -> Self {
        Self { model }
    }

    /// Evaluates rules in document order; the first rule whose RIGHTS
    /// cover the required right and whose object, attribute and formula
    /// predicates all match decides the verdict. A RIGHTS mismatch skips
    /// the rule rather than denying outright, for both `ALLOW` and
    /// `DISABLED` rules — later rules still get a chance to match. A
    /// document with no matching rule denies by default.
    pub fn authorize(&self, method: &str, path: &str, claims: &Claims) -> Verdict {
        let required = Right::for_method(method);

        for rule in &self.model.rules {
            if !rule.acl.grants(required) {
                continue;
            }
            if !objects_match(&rule.objects, path) {
                continue;
            }
            if !attributes_match(&rule.attributes, claims) {
                continue;
            }
            if let Some(formula) = &rule.formula {
                if !formula.evaluate(claims, &NoFields) {
                    continue;
                }
            }

            return self.decide(rule, claims);
        }

        Verdict::Deny {
            reason: "no rule matched this request",
        }
    }

    fn decide(&self, rule: &Rule, claims: &Claims) -> Verdict {
        match rule.acl.access {
            Access::Disabled => Verdict::Deny {
                reason: "matching rule disables access",
            },
            Access::Allow => {
                let filter = rule.filter.as_ref().and_then(|f| {
                    let gated = match &f.condition {
                        Some(cond) => cond
                            .formula
                            .as_ref()
                            .map(|formula| formula.evaluate(claims, &NoFields))
                            .unwrap_or(true),
                        None => true,
                    };
                    gated.then(|| QueryFilter::build(&f.fragment, claims))
                });
                Verdict::Allow { filter }
            }
        }
    }
}

/// A rule with no `OBJECTS` predicates matches every path — the absence
/// of an object list is not a restriction, only explicit routes are.
fn objects_match(objects: &[ObjectItem], path: &str) -> bool {
    if objects.is_empty() {
        return true;
    }
    objects.iter().any(|item| match &item.route {
        Some(pattern) => pattern == "*" || glob_match(pattern, path),
        None => false,
    })
}

/// A rule with no `ATTRIBUTES` predicates matches unconditionally. When
/// present, any single item matching is sufficient (disjunction).
fn attributes_match(attributes: &[AttributeItem], claims: &Claims) -> bool {
    if attributes.is_empty() {
        return true;
    }
    attributes.iter().any(|item| match item {
        AttributeItem::Global(GlobalAttribute::Anonymous) => true,
        AttributeItem::Global(GlobalAttribute::Authenticated) => claims.is_present(),
        AttributeItem::Claim(claim) => claims.has_nonempty(claim),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model_from(json: serde_json::Value) -> AccessModel {
        crate::policy::model::AccessModel::load(serde_json::to_vec(&json).unwrap().as_slice(), None).unwrap()
    }

    fn claims_with(json: serde_json::Value) -> Claims {
        Claims::from_map(json.as_object().unwrap().clone())
    }

    #[test]
    fn no_matching_rule_denies() {
        let model = model_from(json!({"RULES": []}));
        let verdict = PolicyEngine::new(&model).authorize("GET", "/lookup/shells", &Claims::empty());
        assert!(matches!(verdict, Verdict::Deny { .. }));
    }

    #[test]
    fn matching_route_and_right_allows() {
        let model = model_from(json!({
            "RULES": [{
                "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                "OBJECTS": [{"ROUTE": "/lookup/*"}]
            }]
        }));
        let verdict = PolicyEngine::new(&model).authorize("GET", "/lookup/shells", &Claims::empty());
        assert_eq!(verdict, Verdict::Allow { filter: None });
    }

    #[test]
    fn wrong_right_denies_even_with_route_match() {
        let model = model_from(json!({
            "RULES": [{
                "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                "OBJECTS": [{"ROUTE": "/lookup/*"}]
            }]
        }));
        let verdict = PolicyEngine::new(&model).authorize("POST", "/lookup/shells", &Claims::empty());
        assert!(matches!(verdict, Verdict::Deny { .. }));
    }

    #[test]
    fn disabled_acl_denies() {
        let model = model_from(json!({
            "RULES": [{
                "ACL": {"ACCESS": "DISABLED", "RIGHTS": ["READ"]},
                "OBJECTS": [{"ROUTE": "/lookup/*"}]
            }]
        }));
        let verdict = PolicyEngine::new(&model).authorize("GET", "/lookup/shells", &Claims::empty());
        assert!(matches!(verdict, Verdict::Deny { .. }));
    }

    #[test]
    fn rights_mismatch_falls_through_to_a_later_rule() {
        let model = model_from(json!({
            "RULES": [
                {"ACL": {"ACCESS": "ALLOW", "RIGHTS": ["DELETE"]}, "OBJECTS": [{"ROUTE": "*"}]},
                {"ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]}, "OBJECTS": [{"ROUTE": "*"}]}
            ]
        }));
        let verdict = PolicyEngine::new(&model).authorize("GET", "/x", &Claims::empty());
        assert_eq!(verdict, Verdict::Allow { filter: None });
    }

    #[test]
    fn disabled_rule_with_non_matching_rights_is_skipped_not_terminal() {
        let model = model_from(json!({
            "RULES": [
                {"ACL": {"ACCESS": "DISABLED", "RIGHTS": ["DELETE"]}, "OBJECTS": [{"ROUTE": "*"}]},
                {"ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]}, "OBJECTS": [{"ROUTE": "*"}]}
            ]
        }));
        let verdict = PolicyEngine::new(&model).authorize("GET", "/x", &Claims::empty());
        assert_eq!(verdict, Verdict::Allow { filter: None });
    }

    #[test]
    fn attribute_disjunction_any_item_matches() {
        let model = model_from(json!({
            "RULES": [{
                "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                "ATTRIBUTES": [{"CLAIM": "tenant"}, {"GLOBAL": "ANONYMOUS"}]
            }]
        }));
        let verdict = PolicyEngine::new(&model).authorize("GET", "/x", &Claims::empty());
        assert_eq!(verdict, Verdict::Allow { filter: None });
    }

    #[test]
    fn formula_gates_the_rule() {
        let model = model_from(json!({
            "RULES": [{
                "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                "FORMULA": {"op": "eq", "left": {"attribute": "tenant"}, "right": "acme"}
            }]
        }));
        let engine = PolicyEngine::new(&model);
        assert_eq!(
            engine.authorize("GET", "/x", &claims_with(json!({"tenant": "acme"}))),
            Verdict::Allow { filter: None }
        );
        assert!(matches!(
            engine.authorize("GET", "/x", &claims_with(json!({"tenant": "other"}))),
            Verdict::Deny { .. }
        ));
    }

    #[test]
    fn condition_gates_filter_production() {
        let model = model_from(json!({
            "RULES": [{
                "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                "FILTER": {
                    "FRAGMENT": "tenant = :tenant",
                    "CONDITION": {"FORMULA": {"op": "bool", "value": false}}
                }
            }]
        }));
        let verdict = PolicyEngine::new(&model).authorize("GET", "/x", &Claims::empty());
        assert_eq!(verdict, Verdict::Allow { filter: None });
    }

    #[test]
    fn unconditional_filter_is_produced() {
        let model = model_from(json!({
            "RULES": [{
                "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                "FILTER": {"FRAGMENT": "tenant = :tenant"}
            }]
        }));
        let verdict = PolicyEngine::new(&model).authorize(
            "GET",
            "/x",
            &claims_with(json!({"tenant": "acme"})),
        );
        match verdict {
            Verdict::Allow { filter: Some(f) } => assert_eq!(f.fragment, "tenant = :tenant"),
            other => panic!("expected filter, got {other:?}"),
        }
    }

    #[test]
    fn bare_star_route_matches_any_path_regardless_of_segments() {
        let model = model_from(json!({
            "RULES": [{
                "ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]},
                "OBJECTS": [{"ROUTE": "*"}]
            }]
        }));
        let verdict = PolicyEngine::new(&model).authorize("GET", "/a/b/c/d", &Claims::empty());
        assert_eq!(verdict, Verdict::Allow { filter: None });
    }

    #[test]
    fn first_matching_rule_wins() {
        let model = model_from(json!({
            "RULES": [
                {"ACL": {"ACCESS": "DISABLED", "RIGHTS": ["READ"]}, "OBJECTS": [{"ROUTE": "/x"}]},
                {"ACL": {"ACCESS": "ALLOW", "RIGHTS": ["READ"]}, "OBJECTS": [{"ROUTE": "/x"}]}
            ]
        }));
        let verdict = PolicyEngine::new(&model).authorize("GET", "/x", &Claims::empty());
        assert!(matches!(verdict, Verdict::Deny { .. }));
    }
}
