//! Scope composer: per-key row restrictions driven by the caller's scope values and actor.

use crate::config::ScopeRuleConfig;
use crate::query::predicate::Predicate;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// `(scope value for the key, actor) -> restriction`. `None` means unrestricted.
pub type ScopeFn = Arc<dyn Fn(Option<&Value>, Option<&Value>) -> Option<Predicate> + Send + Sync>;

/// Ordered set of scope functions, keyed by scope field name.
#[derive(Clone, Default)]
pub struct ScopeFilters {
    filters: Vec<(String, ScopeFn)>,
}

impl fmt::Debug for ScopeFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeFilters")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ScopeFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope functions for config-declared rules: `column = scope[key]`.
    pub fn from_rules(rules: &[ScopeRuleConfig]) -> Self {
        let mut filters = Self::new();
        for rule in rules {
            filters.insert(rule.key.clone(), column_equals(rule.column.clone(), rule.required));
        }
        filters
    }

    /// Register `f` for `key`, replacing any earlier function for the same key.
    pub fn insert(&mut self, key: impl Into<String>, f: ScopeFn) {
        let key = key.into();
        match self.filters.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = f,
            None => self.filters.push((key, f)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Append the restriction of every registered function, in registration order.
    pub fn apply(&self, predicates: &mut Vec<Predicate>, scope: Option<&Map<String, Value>>, actor: Option<&Value>) {
        for (key, f) in &self.filters {
            let value = scope.and_then(|s| s.get(key));
            if let Some(p) = f(value, actor) {
                predicates.push(p);
            }
        }
    }
}

/// Restrict `column` to the caller's scope value. A missing (or null) value
/// denies every row when `required`, otherwise leaves rows unrestricted.
pub fn column_equals(column: String, required: bool) -> ScopeFn {
    Arc::new(move |value: Option<&Value>, _actor: Option<&Value>| match value {
        Some(v) if !v.is_null() => Some(Predicate::eq(column.clone(), v.clone())),
        _ if required => Some(Predicate::deny_all()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn applies_value_for_configured_key() {
        let filters = ScopeFilters::from_rules(&[ScopeRuleConfig {
            key: "tenantId".into(),
            column: "tenant_id".into(),
            required: false,
        }]);
        let mut preds = Vec::new();
        filters.apply(&mut preds, Some(&scope(json!({ "tenantId": "A", "other": 1 }))), None);
        assert_eq!(preds, vec![Predicate::eq("tenant_id", json!("A"))]);
    }

    #[test]
    fn missing_value_is_unrestricted_unless_required() {
        let optional = ScopeFilters::from_rules(&[ScopeRuleConfig {
            key: "tenantId".into(),
            column: "tenant_id".into(),
            required: false,
        }]);
        let mut preds = Vec::new();
        optional.apply(&mut preds, None, None);
        assert!(preds.is_empty());

        let required = ScopeFilters::from_rules(&[ScopeRuleConfig {
            key: "tenantId".into(),
            column: "tenant_id".into(),
            required: true,
        }]);
        required.apply(&mut preds, Some(&Map::new()), None);
        assert_eq!(preds, vec![Predicate::deny_all()]);
    }

    #[test]
    fn functions_see_the_actor() {
        let mut filters = ScopeFilters::new();
        filters.insert(
            "owner",
            Arc::new(|_value: Option<&Value>, actor: Option<&Value>| {
                let actor = actor?;
                if actor["role"] == "admin" {
                    return None;
                }
                Some(Predicate::eq("owner_id", actor["id"].clone()))
            }),
        );
        let mut preds = Vec::new();
        filters.apply(&mut preds, None, Some(&json!({ "id": 7, "role": "user" })));
        filters.apply(&mut preds, None, Some(&json!({ "id": 1, "role": "admin" })));
        assert_eq!(preds, vec![Predicate::eq("owner_id", json!(7))]);
    }

    #[test]
    fn insert_replaces_same_key_in_place() {
        let mut filters = ScopeFilters::new();
        filters.insert("a", column_equals("a".into(), false));
        filters.insert("b", column_equals("b".into(), false));
        filters.insert("a", column_equals("a2".into(), false));
        assert_eq!(filters.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        let mut preds = Vec::new();
        filters.apply(&mut preds, Some(&scope(json!({ "a": 1 }))), None);
        assert_eq!(preds, vec![Predicate::eq("a2", json!(1))]);
    }
}
