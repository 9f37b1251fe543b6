//! Soft-delete composer: visibility predicate and the marker values written by delete/restore.

use crate::config::DeletedValueConfig;
use crate::query::predicate::Predicate;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct SoftDelete {
    pub field: String,
    pub deleted_value: DeletedValueConfig,
    pub not_deleted_value: Value,
}

impl SoftDelete {
    /// Field-only config with the default markers: current timestamp when deleted, null otherwise.
    pub fn timestamp(field: impl Into<String>) -> Self {
        SoftDelete {
            field: field.into(),
            deleted_value: DeletedValueConfig::Now,
            not_deleted_value: Value::Null,
        }
    }

    /// Value to write when deleting; `Now` is resolved at call time.
    pub fn deleted_marker(&self) -> Value {
        match &self.deleted_value {
            DeletedValueConfig::Now => Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            DeletedValueConfig::Literal(v) => v.clone(),
        }
    }

    /// Predicate matching rows that are not deleted.
    pub fn visible(&self) -> Predicate {
        if self.not_deleted_value.is_null() {
            Predicate::is_null(self.field.as_str())
        } else {
            Predicate::eq(self.field.as_str(), self.not_deleted_value.clone())
        }
    }
}

/// Append the not-deleted predicate unless the entity has no soft delete or deleted rows are requested.
pub fn apply_visibility(predicates: &mut Vec<Predicate>, soft_delete: Option<&SoftDelete>, include_deleted: bool) {
    if include_deleted {
        return;
    }
    if let Some(sd) = soft_delete {
        predicates.push(sd.visible());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_marker_uses_is_null() {
        let mut preds = Vec::new();
        apply_visibility(&mut preds, Some(&SoftDelete::timestamp("deleted_at")), false);
        assert_eq!(preds, vec![Predicate::is_null("deleted_at")]);
    }

    #[test]
    fn literal_marker_uses_equality() {
        let sd = SoftDelete {
            field: "is_deleted".into(),
            deleted_value: DeletedValueConfig::Literal(json!(true)),
            not_deleted_value: json!(false),
        };
        let mut preds = Vec::new();
        apply_visibility(&mut preds, Some(&sd), false);
        assert_eq!(preds, vec![Predicate::eq("is_deleted", json!(false))]);
        assert_eq!(sd.deleted_marker(), json!(true));
    }

    #[test]
    fn no_op_without_config_or_when_including_deleted() {
        let mut preds = Vec::new();
        apply_visibility(&mut preds, None, false);
        apply_visibility(&mut preds, Some(&SoftDelete::timestamp("deleted_at")), true);
        assert!(preds.is_empty());
    }

    #[test]
    fn now_marker_is_rfc3339() {
        let marker = SoftDelete::timestamp("deleted_at").deleted_marker();
        let s = marker.as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(s).is_ok());
    }
}
