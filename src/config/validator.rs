//! Config validation: referential integrity between entity declarations and their columns.

use crate::config::{DeletedValueConfig, EntityConfig, FullConfig};
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for entity in &config.entities {
        validate_entity(entity)?;
        if !names.insert(entity.name.as_str()) {
            return Err(ConfigError::DuplicateEntity(entity.name.clone()));
        }
    }
    Ok(())
}

pub fn validate_entity(entity: &EntityConfig) -> Result<(), ConfigError> {
    if entity.name.trim().is_empty() {
        return Err(ConfigError::Validation("entity name must not be empty".into()));
    }
    if entity.table.trim().is_empty() {
        return Err(ConfigError::MissingReference {
            kind: "table",
            id: entity.name.clone(),
        });
    }
    let columns: HashSet<&str> = entity.columns.iter().map(|c| c.name.as_str()).collect();
    if columns.len() != entity.columns.len() {
        return Err(ConfigError::Validation(format!("{}: duplicate column names", entity.name)));
    }
    if !columns.contains(entity.id_field.as_str()) {
        return Err(ConfigError::InvalidIdField {
            entity: entity.name.clone(),
            column: entity.id_field.clone(),
        });
    }

    let require_column = |kind: &'static str, col: &str| -> Result<(), ConfigError> {
        if columns.contains(col) {
            Ok(())
        } else {
            Err(ConfigError::MissingReference {
                kind,
                id: format!("{}.{}", entity.name, col),
            })
        }
    };

    for f in entity.allowed_filters.iter().flatten() {
        require_column("filter column", f)?;
    }
    for f in &entity.search_fields {
        require_column("search column", f)?;
    }
    for rule in &entity.scope {
        if rule.key.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{}: scope key must not be empty", entity.name)));
        }
        require_column("scope column", &rule.column)?;
    }
    if let Some(ts) = &entity.timestamps {
        for col in ts.created_at.iter().chain(ts.updated_at.iter()) {
            require_column("timestamp column", col)?;
        }
    }
    if let Some(sd) = &entity.soft_delete {
        if sd.field.trim().is_empty() {
            return Err(ConfigError::SoftDelete {
                entity: entity.name.clone(),
                reason: "field is required".into(),
            });
        }
        if !columns.contains(sd.field.as_str()) {
            return Err(ConfigError::SoftDelete {
                entity: entity.name.clone(),
                reason: format!("field '{}' is not a column", sd.field),
            });
        }
        if sd.field == entity.id_field {
            return Err(ConfigError::SoftDelete {
                entity: entity.name.clone(),
                reason: "field must not be the id field".into(),
            });
        }
        if let DeletedValueConfig::Literal(v) = &sd.deleted_value {
            if v.is_null() || *v == sd.not_deleted_value {
                return Err(ConfigError::SoftDelete {
                    entity: entity.name.clone(),
                    reason: "deletedValue must be set and differ from notDeletedValue".into(),
                });
            }
        }
    }
    let p = &entity.pagination;
    if p.default_page_size == Some(0) || p.max_page_size == Some(0) {
        return Err(ConfigError::Validation(format!("{}: page sizes must be at least 1", entity.name)));
    }
    if let (Some(d), Some(m)) = (p.default_page_size, p.max_page_size) {
        if d > m {
            return Err(ConfigError::Validation(format!(
                "{}: defaultPageSize {} exceeds maxPageSize {}",
                entity.name, d, m
            )));
        }
    }
    for col in entity.validation.keys() {
        require_column("validation column", col)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(extra: serde_json::Value) -> EntityConfig {
        let mut base = json!({
            "name": "posts",
            "table": "posts",
            "columns": [
                { "name": "id", "type": "uuid", "nullable": false },
                { "name": "title", "type": "text", "nullable": false },
                { "name": "deleted_at", "type": "timestamptz" }
            ]
        });
        if let (Some(obj), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                obj.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn accepts_minimal_entity() {
        assert!(validate_entity(&entity(json!({}))).is_ok());
    }

    #[test]
    fn rejects_missing_id_column() {
        let err = validate_entity(&entity(json!({ "idField": "post_id" }))).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdField { .. }));
    }

    #[test]
    fn rejects_unknown_filter_column() {
        let err = validate_entity(&entity(json!({ "allowedFilters": ["title", "body"] }))).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "filter column", .. }));
    }

    #[test]
    fn rejects_soft_delete_without_field() {
        let err = validate_entity(&entity(json!({ "softDelete": { "field": "" } }))).unwrap_err();
        assert!(matches!(err, ConfigError::SoftDelete { .. }));
        let err = validate_entity(&entity(json!({ "softDelete": { "field": "removed" } }))).unwrap_err();
        assert!(matches!(err, ConfigError::SoftDelete { .. }));
    }

    #[test]
    fn rejects_inverted_page_sizes() {
        let err = validate_entity(&entity(json!({ "pagination": { "defaultPageSize": 50, "maxPageSize": 10 } })))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_duplicate_entities() {
        let config = FullConfig {
            entities: vec![entity(json!({})), entity(json!({}))],
        };
        assert!(matches!(validate(&config), Err(ConfigError::DuplicateEntity(_))));
    }
}
