//! Load entity config from JSON files and resolve it into runtime descriptors.

use crate::config::resolved::{ColumnInfo, PkType, ResolvedEntity, ResolvedModel, Timestamps};
use crate::config::types::*;
use crate::config::{validate, Settings};
use crate::error::ConfigError;
use crate::query::SoftDelete;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Build resolved model from full config using default settings.
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    resolve_with(config, &Settings::default())
}

/// Build resolved model from full config; entities fall back to `settings` for schema and page sizes.
pub fn resolve_with(config: &FullConfig, settings: &Settings) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let mut entities = Vec::new();
    let mut entity_by_name = HashMap::new();
    for cfg in &config.entities {
        let entity = resolve_entity(cfg, settings)?;
        entity_by_name.insert(entity.name.clone(), entity.clone());
        entities.push(entity);
    }

    Ok(ResolvedModel {
        entities,
        entity_by_name,
    })
}

fn resolve_entity(cfg: &EntityConfig, settings: &Settings) -> Result<ResolvedEntity, ConfigError> {
    let columns: Vec<ColumnInfo> = cfg
        .columns
        .iter()
        .map(|c| ColumnInfo {
            name: c.name.clone(),
            nullable: c.nullable,
            has_default: c.default.is_some(),
            default_literal: match &c.default {
                Some(ColumnDefaultConfig::Literal(s)) => Some(s.clone()),
                _ => None,
            },
            pg_type: column_pg_type_name(&c.type_),
        })
        .collect();

    let allowed_filters: HashSet<String> = match &cfg.allowed_filters {
        Some(list) => list.iter().cloned().collect(),
        None => columns.iter().map(|c| c.name.clone()).collect(),
    };

    let default_page_size = cfg.pagination.default_page_size.unwrap_or(settings.default_page_size);
    let max_page_size = cfg.pagination.max_page_size.unwrap_or(settings.max_page_size);
    if default_page_size > max_page_size {
        return Err(ConfigError::Validation(format!(
            "{}: default page size {} exceeds max page size {}",
            cfg.name, default_page_size, max_page_size
        )));
    }

    let soft_delete = cfg.soft_delete.as_ref().map(|sd| SoftDelete {
        field: sd.field.clone(),
        deleted_value: sd.deleted_value.clone(),
        not_deleted_value: sd.not_deleted_value.clone(),
    });

    let timestamps = cfg
        .timestamps
        .as_ref()
        .map(|t| Timestamps {
            created_at: t.created_at.clone(),
            updated_at: t.updated_at.clone(),
        })
        .unwrap_or_default();

    Ok(ResolvedEntity {
        name: cfg.name.clone(),
        schema_name: cfg.schema.clone().unwrap_or_else(|| settings.default_schema.clone()),
        table_name: cfg.table.clone(),
        id_field: cfg.id_field.clone(),
        id_type: pk_type(cfg.id_type),
        columns,
        allowed_filters,
        search_fields: cfg.search_fields.clone(),
        soft_delete,
        timestamps,
        default_page_size,
        max_page_size,
        scope_rules: cfg.scope.clone(),
        validation: cfg.validation.clone(),
    })
}

fn pk_type(id_type: IdTypeConfig) -> PkType {
    match id_type {
        IdTypeConfig::Uuid => PkType::Uuid,
        IdTypeConfig::BigInt => PkType::BigInt,
        IdTypeConfig::Int => PkType::Int,
        IdTypeConfig::Text => PkType::Text,
    }
}

fn column_pg_type_name(ty: &ColumnTypeConfig) -> Option<String> {
    let name = ty.name();
    let lower = name.to_lowercase();
    if lower == "timestamptz" || lower == "timestamp with time zone" {
        Some("timestamptz".into())
    } else if lower == "timestamp" || lower.starts_with("timestamp ") {
        Some("timestamp".into())
    } else if lower == "date" {
        Some("date".into())
    } else if lower.contains("uuid") {
        Some("uuid".into())
    } else if matches!(lower.as_str(), "integer" | "int" | "int4" | "serial") {
        Some("integer".into())
    } else if matches!(lower.as_str(), "bigint" | "int8" | "bigserial") {
        Some("bigint".into())
    } else if matches!(lower.as_str(), "smallint" | "int2") {
        Some("smallint".into())
    } else if lower == "boolean" || lower == "bool" {
        Some("boolean".into())
    } else if lower == "text" || lower.starts_with("varchar") || lower.starts_with("character varying") {
        Some("text".into())
    } else if lower == "numeric" || lower == "decimal" {
        Some("numeric".into())
    } else if lower == "jsonb" || lower == "json" {
        Some(lower)
    } else if name.contains('.') {
        // Schema-qualified custom type (e.g. sample.order_status); cast so text binds correctly
        Some(name.to_string())
    } else {
        None
    }
}

/// Load entity declarations from a JSON file (array of entities, or one entity)
/// or from a directory of `*.json` files read in name order.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    if !meta.is_dir() {
        return Ok(FullConfig {
            entities: read_entities(path).await?,
        });
    }

    let mut files = Vec::new();
    let mut dir = tokio::fs::read_dir(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(|e| ConfigError::Load(e.to_string()))?
    {
        let p = entry.path();
        if p.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(p);
        } else {
            tracing::warn!(path = %p.display(), "skipping non-json config file");
        }
    }
    files.sort();

    let mut entities = Vec::new();
    for file in files {
        entities.extend(read_entities(&file).await?);
    }
    Ok(FullConfig { entities })
}

async fn read_entities(path: &Path) -> Result<Vec<EntityConfig>, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let entities = match value {
        serde_json::Value::Array(_) => serde_json::from_value::<Vec<EntityConfig>>(value),
        other => serde_json::from_value::<EntityConfig>(other).map(|e| vec![e]),
    };
    entities.map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}
