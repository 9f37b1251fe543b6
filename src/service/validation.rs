//! Schema-validation adapter: per-operation validators derived from the entity config.

use crate::config::{PkType, ResolvedEntity, ValidationRule};
use crate::error::{AppError, ValidationErrors};
use crate::query::ListParams;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Accepts, rejects or transforms one input value.
pub trait Validator: Send + Sync {
    fn parse(&self, input: Value) -> Result<Value, AppError>;
}

/// Builds the five validators a pipeline needs. Called once per pipeline.
pub trait SchemaAdapter: Send + Sync {
    fn insert_schema(&self, entity: &Arc<ResolvedEntity>) -> Box<dyn Validator>;
    fn update_schema(&self, entity: &Arc<ResolvedEntity>) -> Box<dyn Validator>;
    fn list_schema(&self, entity: &Arc<ResolvedEntity>) -> Box<dyn Validator>;
    fn id_schema(&self, entity: &Arc<ResolvedEntity>) -> Box<dyn Validator>;
    fn filter_schema(&self, entity: &Arc<ResolvedEntity>) -> Box<dyn Validator>;
}

/// Validators driven by column nullability/defaults, the id type and per-column `validation` rules.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleSchemaAdapter;

impl SchemaAdapter for RuleSchemaAdapter {
    fn insert_schema(&self, entity: &Arc<ResolvedEntity>) -> Box<dyn Validator> {
        Box::new(RecordValidator {
            entity: compile_rules(entity),
            partial: false,
        })
    }

    fn update_schema(&self, entity: &Arc<ResolvedEntity>) -> Box<dyn Validator> {
        Box::new(RecordValidator {
            entity: compile_rules(entity),
            partial: true,
        })
    }

    fn list_schema(&self, _entity: &Arc<ResolvedEntity>) -> Box<dyn Validator> {
        Box::new(ListValidator)
    }

    fn id_schema(&self, entity: &Arc<ResolvedEntity>) -> Box<dyn Validator> {
        Box::new(IdValidator {
            field: entity.id_field.clone(),
            id_type: entity.id_type.clone(),
        })
    }

    fn filter_schema(&self, entity: &Arc<ResolvedEntity>) -> Box<dyn Validator> {
        Box::new(ConditionsValidator {
            entity: entity.clone(),
        })
    }
}

/// Coerce an id to the configured type: canonical UUID string, integer, or text.
pub fn parse_id(raw: &Value, id_type: &PkType) -> Result<Value, String> {
    match id_type {
        PkType::Uuid => raw
            .as_str()
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
            .map(|u| Value::String(u.to_string()))
            .ok_or_else(|| "must be a valid UUID".to_string()),
        PkType::BigInt | PkType::Int => {
            let n = match raw {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(|| "must be an integer".to_string())?;
            if *id_type == PkType::Int && i32::try_from(n).is_err() {
                return Err("is out of range".into());
            }
            Ok(Value::Number(n.into()))
        }
        PkType::Text => match raw {
            Value::String(s) if !s.is_empty() => Ok(raw.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            _ => Err("must be a non-empty string".into()),
        },
    }
}

fn expect_object(input: Value) -> Result<Map<String, Value>, AppError> {
    match input {
        Value::Object(m) => Ok(m),
        other => Err(AppError::validation(
            "body",
            format!("expected an object, got {}", crate::config::type_name_of_json(&other)),
        )),
    }
}

/// Entity plus its `pattern` rules compiled once.
struct CompiledEntity {
    entity: Arc<ResolvedEntity>,
    patterns: Vec<(String, Result<Regex, regex::Error>)>,
}

fn compile_rules(entity: &Arc<ResolvedEntity>) -> CompiledEntity {
    let patterns = entity
        .validation
        .iter()
        .filter_map(|(col, rule)| rule.pattern.as_ref().map(|p| (col.clone(), Regex::new(p))))
        .collect();
    CompiledEntity {
        entity: entity.clone(),
        patterns,
    }
}

struct RecordValidator {
    entity: CompiledEntity,
    partial: bool,
}

impl RecordValidator {
    /// Columns the pipeline fills itself and therefore never required from callers.
    fn is_managed(&self, col: &str) -> bool {
        let e = &self.entity.entity;
        col == e.id_field
            || e.timestamps.created_at.as_deref() == Some(col)
            || e.timestamps.updated_at.as_deref() == Some(col)
            || e.soft_delete.as_ref().is_some_and(|sd| sd.field == col)
    }
}

impl Validator for RecordValidator {
    fn parse(&self, input: Value) -> Result<Value, AppError> {
        let entity = &self.entity.entity;
        let body = expect_object(input)?;
        let mut out = Map::new();
        let mut errors = ValidationErrors::new();

        for (key, value) in body {
            let Some(col) = entity.column(&key) else {
                continue;
            };
            if key == entity.id_field {
                if self.partial {
                    continue;
                }
                match parse_id(&value, &entity.id_type) {
                    Ok(id) => {
                        out.insert(key, id);
                    }
                    Err(msg) => errors.push(key, msg),
                }
                continue;
            }
            if value.is_null() && !col.nullable {
                errors.push(key, "must not be null");
                continue;
            }
            out.insert(key, value);
        }

        if !self.partial {
            for col in &entity.columns {
                if !col.nullable && !col.has_default && !self.is_managed(&col.name) && !out.contains_key(&col.name) {
                    errors.push(col.name.clone(), "is required");
                }
            }
        }

        for (col, rule) in &entity.validation {
            let val = out.get(col);
            if !self.partial && rule.required == Some(true) && val.map_or(true, Value::is_null) {
                if !errors.issues.iter().any(|i| i.field == *col) {
                    errors.push(col.clone(), "is required");
                }
                continue;
            }
            if let Some(v) = val {
                let pattern = self
                    .entity
                    .patterns
                    .iter()
                    .find(|(c, _)| c == col)
                    .map(|(_, re)| re);
                validate_field(col, v, rule, pattern, &mut errors);
            }
        }

        errors.into_result()?;
        Ok(Value::Object(out))
    }
}

fn validate_field(
    col: &str,
    v: &Value,
    rule: &ValidationRule,
    pattern: Option<&Result<Regex, regex::Error>>,
    errors: &mut ValidationErrors,
) {
    if v.is_null() {
        return;
    }
    if let Some(format) = &rule.format {
        validate_format(col, v, format, errors);
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                errors.push(col, format!("must be at most {} characters", max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                errors.push(col, format!("must be at least {} characters", min));
            }
        }
        match pattern {
            Some(Ok(re)) if !re.is_match(s) => errors.push(col, "does not match required pattern"),
            Some(Err(_)) => errors.push(col, "has an invalid pattern rule"),
            _ => {}
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            errors.push(
                col,
                format!("must be one of: {:?}", allowed.iter().take(5).collect::<Vec<_>>()),
            );
        }
    }
    if let Some(n) = v.as_f64() {
        if rule.minimum.is_some_and(|min| n < min) {
            errors.push(col, format!("must be at least {}", rule.minimum.unwrap_or_default()));
        }
        if rule.maximum.is_some_and(|max| n > max) {
            errors.push(col, format!("must be at most {}", rule.maximum.unwrap_or_default()));
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str, errors: &mut ValidationErrors) {
    let Some(s) = v.as_str() else {
        return;
    };
    match format.to_lowercase().as_str() {
        "email" => {
            let valid = s
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'));
            if !valid {
                errors.push(col, "must be a valid email");
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                errors.push(col, "must be a valid UUID");
            }
        }
        _ => {}
    }
}

struct IdValidator {
    field: String,
    id_type: PkType,
}

impl Validator for IdValidator {
    fn parse(&self, input: Value) -> Result<Value, AppError> {
        parse_id(&input, &self.id_type).map_err(|msg| AppError::validation(self.field.clone(), msg))
    }
}

/// `findOne` conditions: known columns only, id coerced.
struct ConditionsValidator {
    entity: Arc<ResolvedEntity>,
}

impl Validator for ConditionsValidator {
    fn parse(&self, input: Value) -> Result<Value, AppError> {
        let body = expect_object(input)?;
        let mut out = Map::new();
        let mut errors = ValidationErrors::new();
        for (key, value) in body {
            if !self.entity.has_column(&key) {
                continue;
            }
            if key == self.entity.id_field && !value.is_null() {
                match parse_id(&value, &self.entity.id_type) {
                    Ok(id) => {
                        out.insert(key, id);
                    }
                    Err(msg) => errors.push(key, msg),
                }
                continue;
            }
            out.insert(key, value);
        }
        errors.into_result()?;
        Ok(Value::Object(out))
    }
}

struct ListValidator;

impl Validator for ListValidator {
    fn parse(&self, input: Value) -> Result<Value, AppError> {
        let input = if input.is_null() { Value::Object(Map::new()) } else { input };
        let params: ListParams =
            serde_json::from_value(input).map_err(|e| AppError::validation("params", e.to_string()))?;
        let mut errors = ValidationErrors::new();
        if params.page == Some(0) {
            errors.push("page", "must be at least 1");
        }
        if params.per_page == Some(0) {
            errors.push("perPage", "must be at least 1");
        }
        errors.into_result()?;
        serde_json::to_value(params).map_err(|e| AppError::validation("params", e.to_string()))
    }
}
