//! In-process executor: rows per table behind an async RwLock, predicates evaluated with SQL semantics.

use crate::config::{PkType, ResolvedEntity};
use crate::error::AppError;
use crate::query::{CompareOp, Predicate, SortDirection};
use crate::store::{Row, SelectQuery, Store};
use async_trait::async_trait;
use regex::RegexBuilder;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Table {
    rows: Vec<Row>,
    last_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored row of `entity`, unfiltered, in insertion order.
    pub async fn snapshot(&self, entity: &ResolvedEntity) -> Vec<Row> {
        let tables = self.tables.read().await;
        tables
            .get(&entity.qualified_name())
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, entity: &ResolvedEntity, query: &SelectQuery) -> Result<Vec<Row>, AppError> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&entity.qualified_name()) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<Row> = table
            .rows
            .iter()
            .filter(|r| matches_all(&query.filter, r))
            .cloned()
            .collect();
        let order: Vec<_> = query.order_by.iter().filter(|o| entity.has_column(&o.field)).collect();
        if !order.is_empty() {
            rows.sort_by(|a, b| {
                for o in &order {
                    let ord = sort_cmp(field(a, &o.field), field(b, &o.field));
                    let ord = match o.direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }
        let offset = usize::try_from(query.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, entity: &ResolvedEntity, filter: &[Predicate]) -> Result<u64, AppError> {
        let tables = self.tables.read().await;
        let n = tables
            .get(&entity.qualified_name())
            .map(|t| t.rows.iter().filter(|r| matches_all(filter, r)).count())
            .unwrap_or(0);
        Ok(n as u64)
    }

    async fn insert(&self, entity: &ResolvedEntity, rows: &[Row]) -> Result<Vec<Row>, AppError> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(entity.qualified_name()).or_default();
        let mut last_id = table.last_id;
        let mut staged: Vec<Row> = Vec::with_capacity(rows.len());
        for input in rows {
            let mut row = Row::new();
            for col in &entity.columns {
                let value = match input.get(&col.name) {
                    Some(v) => v.clone(),
                    None if col.name == entity.id_field => generate_id(&entity.id_type, &mut last_id),
                    None => col.default_literal.as_deref().map(literal_value).unwrap_or(Value::Null),
                };
                row.insert(col.name.clone(), value);
            }
            if let Some(n) = row.get(&entity.id_field).and_then(Value::as_i64) {
                last_id = last_id.max(n);
            }
            let id = row.get(&entity.id_field).cloned().unwrap_or(Value::Null);
            let duplicate = table
                .rows
                .iter()
                .chain(staged.iter())
                .any(|r| r.get(&entity.id_field).is_some_and(|v| values_equal(v, &id)));
            if duplicate {
                return Err(AppError::Store(format!(
                    "duplicate key value for {}.{}: {}",
                    entity.table_name, entity.id_field, id
                )));
            }
            staged.push(row);
        }
        table.last_id = last_id;
        table.rows.extend(staged.iter().cloned());
        Ok(staged)
    }

    async fn update(&self, entity: &ResolvedEntity, changes: &Row, filter: &[Predicate]) -> Result<Vec<Row>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&entity.qualified_name()) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for row in table.rows.iter_mut().filter(|r| matches_all(filter, r)) {
            for (k, v) in changes {
                if *k != entity.id_field && entity.has_column(k) {
                    row.insert(k.clone(), v.clone());
                }
            }
            out.push(row.clone());
        }
        Ok(out)
    }

    async fn delete(&self, entity: &ResolvedEntity, filter: &[Predicate]) -> Result<Vec<Row>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&entity.qualified_name()) else {
            return Ok(Vec::new());
        };
        let (removed, kept): (Vec<Row>, Vec<Row>) = table.rows.drain(..).partition(|r| matches_all(filter, r));
        table.rows = kept;
        Ok(removed)
    }
}

fn generate_id(id_type: &PkType, last_id: &mut i64) -> Value {
    match id_type {
        PkType::Uuid | PkType::Text => Value::String(uuid::Uuid::new_v4().to_string()),
        PkType::BigInt | PkType::Int => {
            *last_id += 1;
            Value::Number((*last_id).into())
        }
    }
}

/// Literal defaults are JSON when they parse as JSON (`0`, `true`), text otherwise.
fn literal_value(s: &str) -> Value {
    serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))
}

fn field<'a>(row: &'a Row, name: &str) -> &'a Value {
    row.get(name).unwrap_or(&Value::Null)
}

fn matches_all(filter: &[Predicate], row: &Row) -> bool {
    filter.iter().all(|p| matches(p, row))
}

fn matches(p: &Predicate, row: &Row) -> bool {
    match p {
        Predicate::Compare { field: f, op, value } => {
            let cell = field(row, f);
            if cell.is_null() || value.is_null() {
                return false;
            }
            match op {
                CompareOp::Eq => values_equal(cell, value),
                CompareOp::Ne => !values_equal(cell, value),
                CompareOp::Gt => compare(cell, value) == Some(Ordering::Greater),
                CompareOp::Gte => matches!(compare(cell, value), Some(Ordering::Greater | Ordering::Equal)),
                CompareOp::Lt => compare(cell, value) == Some(Ordering::Less),
                CompareOp::Lte => matches!(compare(cell, value), Some(Ordering::Less | Ordering::Equal)),
                CompareOp::Like => like(cell, value, false),
                CompareOp::ILike => like(cell, value, true),
            }
        }
        Predicate::In { field: f, values, negated } => {
            let cell = field(row, f);
            if cell.is_null() {
                return false;
            }
            values.iter().any(|v| values_equal(cell, v)) != *negated
        }
        Predicate::IsNull { field: f, negated } => field(row, f).is_null() != *negated,
        Predicate::And(group) => group.iter().all(|g| matches(g, row)),
        Predicate::Or(group) => group.iter().any(|g| matches(g, row)),
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), _) | (_, Value::Number(_)) => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), _) | (_, Value::Number(_)) => as_f64(a)?.partial_cmp(&as_f64(b)?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// NULLs sort after every value, as PostgreSQL does for ascending order.
fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

fn like(cell: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let Some(pattern) = pattern.as_str() else {
        return false;
    };
    let text = match cell {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    RegexBuilder::new(&re)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map(|r| r.is_match(&text))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, FullConfig};
    use crate::query::OrderBy;
    use serde_json::json;

    fn entity(id_type: &str) -> ResolvedEntity {
        let config = FullConfig {
            entities: vec![serde_json::from_value(json!({
                "name": "items",
                "table": "items",
                "idType": id_type,
                "columns": [
                    { "name": "id", "type": "bigint", "nullable": false },
                    { "name": "name", "type": "text" },
                    { "name": "qty", "type": "integer", "default": "0" },
                    { "name": "note", "type": "text" }
                ]
            }))
            .unwrap()],
        };
        resolve(&config).unwrap().entity("items").unwrap().clone()
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    async fn seeded() -> (MemoryStore, ResolvedEntity) {
        let store = MemoryStore::new();
        let e = entity("bigint");
        store
            .insert(
                &e,
                &[
                    row(json!({ "name": "Apple", "qty": 3 })),
                    row(json!({ "name": "banana", "qty": 10, "note": "ripe" })),
                    row(json!({ "name": "cherry" })),
                ],
            )
            .await
            .unwrap();
        (store, e)
    }

    #[tokio::test]
    async fn insert_generates_ids_and_defaults() {
        let (store, e) = seeded().await;
        let rows = store.snapshot(&e).await;
        let ids: Vec<i64> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(rows[2]["qty"], json!(0));
        assert_eq!(rows[0]["note"], Value::Null);
    }

    #[tokio::test]
    async fn duplicate_ids_fail_the_whole_batch() {
        let (store, e) = seeded().await;
        let err = store
            .insert(&e, &[row(json!({ "id": 9, "name": "x" })), row(json!({ "id": 1, "name": "y" }))])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        assert_eq!(store.count(&e, &[]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn select_filters_sorts_and_windows() {
        let (store, e) = seeded().await;
        let rows = store
            .select(
                &e,
                &SelectQuery {
                    filter: vec![Predicate::compare("qty", CompareOp::Gte, json!(0))],
                    order_by: vec![OrderBy::desc("qty")],
                    limit: Some(2),
                    offset: Some(1),
                },
            )
            .await
            .unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Apple", "cherry"]);
    }

    #[tokio::test]
    async fn sql_null_semantics() {
        let (store, e) = seeded().await;
        let n = store
            .count(&e, &[Predicate::compare("note", CompareOp::Ne, json!("ripe"))])
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(store.count(&e, &[Predicate::is_null("note")]).await.unwrap(), 2);
        assert_eq!(store.count(&e, &[Predicate::in_list("qty", vec![])]).await.unwrap(), 0);
        assert_eq!(store.count(&e, &[Predicate::deny_all()]).await.unwrap(), 0);
        assert_eq!(store.count(&e, &[Predicate::And(vec![])]).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn like_and_ilike() {
        let (store, e) = seeded().await;
        let like = store
            .count(&e, &[Predicate::compare("name", CompareOp::Like, json!("a%"))])
            .await
            .unwrap();
        let ilike = store
            .count(&e, &[Predicate::compare("name", CompareOp::ILike, json!("a%"))])
            .await
            .unwrap();
        assert_eq!((like, ilike), (0, 1));
        let underscore = store
            .count(&e, &[Predicate::compare("name", CompareOp::Like, json!("_herry"))])
            .await
            .unwrap();
        assert_eq!(underscore, 1);
    }

    #[tokio::test]
    async fn update_and_delete_return_affected_rows() {
        let (store, e) = seeded().await;
        let updated = store
            .update(&e, &row(json!({ "id": 99, "note": "sold" })), &[Predicate::eq("id", json!(2))])
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["id"], json!(2));
        assert_eq!(updated[0]["note"], json!("sold"));

        let removed = store
            .delete(&e, &[Predicate::in_list("id", vec![json!(1), json!(3)])])
            .await
            .unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(store.count(&e, &[]).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn uuid_ids_are_generated() {
        let store = MemoryStore::new();
        let e = entity("uuid");
        let rows = store.insert(&e, &[row(json!({ "name": "x" }))]).await.unwrap();
        assert!(uuid::Uuid::parse_str(rows[0]["id"].as_str().unwrap()).is_ok());
    }
}
