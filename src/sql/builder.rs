//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE from a resolved entity and composed predicates.

use crate::config::ResolvedEntity;
use crate::query::{CompareOp, Predicate, SortDirection};
use crate::store::{Row, SelectQuery};
use serde_json::Value;
use std::collections::HashSet;

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// Bind `v` for `column`, casting to the column's PostgreSQL type when known.
    fn placeholder(&mut self, entity: &ResolvedEntity, column: &str, v: Value) -> String {
        let n = self.push_param(v);
        entity
            .column(column)
            .and_then(|c| c.pg_type.as_deref())
            .map(|t| format!("${}::{}", n, t))
            .unwrap_or_else(|| format!("${}", n))
    }
}

/// SELECT list: each column as-is, except custom enum (schema.typename) and numeric as col::text so sqlx returns String.
fn select_column_list(entity: &ResolvedEntity) -> String {
    entity
        .columns
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            let pg_type = c.pg_type.as_deref().unwrap_or("");
            if pg_type.contains('.') || pg_type == "numeric" {
                format!("{}::text AS {}", q, q)
            } else {
                q
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_predicate(q: &mut QueryBuf, entity: &ResolvedEntity, p: &Predicate) -> String {
    match p {
        Predicate::Compare { field, op, value } => match op {
            CompareOp::Like | CompareOp::ILike => {
                let n = q.push_param(value.clone());
                format!("{}::text {} ${}", quoted(field), op.sql(), n)
            }
            _ => {
                let ph = q.placeholder(entity, field, value.clone());
                format!("{} {} {}", quoted(field), op.sql(), ph)
            }
        },
        Predicate::In { field, values, negated } => {
            if values.is_empty() {
                return if *negated { "TRUE".into() } else { "FALSE".into() };
            }
            let placeholders: Vec<String> = values
                .iter()
                .map(|v| q.placeholder(entity, field, v.clone()))
                .collect();
            let keyword = if *negated { "NOT IN" } else { "IN" };
            format!("{} {} ({})", quoted(field), keyword, placeholders.join(", "))
        }
        Predicate::IsNull { field, negated } => {
            let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
            format!("{} {}", quoted(field), keyword)
        }
        Predicate::And(group) => render_group(q, entity, group, " AND ", "TRUE"),
        Predicate::Or(group) => render_group(q, entity, group, " OR ", "FALSE"),
    }
}

fn render_group(q: &mut QueryBuf, entity: &ResolvedEntity, group: &[Predicate], sep: &str, empty: &str) -> String {
    match group {
        [] => empty.to_string(),
        [only] => render_predicate(q, entity, only),
        _ => {
            let parts: Vec<String> = group.iter().map(|p| render_predicate(q, entity, p)).collect();
            format!("({})", parts.join(sep))
        }
    }
}

/// ` WHERE a AND b ...` for AND-joined predicates; empty when there are none.
fn where_clause(q: &mut QueryBuf, entity: &ResolvedEntity, filter: &[Predicate]) -> String {
    if filter.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = filter.iter().map(|p| render_predicate(q, entity, p)).collect();
    format!(" WHERE {}", parts.join(" AND "))
}

fn order_clause(entity: &ResolvedEntity, query: &SelectQuery) -> String {
    let parts: Vec<String> = query
        .order_by
        .iter()
        .filter(|o| entity.has_column(&o.field))
        .map(|o| {
            let dir = match o.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{} {}", quoted(&o.field), dir)
        })
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", parts.join(", "))
    }
}

/// SELECT with AND-joined predicates, ordering, optional LIMIT/OFFSET.
pub fn select(entity: &ResolvedEntity, query: &SelectQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let where_clause = where_clause(&mut q, entity, &query.filter);
    let order_clause = order_clause(entity, query);
    let limit_clause = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(entity),
        table,
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    q
}

/// SELECT COUNT(*) with the same predicates a data query would use.
pub fn count(entity: &ResolvedEntity, filter: &[Predicate]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let where_clause = where_clause(&mut q, entity, filter);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", table, where_clause);
    q
}

/// Multi-row INSERT ... RETURNING. A column appears when any row provides it or it has no DB default;
/// rows that omit a defaulted column get `DEFAULT`, other omissions bind NULL.
pub fn insert(entity: &ResolvedEntity, rows: &[Row]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let provided: HashSet<&str> = rows.iter().flat_map(|r| r.keys().map(String::as_str)).collect();
    let mut cols: Vec<&str> = entity
        .columns
        .iter()
        .filter(|c| provided.contains(c.name.as_str()) || !c.has_default)
        .map(|c| c.name.as_str())
        .collect();
    if cols.is_empty() {
        cols.push(entity.id_field.as_str());
    }

    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let values: Vec<String> = cols
            .iter()
            .map(|col| match row.get(*col) {
                Some(v) => q.placeholder(entity, col, v.clone()),
                None if entity.column(col).map(|c| c.has_default).unwrap_or(false) => "DEFAULT".to_string(),
                None => "NULL".to_string(),
            })
            .collect();
        tuples.push(format!("({})", values.join(", ")));
    }

    let col_list: Vec<String> = cols.iter().map(|c| quoted(c)).collect();
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES {} RETURNING {}",
        table,
        col_list.join(", "),
        tuples.join(", "),
        select_column_list(entity)
    );
    q
}

/// UPDATE ... SET only entity columns present in `changes` (never the id) WHERE predicates, RETURNING rows.
/// Without any settable column this degrades to a SELECT of the matching rows.
pub fn update(entity: &ResolvedEntity, changes: &Row, filter: &[Predicate]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let mut sets = Vec::new();
    for (k, v) in changes {
        if *k == entity.id_field || !entity.has_column(k) {
            continue;
        }
        let rhs = q.placeholder(entity, k, v.clone());
        sets.push(format!("{} = {}", quoted(k), rhs));
    }
    if sets.is_empty() {
        return select(
            entity,
            &SelectQuery {
                filter: filter.to_vec(),
                ..SelectQuery::default()
            },
        );
    }
    let where_clause = where_clause(&mut q, entity, filter);
    q.sql = format!(
        "UPDATE {} SET {}{} RETURNING {}",
        table,
        sets.join(", "),
        where_clause,
        select_column_list(entity)
    );
    q
}

/// DELETE ... WHERE predicates RETURNING rows.
pub fn delete(entity: &ResolvedEntity, filter: &[Predicate]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&entity.schema_name, &entity.table_name);
    let where_clause = where_clause(&mut q, entity, filter);
    q.sql = format!(
        "DELETE FROM {}{} RETURNING {}",
        table,
        where_clause,
        select_column_list(entity)
    );
    q
}
