//! Declarative filter compiler: JSON filter expression in, ordered predicates out.
//!
//! A field maps either to a literal (implicit equals) or to an operator object
//! (`equals, not, gt, gte, lt, lte, in, notIn, like, ilike`). The reserved keys
//! `AND` and `OR` hold arrays of nested expressions. Compilation never fails:
//! unknown operators, fields outside the allow-list, `null` values and malformed
//! shapes contribute nothing.

use crate::query::predicate::{CompareOp, Predicate};
use serde_json::{Map, Value};
use std::collections::HashSet;

pub type FilterExpression = Map<String, Value>;

pub const AND_KEY: &str = "AND";
pub const OR_KEY: &str = "OR";

/// Compile `expression` into predicates that callers AND-join.
///
/// Output order: the combined `AND` groups, the combined `OR` groups, then the
/// plain fields of this level in declaration order.
pub fn compile(expression: &FilterExpression, allowed_fields: &HashSet<String>) -> Vec<Predicate> {
    let mut out = Vec::new();

    let and_groups = compile_groups(expression.get(AND_KEY), allowed_fields);
    if !and_groups.is_empty() {
        out.push(Predicate::all(and_groups));
    }

    // entries that compile to nothing are dropped before OR-combining
    let or_groups = compile_groups(expression.get(OR_KEY), allowed_fields);
    if !or_groups.is_empty() {
        out.push(Predicate::any(or_groups));
    }

    out.extend(compile_fields(expression, allowed_fields));
    out
}

fn compile_groups(groups: Option<&Value>, allowed_fields: &HashSet<String>) -> Vec<Predicate> {
    groups
        .and_then(Value::as_array)
        .map(|groups| groups.iter().filter_map(|g| compile_group(g, allowed_fields)).collect())
        .unwrap_or_default()
}

fn compile_group(entry: &Value, allowed_fields: &HashSet<String>) -> Option<Predicate> {
    let expression = entry.as_object()?;
    let group = compile(expression, allowed_fields);
    if group.is_empty() {
        None
    } else {
        Some(Predicate::all(group))
    }
}

fn compile_fields(expression: &FilterExpression, allowed_fields: &HashSet<String>) -> Vec<Predicate> {
    let mut out = Vec::new();
    for (field, value) in expression {
        if field == AND_KEY || field == OR_KEY || value.is_null() {
            continue;
        }
        if !allowed_fields.contains(field) {
            tracing::trace!(field = %field, "filter field not allowed, dropped");
            continue;
        }
        match value {
            Value::Object(ops) => {
                for (op, operand) in ops {
                    if let Some(p) = compile_operator(field, op, operand) {
                        out.push(p);
                    }
                }
            }
            Value::Array(_) => {}
            scalar => out.push(Predicate::eq(field.as_str(), scalar.clone())),
        }
    }
    out
}

fn compile_operator(field: &str, op: &str, operand: &Value) -> Option<Predicate> {
    let compare = |op: CompareOp| {
        if operand.is_null() {
            None
        } else {
            Some(Predicate::compare(field, op, operand.clone()))
        }
    };
    match op {
        "equals" if operand.is_null() => Some(Predicate::is_null(field)),
        "equals" => compare(CompareOp::Eq),
        "not" if operand.is_null() => Some(Predicate::is_not_null(field)),
        "not" => compare(CompareOp::Ne),
        "gt" => compare(CompareOp::Gt),
        "gte" => compare(CompareOp::Gte),
        "lt" => compare(CompareOp::Lt),
        "lte" => compare(CompareOp::Lte),
        "like" => compare(CompareOp::Like),
        "ilike" => compare(CompareOp::ILike),
        "in" => list_operand(operand).map(|values| Predicate::in_list(field, values)),
        "notIn" => list_operand(operand).map(|values| Predicate::not_in_list(field, values)),
        _ => None,
    }
}

/// `in`/`notIn` accept a single value as a one-element list.
fn list_operand(operand: &Value) -> Option<Vec<Value>> {
    match operand {
        Value::Null => None,
        Value::Array(values) => Some(values.clone()),
        single => Some(vec![single.clone()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn allowed(fields: &[&str]) -> HashSet<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    fn expr(v: Value) -> FilterExpression {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn literal_compiles_to_equals() {
        let out = compile(&expr(json!({ "role": "admin" })), &allowed(&["role"]));
        assert_eq!(out, vec![Predicate::eq("role", json!("admin"))]);
    }

    #[test]
    fn disallowed_null_and_array_values_are_dropped() {
        let out = compile(
            &expr(json!({ "role": "admin", "secret": "x", "name": null, "tags": ["a", "b"] })),
            &allowed(&["role", "name", "tags"]),
        );
        assert_eq!(out, vec![Predicate::eq("role", json!("admin"))]);
    }

    #[test]
    fn operators_emit_in_declaration_order() {
        let out = compile(
            &expr(json!({
                "age": { "gte": 18, "lt": 65, "between": [1, 2] },
                "name": { "ilike": "%ann%" },
                "status": { "in": "active", "notIn": ["banned", "deleted"] }
            })),
            &allowed(&["age", "name", "status"]),
        );
        assert_eq!(
            out,
            vec![
                Predicate::compare("age", CompareOp::Gte, json!(18)),
                Predicate::compare("age", CompareOp::Lt, json!(65)),
                Predicate::compare("name", CompareOp::ILike, json!("%ann%")),
                Predicate::in_list("status", vec![json!("active")]),
                Predicate::not_in_list("status", vec![json!("banned"), json!("deleted")]),
            ]
        );
    }

    #[test]
    fn null_operands_map_to_null_checks() {
        let out = compile(
            &expr(json!({ "deleted_at": { "equals": null }, "email": { "not": null }, "age": { "gt": null } })),
            &allowed(&["deleted_at", "email", "age"]),
        );
        assert_eq!(out, vec![Predicate::is_null("deleted_at"), Predicate::is_not_null("email")]);
    }

    #[test]
    fn and_or_and_plain_fields_compose_conjunctively() {
        let out = compile(
            &expr(json!({
                "AND": [{ "age": { "gt": 18 } }, { "role": "admin", "active": true }],
                "OR": [{ "city": "Oslo" }, { "city": "Bergen" }],
                "team": "core"
            })),
            &allowed(&["age", "role", "active", "city", "team"]),
        );
        assert_eq!(
            out,
            vec![
                Predicate::And(vec![
                    Predicate::compare("age", CompareOp::Gt, json!(18)),
                    Predicate::And(vec![
                        Predicate::eq("role", json!("admin")),
                        Predicate::eq("active", json!(true)),
                    ]),
                ]),
                Predicate::Or(vec![
                    Predicate::eq("city", json!("Oslo")),
                    Predicate::eq("city", json!("Bergen")),
                ]),
                Predicate::eq("team", json!("core")),
            ]
        );
    }

    #[test]
    fn nested_groups_recurse() {
        let out = compile(
            &expr(json!({ "OR": [{ "AND": [{ "a": 1 }, { "b": 2 }] }, { "c": 3 }] })),
            &allowed(&["a", "b", "c"]),
        );
        assert_eq!(
            out,
            vec![Predicate::Or(vec![
                Predicate::And(vec![Predicate::eq("a", json!(1)), Predicate::eq("b", json!(2))]),
                Predicate::eq("c", json!(3)),
            ])]
        );
    }

    #[test]
    fn empty_or_branches_are_skipped() {
        let out = compile(
            &expr(json!({ "OR": [{ "a": 1 }, { "hidden": 2 }, "nope"] })),
            &allowed(&["a"]),
        );
        assert_eq!(out, vec![Predicate::eq("a", json!(1))]);
    }

    #[test]
    fn or_with_no_compilable_branch_contributes_nothing() {
        let out = compile(&expr(json!({ "OR": [{ "hidden": 2 }, {}] })), &allowed(&["a"]));
        assert!(out.is_empty());
    }

    #[test]
    fn empty_and_branches_are_skipped() {
        let out = compile(&expr(json!({ "AND": [{ "hidden": 1 }, { "a": 1 }] })), &allowed(&["a"]));
        assert_eq!(out, vec![Predicate::eq("a", json!(1))]);
    }

    #[test]
    fn malformed_shapes_degrade_silently() {
        let out = compile(
            &expr(json!({ "AND": "nope", "OR": 5, "a": { "unknown": 1 } })),
            &allowed(&["a"]),
        );
        assert!(out.is_empty());
    }
}
