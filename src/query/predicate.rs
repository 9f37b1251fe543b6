//! Predicate model: single-field comparisons and AND/OR composition.

use serde_json::Value;

/// Binary comparison against a literal value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
}

impl CompareOp {
    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::ILike => "ILIKE",
        }
    }
}

/// Boolean condition over one field, or a composition of them.
///
/// `And(vec![])` is always true and `Or(vec![])` is always false; the latter doubles
/// as the deny-all predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
    IsNull {
        field: String,
        negated: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(field: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
            negated: false,
        }
    }

    pub fn not_in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
            negated: true,
        }
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Predicate::IsNull {
            field: field.into(),
            negated: false,
        }
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Predicate::IsNull {
            field: field.into(),
            negated: true,
        }
    }

    /// Matches no row.
    pub fn deny_all() -> Self {
        Predicate::Or(Vec::new())
    }

    /// AND of `group`, collapsing a single member to itself.
    pub fn all(mut group: Vec<Predicate>) -> Self {
        if group.len() == 1 {
            group.remove(0)
        } else {
            Predicate::And(group)
        }
    }

    /// OR of `group`, collapsing a single member to itself.
    pub fn any(mut group: Vec<Predicate>) -> Self {
        if group.len() == 1 {
            group.remove(0)
        } else {
            Predicate::Or(group)
        }
    }
}
