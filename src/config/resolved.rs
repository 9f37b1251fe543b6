//! Resolved entity model: config validated and flattened for runtime use.

use crate::config::{ScopeRuleConfig, ValidationRule};
use crate::query::SoftDelete;
use std::collections::{HashMap, HashSet};

/// Id type for parsing path/body ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub nullable: bool,
    /// Whether the column has a DB default (e.g. gen_random_uuid(), NOW()).
    pub has_default: bool,
    /// Literal default, applied by stores that cannot evaluate SQL expressions.
    pub default_literal: Option<String>,
    /// PostgreSQL type name for SQL casts (e.g. "timestamptz") when binding string values.
    pub pg_type: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Timestamps {
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Entity descriptor handed to pipelines and stores. Identity comes only from config.
#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub id_field: String,
    pub id_type: PkType,
    pub columns: Vec<ColumnInfo>,
    pub allowed_filters: HashSet<String>,
    pub search_fields: Vec<String>,
    pub soft_delete: Option<SoftDelete>,
    pub timestamps: Timestamps,
    pub default_page_size: u64,
    pub max_page_size: u64,
    pub scope_rules: Vec<ScopeRuleConfig>,
    pub validation: HashMap<String, ValidationRule>,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Storage key for the table, `schema.table`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_name: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity(&self, name: &str) -> Option<&ResolvedEntity> {
        self.entity_by_name.get(name)
    }
}
