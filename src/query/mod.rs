//! Query composition: predicates, filter compiler, scope and soft-delete composers, pagination.

pub mod filter;
pub mod pagination;
pub mod predicate;
pub mod scope;
pub mod soft_delete;

pub use filter::{compile, FilterExpression};
pub use pagination::{paginate, ListParams, OrderBy, PageBounds, PaginatedResult, SortDirection};
pub use predicate::{CompareOp, Predicate};
pub use scope::{column_equals, ScopeFilters, ScopeFn};
pub use soft_delete::{apply_visibility, SoftDelete};
