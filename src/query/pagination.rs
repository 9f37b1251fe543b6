//! Pagination engine: page bounds from list params, metadata from the total count.

use crate::query::filter::FilterExpression;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        OrderBy {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        OrderBy {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterExpression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageBounds {
    pub page: u64,
    pub per_page: u64,
    pub offset: u64,
}

/// Largest offset a PostgreSQL `OFFSET` (bigint) accepts.
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// `perPage = min(perPage ?? default, max)`, `page = page ?? 1`, `offset = (page - 1) * perPage`.
/// Zero page or page size is clamped to 1; the offset saturates at [`MAX_OFFSET`].
pub fn paginate(page: Option<u64>, per_page: Option<u64>, default_page_size: u64, max_page_size: u64) -> PageBounds {
    let per_page = per_page.unwrap_or(default_page_size).min(max_page_size).max(1);
    let page = page.unwrap_or(1).max(1);
    PageBounds {
        page,
        per_page,
        offset: (page - 1).saturating_mul(per_page).min(MAX_OFFSET),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    pub results: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl<T> PaginatedResult<T> {
    pub fn new(results: Vec<T>, bounds: PageBounds, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(bounds.per_page);
        PaginatedResult {
            results,
            page: bounds.page,
            per_page: bounds.per_page,
            total_items,
            total_pages,
            has_next_page: bounds.page < total_pages,
            has_previous_page: total_items > 0 && bounds.page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_offset() {
        let b = paginate(None, None, 20, 100);
        assert_eq!(b, PageBounds { page: 1, per_page: 20, offset: 0 });
        let b = paginate(Some(3), Some(10), 20, 100);
        assert_eq!(b, PageBounds { page: 3, per_page: 10, offset: 20 });
    }

    #[test]
    fn per_page_is_capped_at_max() {
        for requested in [101, 500, u64::MAX] {
            assert_eq!(paginate(None, Some(requested), 20, 100).per_page, 100);
        }
    }

    #[test]
    fn zero_values_are_clamped() {
        let b = paginate(Some(0), Some(0), 20, 100);
        assert_eq!(b, PageBounds { page: 1, per_page: 1, offset: 0 });
    }

    #[test]
    fn huge_pages_saturate_at_bigint_max() {
        let b = paginate(Some(u64::MAX), Some(100), 20, 100);
        assert_eq!(b.page, u64::MAX);
        assert_eq!(b.offset, i64::MAX as u64);
    }

    #[test]
    fn metadata_for_middle_page() {
        let r = PaginatedResult::new(vec![1, 2], paginate(Some(2), Some(2), 20, 100), 5);
        assert_eq!(r.total_pages, 3);
        assert!(r.has_next_page);
        assert!(r.has_previous_page);
    }

    #[test]
    fn zero_items_has_no_pages_regardless_of_page() {
        for page in [1, 2, 10] {
            let r: PaginatedResult<()> = PaginatedResult::new(vec![], paginate(Some(page), None, 20, 100), 0);
            assert_eq!(r.total_pages, 0);
            assert!(!r.has_next_page);
            assert!(!r.has_previous_page);
        }
    }

    #[test]
    fn page_past_the_end() {
        let r: PaginatedResult<()> = PaginatedResult::new(vec![], paginate(Some(10), Some(10), 20, 100), 1);
        assert_eq!(r.total_pages, 1);
        assert!(!r.has_next_page);
        assert!(r.has_previous_page);
    }

    #[test]
    fn serializes_camel_case() {
        let r = PaginatedResult::new(vec!["a"], paginate(None, None, 20, 100), 1);
        let v = serde_json::to_value(&r).unwrap();
        for key in ["results", "page", "perPage", "totalItems", "totalPages", "hasNextPage", "hasPreviousPage"] {
            assert!(v.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn list_params_from_json() {
        let p: ListParams = serde_json::from_value(serde_json::json!({
            "page": 2,
            "perPage": 5,
            "filters": { "role": "admin" },
            "orderBy": [{ "field": "name", "direction": "desc" }, { "field": "id" }],
            "includeDeleted": true
        }))
        .unwrap();
        assert_eq!(p.per_page, Some(5));
        assert_eq!(p.order_by, vec![OrderBy::desc("name"), OrderBy::asc("id")]);
        assert!(p.include_deleted);
    }
}
