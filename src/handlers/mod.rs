use serde::Serialize;
use uuid::Uuid;

use crate::middleware::auth::Claims;
use crate::utils::errors::ApiError;

pub mod auth;
pub mod charts;
pub mod uploads;
pub mod users;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(limit.max(1));
        Self {
            current_page: page,
            total_pages,
            total_items,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// Normalize `page`/`limit` query parameters to (page, limit, offset).
pub fn page_params(page: Option<u64>, limit: Option<u64>) -> (u64, u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(10).clamp(1, 100);
    (page, limit, (page - 1) * limit)
}

pub fn claims_user_id(claims: &Claims) -> Result<Uuid, ApiError> {
    Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::Unauthorized("Invalid user ID in token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_math() {
        let pagination = Pagination::new(2, 10, 35);
        assert_eq!(pagination.total_pages, 4);
        assert!(pagination.has_next);
        assert!(pagination.has_prev);

        let last = Pagination::new(4, 10, 35);
        assert!(!last.has_next);

        let empty = Pagination::new(1, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }

    #[test]
    fn test_page_params_defaults_and_bounds() {
        assert_eq!(page_params(None, None), (1, 10, 0));
        assert_eq!(page_params(Some(0), None), (1, 10, 0));
        assert_eq!(page_params(Some(3), Some(20)), (3, 20, 40));
        assert_eq!(page_params(Some(1), Some(500)), (1, 100, 0));
    }
}
