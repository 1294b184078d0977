//! Common transport-layer types shared by the HTTP handlers.
//! The response envelope and the limit/offset page live here so every
//! endpoint serializes the same shapes.

pub mod formats;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Generic API response wrapper used by every successful endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success flag
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// One window of a limit/offset paginated collection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Page<T> {
    /// Total number of items matching the query
    pub count: u64,
    /// Maximum number of items in this window
    pub limit: u64,
    /// Number of items skipped before this window
    pub offset: u64,
    /// Items of this window
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(count: u64, limit: u64, offset: u64, results: Vec<T>) -> Self {
        Self {
            count,
            limit,
            offset,
            results,
        }
    }

    /// Cut a window out of an already materialized collection.
    pub fn from_vec(items: Vec<T>, limit: u64, offset: u64) -> Self {
        let count = items.len() as u64;
        let results = items
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();
        Self::new(count, limit, offset, results)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            limit: self.limit,
            offset: self.offset,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Resolve the `limit`/`offset` query pair against the configured page size.
pub fn page_window(limit: Option<u64>, offset: Option<u64>, default_limit: u64) -> (u64, u64) {
    (limit.unwrap_or(default_limit), offset.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_from_vec_windows_items() {
        let page = Page::from_vec(vec![1, 2, 3, 4, 5], 2, 1);
        assert_eq!(page.count, 5);
        assert_eq!(page.results, vec![2, 3]);
    }

    #[test]
    fn test_page_from_vec_offset_past_end() {
        let page = Page::from_vec(vec!["a", "b"], 10, 5);
        assert_eq!(page.count, 2);
        assert!(page.results.is_empty());
    }

    #[test]
    fn test_page_window_defaults() {
        assert_eq!(page_window(None, None, 10), (10, 0));
        assert_eq!(page_window(Some(3), Some(6), 10), (3, 6));
    }

    #[test]
    fn test_api_response_serialization() {
        let response = ApiResponse::ok(vec![1, 2], "Fetched");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Fetched");
        assert_eq!(json["data"][1], 2);
    }
}
