pub mod auth;
pub mod breeds;
pub mod health;
pub mod kittens;
pub mod users;

use common::page_window;

pub const MAX_PAGE_LIMIT: u64 = 1000;

fn non_negative(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
}

/// Resolve the raw `limit`/`offset` query pair.
///
/// A limit that is missing, zero or not a number falls back to `page_size`
/// and is capped at [`MAX_PAGE_LIMIT`]. A bad offset counts as zero.
pub fn resolve_window(limit: Option<&str>, offset: Option<&str>, page_size: u64) -> (u64, u64) {
    let limit = non_negative(limit)
        .filter(|limit| *limit > 0)
        .map(|limit| limit.min(MAX_PAGE_LIMIT));
    page_window(limit, non_negative(offset), page_size)
}
