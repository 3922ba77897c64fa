use serde::Deserialize;
use time::Date;

use crate::dates::parse_date;

pub const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_PAGE_SIZE: i64 = 20;

/// Offset/limit pagination parameters, shared by every list endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl Pagination {
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// Boolean-ish query parameters: `true` and `1` (any case) are truthy,
/// everything else is not.
pub fn truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true") | Some("1")
    )
}

/// Lenient date filter: an unparseable value is ignored, not rejected.
pub fn date_filter(value: Option<&str>) -> Option<Date> {
    value.and_then(|v| parse_date(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_caps_limit_and_floors_page() {
        let p = Pagination { page: 0, limit: 500 };
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 0);

        let p = Pagination { page: 3, limit: 25 };
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn offset_saturates_instead_of_overflowing() {
        let p = Pagination {
            page: i64::MAX,
            limit: 100,
        };
        assert_eq!(p.offset(), i64::MAX);

        let p = Pagination {
            page: i64::MAX,
            limit: 1,
        };
        assert!(p.offset() >= 0);
    }

    #[test]
    fn truthy_accepts_true_and_one() {
        assert!(truthy(Some("true")));
        assert!(truthy(Some("TRUE")));
        assert!(truthy(Some("1")));
        assert!(!truthy(Some("false")));
        assert!(!truthy(Some("yes")));
        assert!(!truthy(None));
    }

    #[test]
    fn bad_date_filters_are_ignored() {
        assert!(date_filter(Some("2024-01-01")).is_some());
        assert!(date_filter(Some("soon")).is_none());
        assert!(date_filter(None).is_none());
    }
}
