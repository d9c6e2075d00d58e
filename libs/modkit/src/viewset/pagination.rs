use serde::{Deserialize, Serialize};

/// Limit/offset page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            default_limit: 50,
            max_limit: 1000,
        }
    }
}

impl Paging {
    /// Effective page size. `limit=0` asks for the maximum.
    pub fn window(&self, limit: Option<u64>) -> u64 {
        match limit {
            None => self.default_limit.min(self.max_limit),
            Some(0) => self.max_limit,
            Some(n) => n.min(self.max_limit),
        }
    }
}

/// Link to the same listing at another offset. `query` is the original
/// query string minus `limit`/`offset`.
fn page_link(path: &str, query: &[(String, String)], limit: u64, offset: u64) -> String {
    let mut parts: Vec<String> = query
        .iter()
        .filter(|(k, _)| k != "limit" && k != "offset")
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect();
    parts.push(format!("limit={limit}"));
    if offset > 0 {
        parts.push(format!("offset={offset}"));
    }
    format!("{path}?{}", parts.join("&"))
}

/// `next` and `previous` links for a page.
pub fn links(
    path: &str,
    query: &[(String, String)],
    count: u64,
    limit: u64,
    offset: u64,
) -> (Option<String>, Option<String>) {
    let next = (offset + limit < count).then(|| page_link(path, query, limit, offset + limit));
    let previous =
        (offset > 0).then(|| page_link(path, query, limit, offset.saturating_sub(limit)));
    (next, previous)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_clamps() {
        let p = Paging::default();
        assert_eq!(p.window(None), 50);
        assert_eq!(p.window(Some(0)), 1000);
        assert_eq!(p.window(Some(5000)), 1000);
        assert_eq!(p.window(Some(7)), 7);
    }

    #[test]
    fn links_keep_filters() {
        let q = vec![
            ("q".to_string(), "acme corp".to_string()),
            ("offset".to_string(), "2".to_string()),
        ];
        let (next, prev) = links("/api/tenancy/tenants/", &q, 5, 2, 2);
        assert_eq!(
            next.as_deref(),
            Some("/api/tenancy/tenants/?q=acme%20corp&limit=2&offset=4")
        );
        assert_eq!(prev.as_deref(), Some("/api/tenancy/tenants/?q=acme%20corp&limit=2"));

        let (next, prev) = links("/x/", &[], 2, 2, 0);
        assert!(next.is_none());
        assert!(prev.is_none());
    }
}
