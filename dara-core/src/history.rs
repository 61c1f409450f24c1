//! URL query state.
//!
//! URL variables mirror their value into a query parameter. The store talks
//! to the browser location through [`UrlHistory`]; [`MemoryHistory`] keeps
//! the query in memory for hosts without one, and for tests.

use indexmap::IndexMap;
use parking_lot::RwLock;
use url::form_urlencoded;

/// Access to the query string of the current location.
pub trait UrlHistory: Send + Sync {
    /// Current value of query parameter `key`.
    fn query_param(&self, key: &str) -> Option<String>;

    /// Set `key` to `value`, or remove it when `value` is `None`.
    fn set_query_param(&self, key: &str, value: Option<&str>);

    /// The full search string, including the leading `?` when non-empty.
    fn search(&self) -> String;
}

/// In-memory query string, preserving parameter order.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    params: RwLock<IndexMap<String, String>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a search string such as `?a=1&b=two`.
    pub fn from_search(search: &str) -> Self {
        let query = search.strip_prefix('?').unwrap_or(search);
        let params = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self {
            params: RwLock::new(params),
        }
    }
}

impl UrlHistory for MemoryHistory {
    fn query_param(&self, key: &str) -> Option<String> {
        self.params.read().get(key).cloned()
    }

    fn set_query_param(&self, key: &str, value: Option<&str>) {
        let mut params = self.params.write();
        match value {
            Some(value) => {
                params.insert(key.to_string(), value.to_string());
            }
            None => {
                params.shift_remove(key);
            }
        }
    }

    fn search(&self) -> String {
        let params = self.params.read();
        if params.is_empty() {
            return String::new();
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        format!("?{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_search() {
        let history = MemoryHistory::from_search("?a=1&b=hello+world");
        assert_eq!(history.query_param("b").as_deref(), Some("hello world"));
        assert_eq!(history.search(), "?a=1&b=hello+world");
    }

    #[test]
    fn set_and_remove_params() {
        let history = MemoryHistory::new();
        assert_eq!(history.search(), "");

        history.set_query_param("tab", Some("2"));
        history.set_query_param("q", Some("x"));
        assert_eq!(history.search(), "?tab=2&q=x");

        history.set_query_param("tab", None);
        assert_eq!(history.search(), "?q=x");
        assert!(history.query_param("tab").is_none());
    }
}
