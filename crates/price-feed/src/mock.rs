//! In-memory HTTP transport for tests and offline runs

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

use yield_core::{FetchError, FetchResult};

use crate::http::HttpFetch;

/// Canned responses matched by URL prefix; the longest matching prefix wins
#[derive(Debug, Default)]
pub struct MockHttp {
    routes: Mutex<Vec<(String, FetchResult<Value>)>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to URLs starting with `prefix`
    pub fn respond(&self, prefix: &str, body: Value) -> &Self {
        self.routes.lock().push((prefix.to_string(), Ok(body)));
        self
    }

    /// Fail URLs starting with `prefix`
    pub fn fail(&self, prefix: &str, error: FetchError) -> &Self {
        self.routes.lock().push((prefix.to_string(), Err(error)));
        self
    }

    /// Remove every route
    pub fn clear(&self) {
        self.routes.lock().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn lookup(&self, url: &str) -> FetchResult<Value> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().push(url.to_string());

        let routes = self.routes.lock();
        routes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| Err(FetchError::Http(format!("no route for {}", url))))
    }
}

#[async_trait]
impl HttpFetch for MockHttp {
    async fn get_json(&self, url: &str) -> FetchResult<Value> {
        self.lookup(url)
    }

    async fn post_json(&self, url: &str, _body: &Value) -> FetchResult<Value> {
        self.lookup(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_longest_prefix_wins() {
        let http = MockHttp::new();
        http.respond("https://api.example.com", json!(1));
        http.respond("https://api.example.com/tvl", json!(2));

        assert_eq!(assert_ok!(http.get_json("https://api.example.com/tvl/benqi").await), json!(2));
        assert_eq!(assert_ok!(http.get_json("https://api.example.com/other").await), json!(1));
        assert_err!(http.get_json("https://elsewhere").await);
        assert_eq!(http.call_count(), 3);
    }
}
