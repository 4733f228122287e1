//! In-memory REST service for testing without network access.
//!
//! Behaves like a well-mannered resource API: `PUT` stores the body keyed by
//! URL (201 when new, 200 when replacing), `GET` returns it or 404, `DELETE`
//! removes it (204) or reports 404, and `GET` on a collection URL lists its
//! direct children as `{"value": [...]}`. Every request is recorded.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use serde_json::{Value, json};

use crate::error::Result;
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};

#[derive(Debug, Clone)]
struct Failure {
    method: Method,
    url_contains: String,
    status: u16,
    body: String,
}

#[derive(Debug, Clone)]
struct Scripted {
    method: Method,
    url: String,
    status: u16,
    body: String,
}

#[derive(Debug, Default)]
struct State {
    resources: BTreeMap<String, Value>,
    collections: BTreeSet<String>,
    requests: Vec<ApiRequest>,
    failures: Vec<Failure>,
    scripted: Vec<Scripted>,
}

/// Mock transport that stores resources in memory.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

fn parent(url: &str) -> Option<&str> {
    url.rsplit_once('/').map(|(parent, _)| parent)
}

impl MemoryTransport {
    /// Create a new empty mock service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Seed a resource as if it had been `PUT` earlier.
    pub fn insert(&self, url: impl Into<String>, value: Value) {
        let url = url.into();
        let mut state = self.lock();
        if let Some(parent) = parent(&url) {
            state.collections.insert(parent.to_string());
        }
        state.resources.insert(url, value);
    }

    /// Make every request with `method` whose URL contains `url_contains`
    /// fail with the given status and body.
    pub fn fail(&self, method: Method, url_contains: &str, status: u16, body: &str) {
        self.lock().failures.push(Failure {
            method,
            url_contains: url_contains.to_string(),
            status,
            body: body.to_string(),
        });
    }

    /// Answer `method url` with a fixed response.
    pub fn respond(&self, method: Method, url: &str, status: u16, body: Value) {
        self.lock().scripted.push(Scripted {
            method,
            url: url.to_string(),
            status,
            body: body.to_string(),
        });
    }

    /// Stored resource at `url`.
    pub fn resource(&self, url: &str) -> Option<Value> {
        self.lock().resources.get(url).cloned()
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    /// `(method, url)` pairs received so far, in order.
    pub fn calls(&self) -> Vec<(Method, String)> {
        self.lock()
            .requests
            .iter()
            .map(|r| (r.method, r.url.clone()))
            .collect()
    }

    /// Number of requests whose URL contains `fragment`.
    pub fn count_matching(&self, method: Method, fragment: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url.contains(fragment))
            .count()
    }
}

impl Transport for MemoryTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut state = self.lock();
        state.requests.push(request.clone());
        let url = request.url.as_str();

        if let Some(failure) = state
            .failures
            .iter()
            .find(|f| f.method == request.method && url.contains(&f.url_contains))
        {
            return Ok(ApiResponse::new(failure.status, failure.body.clone()));
        }

        if let Some(scripted) = state
            .scripted
            .iter()
            .find(|s| s.method == request.method && s.url == url)
        {
            return Ok(ApiResponse::new(scripted.status, scripted.body.clone()));
        }

        let not_found = || ApiResponse::new(404, json!({"error": {"code": "NotFound"}}).to_string());

        let response = match request.method {
            Method::Get => {
                if let Some(value) = state.resources.get(url) {
                    ApiResponse::new(200, value.to_string())
                } else if state.collections.contains(url) {
                    let prefix = format!("{url}/");
                    let items: Vec<Value> = state
                        .resources
                        .iter()
                        .filter(|(k, _)| k.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('/')))
                        .map(|(_, v)| v.clone())
                        .collect();
                    ApiResponse::new(200, json!({ "value": items }).to_string())
                } else {
                    not_found()
                }
            }
            Method::Put => {
                let value = match request.body.as_deref() {
                    Some(text) => serde_json::from_str(text).unwrap_or(Value::String(text.to_string())),
                    None => Value::Null,
                };
                if let Some(parent) = parent(url) {
                    state.collections.insert(parent.to_string());
                }
                let existed = state.resources.insert(url.to_string(), value.clone()).is_some();
                ApiResponse::new(if existed { 200 } else { 201 }, value.to_string())
            }
            Method::Delete => {
                if state.resources.remove(url).is_some() {
                    ApiResponse::new(204, "")
                } else {
                    not_found()
                }
            }
            Method::Post => not_found(),
        };

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(t: &MemoryTransport, method: Method, url: &str, body: Option<&str>) -> ApiResponse {
        let mut request = ApiRequest::new(method, url);
        if let Some(body) = body {
            request = request.body(body);
        }
        t.send(&request).unwrap()
    }

    #[test]
    fn test_put_get_delete_cycle() {
        let t = MemoryTransport::new();

        assert_eq!(send(&t, Method::Put, "https://s/a/x", Some("{\"v\":1}")).status, 201);
        assert_eq!(send(&t, Method::Put, "https://s/a/x", Some("{\"v\":2}")).status, 200);
        assert_eq!(send(&t, Method::Get, "https://s/a/x", None).body, "{\"v\":2}");
        assert_eq!(send(&t, Method::Delete, "https://s/a/x", None).status, 204);
        assert_eq!(send(&t, Method::Delete, "https://s/a/x", None).status, 404);
        assert_eq!(send(&t, Method::Get, "https://s/a/x", None).status, 404);
    }

    #[test]
    fn test_collection_listing_only_direct_children() {
        let t = MemoryTransport::new();
        t.insert("https://s/a/x", json!({"n": "x"}));
        t.insert("https://s/a/x/items/i", json!({"n": "i"}));

        let listing: Value = serde_json::from_str(&send(&t, Method::Get, "https://s/a", None).body).unwrap();
        assert_eq!(listing, json!({"value": [{"n": "x"}]}));
    }

    #[test]
    fn test_failure_injection_matches_fragment() {
        let t = MemoryTransport::new();
        t.fail(Method::Put, "/indexes/", 503, "busy");

        assert_eq!(send(&t, Method::Put, "https://s/indexes/a", Some("{}")).status, 503);
        assert_eq!(send(&t, Method::Put, "https://s/skillsets/a", Some("{}")).status, 201);
        assert_eq!(t.count_matching(Method::Put, "/indexes/"), 1);
    }
}
