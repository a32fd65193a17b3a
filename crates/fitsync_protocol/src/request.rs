//! REST request descriptors.
//!
//! Each synchronizer operation maps to exactly one call: a method, a path
//! relative to the API base URL, optional query parameters and an optional
//! JSON body.

use serde::Serialize;
use std::fmt;

/// HTTP method of an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Returns true for methods that do not change server state.
    pub fn is_read(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One REST call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Method.
    pub method: HttpMethod,
    /// Path relative to the API base, starting with `/`.
    pub path: String,
    /// Query parameters in insertion order.
    pub query: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Creates a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Creates a PUT request.
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// Creates a PATCH request.
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    /// Creates a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Appends a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Appends every non-null scalar member of a serializable filter as a
    /// query parameter, in name order.
    pub fn with_query_from<F: Serialize>(mut self, filter: &F) -> serde_json::Result<Self> {
        if let serde_json::Value::Object(members) = serde_json::to_value(filter)? {
            let mut names: Vec<_> = members.keys().cloned().collect();
            names.sort();
            for name in names {
                match &members[&name] {
                    serde_json::Value::Null => {}
                    serde_json::Value::String(s) => self.query.push((name, s.clone())),
                    other => self.query.push((name, other.to_string())),
                }
            }
        }
        Ok(self)
    }

    /// Sets the JSON body.
    pub fn with_body<B: Serialize>(mut self, body: &B) -> serde_json::Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Sets an already-built JSON body.
    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path plus encoded query string.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path_and_query())
    }
}

fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte));
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// How a response status should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx.
    Success,
    /// Worth retrying: 5xx, 408, 429.
    Transient,
    /// Never retried: every other status.
    Terminal,
}

/// Classifies an HTTP status code.
pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        408 | 429 | 500..=599 => StatusClass::Transient,
        _ => StatusClass::Terminal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Filter {
        scope: &'static str,
        page: u32,
        search: Option<String>,
    }

    #[test]
    fn query_from_filter_is_sorted_and_skips_null() {
        let req = ApiRequest::get("/posts/feed/")
            .with_query_from(&Filter {
                scope: "friends",
                page: 2,
                search: None,
            })
            .unwrap();
        assert_eq!(req.path_and_query(), "/posts/feed/?page=2&scope=friends");
    }

    #[test]
    fn query_components_are_escaped() {
        let req = ApiRequest::get("/gyms/search/").with_query("q", "iron & steel");
        assert_eq!(req.path_and_query(), "/gyms/search/?q=iron%20%26%20steel");
    }

    #[test]
    fn body_and_display() {
        let req = ApiRequest::post("/posts/").with_json(json!({"content": "hello"}));
        assert_eq!(req.to_string(), "POST /posts/");
        assert_eq!(req.body, Some(json!({"content": "hello"})));
    }

    #[test]
    fn status_classes() {
        assert_eq!(classify_status(201), StatusClass::Success);
        assert_eq!(classify_status(503), StatusClass::Transient);
        assert_eq!(classify_status(429), StatusClass::Transient);
        assert_eq!(classify_status(404), StatusClass::Terminal);
        assert_eq!(classify_status(401), StatusClass::Terminal);
    }
}
