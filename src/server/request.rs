//! Minimal request parsing: path/query split, header lookup, body read.
//! Deliberately small — this service does not need the teacher's full
//! `HeaderVec`/`ParamVec` stack-allocated parsing machinery, which existed
//! to serve an arbitrary OpenAPI-described route set under hot-path
//! allocation discipline. Eight fixed routes don't need it.

use std::collections::HashMap;
use std::io::Read;
use tiny_http::Method;

pub struct ParsedRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ParsedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

impl From<&mut tiny_http::Request> for ParsedRequest {
    fn from(request: &mut tiny_http::Request) -> Self {
        let url = request.url().to_string();
        let (path, query_string) = url.split_once('?').unwrap_or((url.as_str(), ""));

        let query = query_string
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                Some((urlencoding::decode(k).ok()?.into_owned(), urlencoding::decode(v).ok()?.into_owned()))
            })
            .collect();

        let headers = request
            .headers()
            .iter()
            .map(|h| (h.field.as_str().as_str().to_string(), h.value.as_str().to_string()))
            .collect();

        let mut body = Vec::new();
        let _ = request.as_reader().read_to_end(&mut body);

        ParsedRequest {
            method: request.method().clone(),
            path: path.to_string(),
            query,
            headers,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = ParsedRequest {
            method: Method::Get,
            path: "/health".to_string(),
            query: HashMap::new(),
            headers: vec![("X-Request-ID".to_string(), "abc".to_string())],
            body: Vec::new(),
        };
        assert_eq!(req.header("x-request-id"), Some("abc"));
    }

    #[test]
    fn query_map_is_empty_when_no_query_string() {
        let req = ParsedRequest {
            method: Method::Get,
            path: "/health".to_string(),
            query: HashMap::new(),
            headers: Vec::new(),
            body: Vec::new(),
        };
        assert!(req.query("keyId").is_none());
    }
}
