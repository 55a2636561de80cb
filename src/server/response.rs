//! Response construction helpers. Mirrors the teacher's
//! `write_handler_response`/`write_json_error` split: handlers build a
//! `Payload`, this module is the only place that turns it into wire bytes.

use crate::errors::ApiError;
use crate::ids::RequestId;
use crate::middleware::SECURITY_HEADERS;
use serde::Serialize;
use tiny_http::{Header, Response};

pub enum Body {
    Json(String),
    Text(String),
    Bytes(Vec<u8>, &'static str),
}

pub struct Payload {
    pub status: u16,
    pub body: Body,
    pub extra_headers: Vec<(String, String)>,
}

fn header(name: &str, value: &str) -> Header {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("header name/value must be ASCII")
}

pub fn json_payload<T: Serialize>(status: u16, value: &T) -> Payload {
    Payload {
        status,
        body: Body::Json(serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())),
        extra_headers: Vec::new(),
    }
}

pub fn text_payload(status: u16, body: impl Into<String>) -> Payload {
    Payload {
        status,
        body: Body::Text(body.into()),
        extra_headers: Vec::new(),
    }
}

pub fn bytes_payload(status: u16, body: Vec<u8>, content_type: &'static str) -> Payload {
    Payload {
        status,
        body: Body::Bytes(body, content_type),
        extra_headers: Vec::new(),
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: &'a str,
    code: &'a str,
    #[serde(rename = "requestId")]
    request_id: String,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

pub fn error_payload(err: &ApiError, request_id: RequestId) -> Payload {
    let envelope = ErrorEnvelope {
        error: &err.message,
        code: err.code.as_str(),
        request_id: request_id.to_string(),
        retry_after: err.retry_after,
    };
    json_payload(err.status, &envelope)
}

pub fn write_response(
    request: tiny_http::Request,
    payload: Payload,
    request_id: RequestId,
    cors_headers: Vec<(String, String)>,
) {
    let (content_type, data): (&str, Vec<u8>) = match payload.body {
        Body::Json(s) => ("application/json", s.into_bytes()),
        Body::Text(s) => ("text/plain; charset=utf-8", s.into_bytes()),
        Body::Bytes(b, ct) => (ct, b),
    };

    let mut response = Response::from_data(data).with_status_code(payload.status);
    response.add_header(header("Content-Type", content_type));
    response.add_header(header("X-Request-ID", &request_id.to_string()));

    for (name, value) in SECURITY_HEADERS {
        response.add_header(header(name, value));
    }
    for (name, value) in &cors_headers {
        response.add_header(header(name, value));
    }
    for (name, value) in &payload.extra_headers {
        response.add_header(header(name, value));
    }

    let _ = request.respond(response);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn error_payload_carries_retry_after_only_when_present() {
        let err = ApiError::new(429, ErrorCode::RateLimited, "slow down").with_retry_after(5);
        let payload = error_payload(&err, RequestId::new());
        if let Body::Json(s) = payload.body {
            assert!(s.contains("\"retryAfter\":5"));
        } else {
            panic!("expected JSON body");
        }
    }
}
