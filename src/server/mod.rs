//! HTTP listener for the eight fixed routes (§6).
//!
//! A minimal blocking listener rather than the teacher's coroutine-scheduled
//! router: this service has a small, static route table instead of an
//! OpenAPI-driven dispatch table, so a thread-per-connection `tiny_http`
//! server is enough. Each accepted connection is handled on its own OS
//! thread so concurrent sign requests don't block one another.

mod request;
pub mod response;

use crate::audit::AuditFilter;
use crate::dispatcher::{self, AppState};
use crate::errors::ApiError;
use crate::ids::RequestId;
use crate::middleware::cors_headers_for;
use request::ParsedRequest;
use response::{bytes_payload, error_payload, json_payload, text_payload, write_response, Payload};
use serde::Serialize;
use std::sync::Arc;
use tiny_http::{Method, Server};

pub fn run(state: Arc<AppState>) -> std::io::Result<()> {
    let server = Server::http(&state.config.bind_addr).map_err(std::io::Error::other)?;
    tracing::info!(addr = %state.config.bind_addr, "signing service listening");

    for request in server.incoming_requests() {
        let state = state.clone();
        std::thread::spawn(move || handle_connection(state, request));
    }

    Ok(())
}

fn handle_connection(state: Arc<AppState>, mut request: tiny_http::Request) {
    let parsed = ParsedRequest::from(&mut request);
    let request_id = RequestId::from_header_or_new(parsed.header("X-Request-ID"));
    let origin = parsed.header("Origin").map(str::to_string);
    let cors_headers = cors_headers_for(origin.as_deref(), &state.config.allowed_origins);

    let span = tracing::info_span!("request", %request_id, method = %parsed.method, path = %parsed.path);
    let _guard = span.enter();

    let result = route(&state, &parsed, request_id);
    let payload = result.unwrap_or_else(|err| {
        tracing::warn!(code = err.code.as_str(), status = err.status, "request failed");
        error_payload(&err, request_id)
    });

    write_response(request, payload, request_id, cors_headers);
}

fn route(state: &AppState, req: &ParsedRequest, request_id: RequestId) -> Result<Payload, ApiError> {
    match (&req.method, req.path.as_str()) {
        (Method::Get, "/health") => Ok(health(state)),
        (Method::Get, "/public-key") => public_key(state, req),
        (Method::Post, "/sign") => sign(state, req, request_id),
        (Method::Post, "/admin/keys") => admin_upload(state, req, request_id),
        (Method::Get, "/admin/keys") => Ok(admin_list(state)),
        (Method::Get, path) if path.starts_with("/admin/keys/") && path.ends_with("/public") => {
            admin_public_key(state, path)
        }
        (Method::Delete, path) if path.starts_with("/admin/keys/") => admin_delete(state, path, request_id),
        (Method::Get, "/admin/audit") => admin_audit(state, req),
        _ => Err(ApiError::not_found("no such route")),
    }
}

#[derive(Serialize)]
struct HealthChecks {
    #[serde(rename = "keyStorage")]
    key_storage: bool,
    database: bool,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    timestamp: String,
    version: &'static str,
    checks: HealthChecks,
}

fn health(state: &AppState) -> Payload {
    let health = dispatcher::handle_health(state);
    let body = HealthBody {
        status: if health.healthy { "ok" } else { "degraded" },
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            key_storage: health.key_storage_ok,
            database: health.database_ok,
        },
    };
    json_payload(if health.healthy { 200 } else { 503 }, &body)
}

fn public_key(state: &AppState, req: &ParsedRequest) -> Result<Payload, ApiError> {
    let key_id = req
        .query("keyId")
        .ok_or_else(|| ApiError::invalid_request("keyId query parameter is required"))?;
    let armored = dispatcher::handle_public_key(state, key_id)?;
    Ok(bytes_payload(200, armored.into_bytes(), "application/pgp-keys"))
}

fn sign(state: &AppState, req: &ParsedRequest, request_id: RequestId) -> Result<Payload, ApiError> {
    let claims = dispatcher::authenticate(state, req.header("Authorization"))?;
    let key_id = req.query("keyId");

    let outcome = dispatcher::handle_sign(
        state,
        request_id,
        &claims.identity,
        &claims.claims.iss,
        key_id,
        &req.body,
    )?;

    let mut payload = text_payload(200, outcome.result.signature);
    payload.extra_headers.push(("X-RateLimit-Remaining".to_string(), outcome.remaining.to_string()));
    payload.extra_headers.push(("X-RateLimit-Reset".to_string(), outcome.reset_at.to_string()));
    Ok(payload)
}

#[derive(serde::Deserialize)]
struct UploadBody {
    #[serde(rename = "armoredPrivateKey")]
    armored_private_key: String,
    #[serde(rename = "keyId")]
    key_id: String,
}

#[derive(Serialize)]
struct UploadResponseBody {
    success: bool,
    #[serde(rename = "keyId")]
    key_id: String,
    fingerprint: String,
    algorithm: String,
    #[serde(rename = "userId")]
    user_id: String,
}

fn admin_upload(state: &AppState, req: &ParsedRequest, request_id: RequestId) -> Result<Payload, ApiError> {
    dispatcher::authenticate_admin(state, req.header("Authorization"))?;
    let body: UploadBody = serde_json::from_slice(&req.body)
        .map_err(|e| ApiError::invalid_request(format!("invalid request body: {e}")))?;

    let result = dispatcher::handle_admin_upload(state, request_id, &body.armored_private_key, &body.key_id)?;
    Ok(json_payload(
        201,
        &UploadResponseBody {
            success: true,
            key_id: result.key_id,
            fingerprint: result.fingerprint,
            algorithm: result.algorithm,
            user_id: result.user_id,
        },
    ))
}

#[derive(Serialize)]
struct ListResponseBody {
    keys: Vec<crate::key_store::KeyMetadata>,
}

fn admin_list(state: &AppState) -> Payload {
    json_payload(200, &ListResponseBody { keys: dispatcher::handle_admin_list(state) })
}

fn admin_public_key(state: &AppState, path: &str) -> Result<Payload, ApiError> {
    let key_id = path
        .strip_prefix("/admin/keys/")
        .and_then(|p| p.strip_suffix("/public"))
        .ok_or_else(|| ApiError::not_found("no such route"))?;
    let armored = dispatcher::handle_admin_public_key(state, key_id)?;
    Ok(bytes_payload(200, armored.into_bytes(), "application/pgp-keys"))
}

#[derive(Serialize)]
struct DeleteResponseBody {
    success: bool,
    deleted: bool,
}

fn admin_delete(state: &AppState, path: &str, request_id: RequestId) -> Result<Payload, ApiError> {
    let key_id = path.strip_prefix("/admin/keys/").unwrap_or_default();
    let deleted = dispatcher::handle_admin_delete(state, request_id, key_id)?;
    Ok(json_payload(200, &DeleteResponseBody { success: true, deleted }))
}

#[derive(Serialize)]
struct AuditResponseBody {
    logs: Vec<AuditRecordBody>,
    count: usize,
}

#[derive(Serialize)]
struct AuditRecordBody {
    id: String,
    timestamp: String,
    #[serde(rename = "requestId")]
    request_id: String,
    action: String,
    issuer: String,
    subject: String,
    #[serde(rename = "keyId")]
    key_id: String,
    success: bool,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<String>,
}

fn admin_audit(state: &AppState, req: &ParsedRequest) -> Result<Payload, ApiError> {
    dispatcher::authenticate_admin(state, req.header("Authorization"))?;

    let filter = AuditFilter {
        limit: req.query("limit").and_then(|v| v.parse().ok()),
        offset: req.query("offset").and_then(|v| v.parse().ok()),
        action: req.query("action").map(str::to_string),
        subject: req.query("subject").map(str::to_string),
        start_date: req.query("startDate").map(str::to_string),
        end_date: req.query("endDate").map(str::to_string),
    };

    let records = dispatcher::handle_admin_audit(state, filter)?;
    let logs: Vec<AuditRecordBody> = records
        .into_iter()
        .map(|r| AuditRecordBody {
            id: r.id,
            timestamp: r.timestamp,
            request_id: r.request_id,
            action: r.action,
            issuer: r.issuer,
            subject: r.subject,
            key_id: r.key_id,
            success: r.success,
            error_code: r.error_code,
            metadata: r.metadata,
        })
        .collect();
    let count = logs.len();
    Ok(json_payload(200, &AuditResponseBody { logs, count }))
}
