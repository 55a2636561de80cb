//! Append-only audit log writer/reader (§4.10).
//!
//! Backed by `sqlx`'s sqlite driver so the service stays self-contained
//! (no external database to stand up for what is, functionally, a small
//! append-only table). The query builder is a thin, explicit wrapper around
//! `sqlx::query` bind calls — every value reaches the database as a bound
//! parameter, never interpolated into the SQL string.

use crate::errors::AuditError;
use crate::ids::AuditId;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Sign,
    KeyUpload,
    KeyRotate,
}

impl AuditAction {
    fn as_str(self) -> &'static str {
        match self {
            AuditAction::Sign => "sign",
            AuditAction::KeyUpload => "key_upload",
            AuditAction::KeyRotate => "key_rotate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAuditRecord {
    pub request_id: String,
    pub action: AuditAction,
    pub issuer: String,
    pub subject: String,
    pub key_id: String,
    pub success: bool,
    pub error_code: Option<String>,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: String,
    pub timestamp: String,
    pub request_id: String,
    pub action: String,
    pub issuer: String,
    pub subject: String,
    pub key_id: String,
    pub success: bool,
    pub error_code: Option<String>,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub action: Option<String>,
    pub subject: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl AuditFilter {
    /// Validates and fills defaults: `limit` 1..=1000 (default 100),
    /// `offset` >= 0 (default 0).
    pub fn normalized(self) -> Result<Self, AuditError> {
        let limit = self.limit.unwrap_or(100);
        if !(1..=1000).contains(&limit) {
            return Err(AuditError::InvalidFilter(format!(
                "limit must be between 1 and 1000, got {limit}"
            )));
        }
        Ok(AuditFilter {
            limit: Some(limit),
            offset: Some(self.offset.unwrap_or(0)),
            ..self
        })
    }
}

/// Escapes `%`, `_`, and `\` for use inside a `LIKE` pattern, then wraps the
/// result in `%...%`. Callers pair this with `ESCAPE '\'` in the query.
fn like_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '%' => escaped.push_str("\\%"),
            '_' => escaped.push_str("\\_"),
            other => escaped.push(other),
        }
    }
    format!("%{escaped}%")
}

/// Method-chained builder over the `audit_logs` query; `build` returns the
/// SQL string and the caller binds parameters in the same order `build`'s
/// internal clauses were appended, via [`AuditQueryBuilder::bind_into`].
#[derive(Default)]
struct AuditQueryBuilder {
    clauses: Vec<String>,
    subject_like: Option<String>,
    action_eq: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    limit: u32,
    offset: u32,
}

impl AuditQueryBuilder {
    fn from_filter(filter: &AuditFilter) -> Self {
        let mut builder = AuditQueryBuilder {
            limit: filter.limit.unwrap_or(100),
            offset: filter.offset.unwrap_or(0),
            ..Default::default()
        };

        if let Some(action) = &filter.action {
            builder.clauses.push("action = ?".to_string());
            builder.action_eq = Some(action.clone());
        }
        if let Some(subject) = &filter.subject {
            builder
                .clauses
                .push("subject LIKE ? ESCAPE '\\'".to_string());
            builder.subject_like = Some(like_escape(subject));
        }
        if let Some(start) = &filter.start_date {
            builder.clauses.push("timestamp >= ?".to_string());
            builder.start_date = Some(start.clone());
        }
        if let Some(end) = &filter.end_date {
            builder.clauses.push("timestamp <= ?".to_string());
            builder.end_date = Some(end.clone());
        }
        builder
    }

    fn build(&self) -> String {
        let mut query = "SELECT id, timestamp, request_id, action, issuer, subject, key_id, success, error_code, metadata FROM audit_logs".to_string();
        if !self.clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&self.clauses.join(" AND "));
        }
        query.push_str(" ORDER BY timestamp DESC LIMIT ? OFFSET ?");
        query
    }
}

pub struct AuditStore {
    pool: SqlitePool,
}

impl AuditStore {
    pub async fn open(path: &str) -> Result<Self, AuditError> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{path}?mode=rwc")
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|e| AuditError::Query(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS audit_logs (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                request_id TEXT NOT NULL,
                action TEXT NOT NULL,
                issuer TEXT NOT NULL,
                subject TEXT NOT NULL,
                key_id TEXT NOT NULL,
                success INTEGER NOT NULL,
                error_code TEXT,
                metadata TEXT
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| AuditError::Query(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_logs_timestamp ON audit_logs (timestamp DESC)")
            .execute(&pool)
            .await
            .map_err(|e| AuditError::Query(e.to_string()))?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_logs_subject ON audit_logs (subject)")
            .execute(&pool)
            .await
            .map_err(|e| AuditError::Query(e.to_string()))?;

        Ok(AuditStore { pool })
    }

    /// Write one audit row. Per §4.10/§7, write failures are logged and
    /// swallowed by the caller — this function still returns a `Result` so
    /// the one call site that matters (the dispatcher's background task)
    /// can log it, but nothing upstream of that call site should ever
    /// propagate the error to the client.
    pub async fn write(&self, record: NewAuditRecord) -> Result<(), AuditError> {
        let id = AuditId::new().to_string();
        let timestamp = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO audit_logs (id, timestamp, request_id, action, issuer, subject, key_id, success, error_code, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(timestamp)
        .bind(record.request_id)
        .bind(record.action.as_str())
        .bind(record.issuer)
        .bind(record.subject)
        .bind(record.key_id)
        .bind(record.success as i64)
        .bind(record.error_code)
        .bind(record.metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::Query(e.to_string()))?;

        Ok(())
    }

    pub async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let filter = filter.normalized()?;
        let builder = AuditQueryBuilder::from_filter(&filter);
        let sql = builder.build();

        let mut query = sqlx::query(&sql);
        if let Some(action) = &builder.action_eq {
            query = query.bind(action);
        }
        if let Some(subject) = &builder.subject_like {
            query = query.bind(subject);
        }
        if let Some(start) = &builder.start_date {
            query = query.bind(start);
        }
        if let Some(end) = &builder.end_date {
            query = query.bind(end);
        }
        query = query.bind(builder.limit as i64).bind(builder.offset as i64);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuditError::Query(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| AuditRecord {
                id: row.get("id"),
                timestamp: row.get("timestamp"),
                request_id: row.get("request_id"),
                action: row.get("action"),
                issuer: row.get("issuer"),
                subject: row.get("subject"),
                key_id: row.get("key_id"),
                success: row.get::<i64, _>("success") != 0,
                error_code: row.get("error_code"),
                metadata: row.get("metadata"),
            })
            .collect())
    }
}
