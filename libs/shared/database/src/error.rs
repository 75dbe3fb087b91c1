use thiserror::Error;

/// Failure reported by the backing document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Index not ready: {0}")]
    IndexNotReady(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Failed to decode record: {0}")]
    Decode(String),

    #[error("Database error: {0}")]
    Other(String),
}

// PostgREST reports a cold schema cache with these codes while the
// database is still coming up or rebuilding after a migration.
const NOT_READY_CODES: [&str; 2] = ["PGRST002", "PGRST001"];

impl DbError {
    /// Only infrastructure hiccups are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::IndexNotReady(_) | DbError::Unavailable(_))
    }

    /// Classify an error response from the store by status code and body.
    pub fn from_response(status: u16, body: &str) -> Self {
        if matches!(status, 401 | 403) {
            return DbError::PermissionDenied(body.to_string());
        }

        if Self::mentions_index_not_ready(body) {
            return DbError::IndexNotReady(body.to_string());
        }

        match status {
            404 => DbError::NotFound(body.to_string()),
            409 => DbError::Duplicate(body.to_string()),
            408 | 429 | 502 | 503 | 504 => DbError::Unavailable(body.to_string()),
            _ => DbError::Other(format!("status {}: {}", status, body)),
        }
    }

    fn mentions_index_not_ready(body: &str) -> bool {
        let lower = body.to_ascii_lowercase();

        NOT_READY_CODES.iter().any(|code| body.contains(code))
            || lower.contains("not ready")
            || (lower.contains("index")
                && (lower.contains("building")
                    || lower.contains("missing")
                    || lower.contains("requires an index")))
    }
}

impl From<reqwest::Error> for DbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            DbError::Unavailable(err.to_string())
        } else if err.is_decode() {
            DbError::Decode(err.to_string())
        } else {
            DbError::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Decode(err.to_string())
    }
}
