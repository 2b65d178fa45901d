//! Error types for Bitbucket API operations.

use thiserror::Error;

use super::transport::HttpError;

/// Errors that can occur when talking to the Bitbucket API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected the credentials.
    #[error("authentication failed ({status}) for {url}")]
    Auth { status: u16, url: String },

    /// Any other non-success status, including 404.
    #[error("API request failed with status {status} for {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    /// The creation-date window contained no commits.
    #[error("no commits found near creation date of {repo}")]
    NoCommitsFound { repo: String },

    /// The body did not match the expected shape.
    #[error("malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    /// A full name that is not `workspace/name`.
    #[error("invalid repository name format: {0}")]
    InvalidRepoName(String),

    /// Pagination did not terminate.
    #[error("pagination aborted at {url}: {reason}")]
    Pagination { url: String, reason: String },
}

impl From<HttpError> for ApiError {
    fn from(err: HttpError) -> Self {
        ApiError::Transport(err.to_string())
    }
}

impl ApiError {
    /// Map a non-success status to the matching variant.
    pub fn from_status(status: u16, url: &str, body: &[u8]) -> Self {
        if status == 401 || status == 403 {
            return ApiError::Auth {
                status,
                url: url.to_string(),
            };
        }

        ApiError::Api {
            status,
            url: url.to_string(),
            message: error_message(body),
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. } | ApiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short message suitable for a CSV cell or an inline listing line.
    pub fn short_message(&self) -> String {
        match self {
            ApiError::Transport(_) => "Network error".to_string(),
            ApiError::Auth { status, .. } => format!("HTTP {}: authentication failed", status),
            ApiError::Api {
                status, message, ..
            } => {
                if message.is_empty() {
                    format!("HTTP {}", status)
                } else if message.chars().count() > 50 {
                    let truncated: String = message.chars().take(47).collect();
                    format!("HTTP {}: {}...", status, truncated)
                } else {
                    format!("HTTP {}: {}", status, message)
                }
            }
            ApiError::NoCommitsFound { .. } => "No commits near creation date".to_string(),
            ApiError::MalformedResponse { .. } => "Malformed response".to_string(),
            ApiError::InvalidRepoName(name) => format!("Invalid name: {}", name),
            ApiError::Pagination { reason, .. } => format!("Pagination: {}", reason),
        }
    }
}

/// Pull `error.message` out of a Bitbucket error body, falling back to the
/// raw text.
fn error_message(body: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return parsed.error.message;
    }

    String::from_utf8_lossy(body).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_and_forbidden_map_to_auth() {
        let err = ApiError::from_status(401, "https://api/x", b"");
        assert!(matches!(err, ApiError::Auth { status: 401, .. }));

        let err = ApiError::from_status(403, "https://api/x", b"");
        assert!(matches!(err, ApiError::Auth { status: 403, .. }));
    }

    #[test]
    fn test_not_found_stays_api_error() {
        let body = br#"{"type": "error", "error": {"message": "Repository not found"}}"#;
        let err = ApiError::from_status(404, "https://api/x", body);

        match err {
            ApiError::Api {
                status, message, ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Repository not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plain_text_body_is_kept() {
        let err = ApiError::from_status(502, "https://api/x", b"Bad Gateway\n");
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.short_message(), "HTTP 502: Bad Gateway");
    }

    #[test]
    fn test_short_message_truncates_long_bodies() {
        let err = ApiError::Api {
            status: 500,
            url: "https://api/x".to_string(),
            message: "x".repeat(80),
        };
        let short = err.short_message();
        assert!(short.ends_with("..."));
        assert!(short.len() < 70);
    }

    #[test]
    fn test_transport_error_from_http_error() {
        let err: ApiError = HttpError::Transport("connection refused".to_string()).into();
        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(err.status(), None);
    }
}
