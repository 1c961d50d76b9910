use reqwest::StatusCode;
use thiserror::Error;

/// Error type shared by every tigo-rs crate.
///
/// Variants separate authentication failures, HTTP status failures, transport
/// failures and malformed payloads so callers can react to each differently
/// (for example re-prompting for credentials only on [`TigoError::Auth`]).
///
/// # Examples
///
/// ```
/// use tigo_core::error::{TigoError, Result};
///
/// fn require_rating(watts: f64) -> Result<f64> {
///     if watts <= 0.0 {
///         return Err(TigoError::InsufficientData("system has no power rating".into()));
///     }
///     Ok(watts)
/// }
///
/// assert!(require_rating(0.0).is_err());
/// ```
#[derive(Error, Debug)]
pub enum TigoError {
    /// Login was rejected, or a token was refused even after logging in again
    #[error("authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    /// The API answered with a non-success status
    #[error("API request to {endpoint} failed with status {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The request never produced a response
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not the JSON we expected
    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed CSV data at line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid time range: start {start} is not before end {end}")]
    InvalidTimeRange { start: String, end: String },

    #[error("invalid data level: {0}")]
    InvalidLevel(String),

    #[error("missing credentials: set TIGO_USERNAME and TIGO_PASSWORD")]
    MissingCredentials,

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, TigoError>`.
pub type Result<T> = std::result::Result<T, TigoError>;

impl TigoError {
    /// Create an API status error.
    pub fn api(endpoint: impl Into<String>, status: StatusCode, message: impl Into<String>) -> Self {
        Self::Api {
            endpoint: endpoint.into(),
            status: status.as_u16(),
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn http(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Create a JSON decode error.
    pub fn decode(endpoint: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Create a CSV parse error.
    pub fn csv(line: usize, message: impl Into<String>) -> Self {
        Self::Csv {
            line,
            message: message.into(),
        }
    }

    /// Whether repeating the same request could succeed.
    ///
    /// Transport failures, rate limiting (429) and server errors (5xx) are
    /// retryable; everything else is a property of the request itself.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let error = TigoError::api("/systems", StatusCode::NOT_FOUND, "no such system");
        assert_eq!(
            error.to_string(),
            "API request to /systems failed with status 404: no such system"
        );
        assert_eq!(error.status(), Some(404));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(TigoError::api("/x", StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(TigoError::api("/x", StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(!TigoError::api("/x", StatusCode::BAD_REQUEST, "").is_retryable());
        assert!(!TigoError::MissingCredentials.is_retryable());
    }

    #[test]
    fn test_auth_error_not_retryable() {
        let error = TigoError::Auth {
            status: 401,
            message: "bad password".into(),
        };
        assert!(!error.is_retryable());
        assert!(error.to_string().contains("bad password"));
    }

    #[test]
    fn test_csv_error() {
        let error = TigoError::csv(7, "bad timestamp");
        assert_eq!(
            error.to_string(),
            "malformed CSV data at line 7: bad timestamp"
        );
    }

    #[test]
    fn test_decode_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = TigoError::decode("/users/login", json_err);
        assert!(error.to_string().contains("/users/login"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: TigoError = io_err.into();
        assert!(error.to_string().contains("I/O error"));
    }
}
