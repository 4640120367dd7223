use thiserror::Error;

/// Failure of a single call through the request pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Timeout, I/O or connectivity loss. Never retried automatically.
    #[error("network failure: {message}")]
    Network { message: String },
    /// Matched the unauthorized status set (or a business-level
    /// unauthorized code, in which case `status` is `None`) and survived
    /// the refresh attempt.
    #[error("unauthorized: {message}")]
    Unauthorized { status: Option<u16>, message: String },
    #[error("http status {status}: {message}")]
    Http { status: u16, message: String },
    /// Transport succeeded but the payload carried an application error.
    #[error("{message} (code {code})")]
    Business { code: i64, message: String },
    #[error("invalid response: {message}")]
    Decode { message: String },
    /// The request could not be built, e.g. a path that does not resolve
    /// against the base URL.
    #[error("invalid request: {message}")]
    Request { message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { status, .. } => *status,
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        ApiError::Decode {
            message: message.into(),
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Network {
            message: err.to_string(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_become_network_failures() {
        let err: ApiError = TransportError::Timeout("read".into()).into();
        assert!(matches!(err, ApiError::Network { .. }));
        assert!(!err.is_unauthorized());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn status_is_exposed_when_present() {
        let err = ApiError::Http {
            status: 502,
            message: "Bad Gateway".into(),
        };
        assert_eq!(err.status(), Some(502));
        let err = ApiError::Unauthorized {
            status: None,
            message: "login required".into(),
        };
        assert_eq!(err.status(), None);
        assert!(err.is_unauthorized());
    }
}
