use modelcheck_common::NameError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx response other than 404.
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    InvalidName(#[from] NameError),
    #[error("unsupported by this backend: {0}")]
    Unsupported(String),
}

impl ClientError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == 404 {
            ClientError::NotFound(body)
        } else {
            ClientError::Status { status, body }
        }
    }

    /// HTTP status carried by the error, if the backend answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::NotFound(_) => Some(404),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let e = ClientError::status(404, "model not found");
        assert!(e.is_not_found());
        assert_eq!(e.http_status(), Some(404));

        let e = ClientError::status(422, "state transition in progress");
        assert!(!e.is_not_found());
        assert_eq!(e.http_status(), Some(422));
        assert!(e.to_string().contains("422"));

        assert_eq!(ClientError::Decode("x".into()).http_status(), None);
    }
}
