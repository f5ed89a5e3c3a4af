use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("Nonce with key `{0}` is already registered")]
    DuplicateRegistration(String),
    #[error("Nonce with key `{0}` is not registered")]
    UnknownKey(String),
    #[error("Format expects {expected} arguments, {given} given")]
    FormatArity { expected: usize, given: usize },
    #[error("Argument {position} does not fit conversion `%{conversion}`")]
    FormatType { position: usize, conversion: char },
    #[error("Invalid format: {0}")]
    FormatSpec(String),
    #[error("Failed to generate session token")]
    GenToken,
    #[error("Invalid secret key")]
    SecretKey,
    #[error("Failed to parse url")]
    URL,
    #[error("AJAX referer check failed")]
    AjaxRefererCheck,
    #[error("Admin referer check failed for action `{action}`")]
    AdminRefererCheck { action: String },
}

impl Error {
    /// Status a web layer should answer with when this error ends a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::AjaxRefererCheck | Error::AdminRefererCheck { .. } => StatusCode::FORBIDDEN,
            Error::UnknownKey(_) => StatusCode::NOT_FOUND,
            Error::URL | Error::FormatArity { .. } | Error::FormatType { .. } | Error::FormatSpec(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::DuplicateRegistration(_) | Error::GenToken | Error::SecretKey => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::Error;

    #[test]
    fn test_referer_failures_are_forbidden() {
        assert_eq!(Error::AjaxRefererCheck.status_code(), StatusCode::FORBIDDEN);
        let admin = Error::AdminRefererCheck {
            action: "delete-post-5".to_string(),
        };
        assert_eq!(admin.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            admin.to_string(),
            "Admin referer check failed for action `delete-post-5`"
        );
    }

    #[test]
    fn test_format_errors_are_bad_request() {
        let err = Error::FormatArity {
            expected: 2,
            given: 1,
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Format expects 2 arguments, 1 given");
    }
}
