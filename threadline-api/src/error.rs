use anyhow::Context;
use serde_json::json;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Please log in first")]
    Unauthorized,

    #[error("An action is already being submitted for {0}")]
    Conflict(String),

    #[error("Server unreachable: {0}")]
    Unreachable(String),

    #[error("Server rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Unreachable(_) => StatusCode::BAD_GATEWAY,
            Error::Rejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Error::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// JSON error body, in the `{"error": ...}` shape the backend uses
    pub fn contents(&self) -> Vec<u8> {
        let message = match self {
            Error::Rejected { message, .. } => message.clone(),
            e => e.to_string(),
        };
        serde_json::to_vec(&json!({
            "error": message,
            "body": null,
        }))
        .expect("serializing error body")
    }

    /// Maps a non-success response to an error.
    ///
    /// Never fails: a body that is not the expected JSON is used verbatim as the message.
    pub fn parse(status: http::StatusCode, body: &[u8]) -> Error {
        if status == http::StatusCode::UNAUTHORIZED {
            return Error::Unauthorized;
        }
        let message = Self::parse_message(body)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());
        Error::Rejected {
            status: status.as_u16(),
            message,
        }
    }

    fn parse_message(body: &[u8]) -> anyhow::Result<String> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let err = data
            .get("error")
            .context("error contents has no error field")?;
        Ok(match err.as_str() {
            Some(msg) => String::from(msg),
            None => err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    #[test]
    fn unauthorized_status_is_special() {
        assert_eq!(
            Error::parse(StatusCode::UNAUTHORIZED, br#"{"error":"Invalid token"}"#),
            Error::Unauthorized,
        );
    }

    #[test]
    fn error_field_becomes_message() {
        assert_eq!(
            Error::parse(StatusCode::BAD_REQUEST, br#"{"error":"NO_SUCH_COMMENT","body":null}"#),
            Error::Rejected {
                status: 400,
                message: String::from("NO_SUCH_COMMENT"),
            },
        );
    }

    #[test]
    fn non_json_body_is_kept_verbatim() {
        assert_eq!(
            Error::parse(StatusCode::BAD_GATEWAY, b"upstream down\n"),
            Error::Rejected {
                status: 502,
                message: String::from("upstream down"),
            },
        );
    }

    #[test]
    fn contents_parse_back() {
        let err = Error::Rejected {
            status: 400,
            message: String::from("Invalid comment content"),
        };
        assert_eq!(Error::parse(err.status_code(), &err.contents()), err);
        assert_eq!(
            Error::parse(Error::Unauthorized.status_code(), &Error::Unauthorized.contents()),
            Error::Unauthorized,
        );
    }
}
