/// Opaque session credential handed out by the backend's login endpoint
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct AuthToken(pub String);

impl AuthToken {
    pub fn stub() -> AuthToken {
        AuthToken(String::from("stub-token"))
    }

    /// Value of the `Authorization` header carrying this token
    pub fn header_value(&self) -> String {
        format!("bearer {}", self.0)
    }

    /// Parses an `Authorization` header value, accepting any casing of the scheme
    pub fn from_header(value: &str) -> Option<AuthToken> {
        let (scheme, token) = value.trim().split_once(' ')?;
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return None;
        }
        Some(AuthToken(String::from(token)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let tok = AuthToken(String::from("abc.def"));
        assert_eq!(tok.header_value(), "bearer abc.def");
        assert_eq!(AuthToken::from_header(&tok.header_value()), Some(tok));
    }

    #[test]
    fn header_scheme_is_case_insensitive() {
        assert_eq!(
            AuthToken::from_header("Bearer xyz"),
            Some(AuthToken(String::from("xyz"))),
        );
        assert_eq!(AuthToken::from_header("Basic xyz"), None);
        assert_eq!(AuthToken::from_header("bearer "), None);
        assert_eq!(AuthToken::from_header("bearer"), None);
    }
}
