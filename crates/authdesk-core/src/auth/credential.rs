use std::fmt;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::models::Token;

/// Bearer credential issued by `/auth/login`.
///
/// Only the access token is persisted; the refresh token lives in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    exp: Option<i64>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Expiry read from the `exp` claim, if the token is a JWT.
    /// The signature is not checked; this is for display only.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let payload = self.access_token.split('.').nth(1)?;
        let bytes = Base64UrlUnpadded::decode_vec(payload.trim_end_matches('=')).ok()?;
        let claims: Claims = serde_json::from_slice(&bytes).ok()?;
        DateTime::from_timestamp(claims.exp?, 0)
    }

    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at().map(|expiry| expiry - Utc::now())
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.time_until_expiry().map(|d| d.num_minutes().max(0))
    }

    /// True only when the token says so; unknown expiry counts as live
    pub fn is_expired(&self) -> bool {
        self.expires_at().map(|expiry| Utc::now() > expiry).unwrap_or(false)
    }
}

impl From<Token> for Credential {
    fn from(token: Token) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.signature",
            Base64UrlUnpadded::encode_string(br#"{"alg":"HS256","typ":"JWT"}"#),
            Base64UrlUnpadded::encode_string(payload.as_bytes())
        )
    }

    #[test]
    fn test_expires_at_from_jwt() {
        let exp = Utc::now().timestamp() + 30 * 60;
        let token = jwt_with_payload(&format!(r#"{{"sub":"a@b.c","exp":{}}}"#, exp));
        let credential = Credential::new(token);

        assert_eq!(credential.expires_at().map(|d| d.timestamp()), Some(exp));
        assert!(!credential.is_expired());
        let minutes = credential.minutes_until_expiry().unwrap();
        assert!((28..=30).contains(&minutes));
    }

    #[test]
    fn test_expired_jwt() {
        let exp = Utc::now().timestamp() - 60;
        let credential = Credential::new(jwt_with_payload(&format!(r#"{{"exp":{}}}"#, exp)));
        assert!(credential.is_expired());
        assert_eq!(credential.minutes_until_expiry(), Some(0));
    }

    #[test]
    fn test_opaque_token_has_no_expiry() {
        let credential = Credential::new("not-a-jwt");
        assert_eq!(credential.expires_at(), None);
        assert!(!credential.is_expired());

        let no_exp = Credential::new(jwt_with_payload(r#"{"sub":"a@b.c"}"#));
        assert_eq!(no_exp.expires_at(), None);
    }

    #[test]
    fn test_from_token_keeps_refresh_token() {
        let token = Token {
            access_token: "access".to_string(),
            token_type: "bearer".to_string(),
            refresh_token: Some("refresh".to_string()),
        };
        let credential = Credential::from(token);
        assert_eq!(credential.access_token(), "access");
        assert_eq!(credential.refresh_token(), Some("refresh"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::new("super-secret");
        assert!(!format!("{:?}", credential).contains("super-secret"));
    }
}
