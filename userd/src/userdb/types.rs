use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user account, the only entity kept by the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique, immutable user identifier
    pub id: String,
    /// Display name, not unique
    pub profile_name: String,
    /// Unique name used to authenticate
    pub login_name: String,
    /// Opaque hash produced by the configured password hasher
    pub login_password_hash: String,
    /// Unique email address
    pub email: String,
    /// Set only through the verification flow
    #[serde(default)]
    pub email_verified: bool,
    /// Outstanding reset token, unique while present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_password_token: Option<String>,
    /// When the outstanding reset token was issued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_password_token_issued: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new, unverified user without a reset token
    pub fn new(
        id: String,
        profile_name: String,
        email: String,
        login_name: String,
        login_password_hash: String,
    ) -> Self {
        Self {
            id,
            profile_name,
            login_name,
            login_password_hash,
            email,
            email_verified: false,
            reset_password_token: None,
            reset_password_token_issued: None,
        }
    }
}

/// Ways to locate a stored user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSearchField {
    Id(String),
    LoginName(String),
    Email(String),
    ResetPasswordToken(String),
}

impl fmt::Display for UserSearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id={id}"),
            Self::LoginName(login_name) => write!(f, "login_name={login_name}"),
            Self::Email(email) => write!(f, "email={email}"),
            // Tokens are credentials and stay out of logs
            Self::ResetPasswordToken(_) => write!(f, "reset_password_token=<redacted>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_user() -> User {
        User::new(
            "u1".to_string(),
            "Alice".to_string(),
            "alice@example.com".to_string(),
            "alice".to_string(),
            "$argon2id$hash".to_string(),
        )
    }

    #[test]
    fn test_user_new() {
        // Given user information
        let user = sample_user();

        // Then the user starts unverified and without a reset token
        assert_eq!(user.id, "u1");
        assert_eq!(user.login_name, "alice");
        assert_eq!(user.email, "alice@example.com");
        assert!(!user.email_verified);
        assert!(user.reset_password_token.is_none());
        assert!(user.reset_password_token_issued.is_none());
    }

    #[test]
    fn test_unset_token_is_omitted_from_json() {
        let json = serde_json::to_value(sample_user()).unwrap();

        assert!(json.get("reset_password_token").is_none());
        assert!(json.get("reset_password_token_issued").is_none());
        assert_eq!(json["email_verified"], false);
    }

    #[test]
    fn test_json_round_trip_with_token() {
        // Given a user with an outstanding reset token
        let mut user = sample_user();
        user.reset_password_token = Some("tok".to_string());
        user.reset_password_token_issued = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        // When serializing and deserializing
        let json = serde_json::to_string(&user).unwrap();
        let decoded: User = serde_json::from_str(&json).unwrap();

        // Then every field survives
        assert_eq!(decoded, user);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{"id":"u1","profile_name":"","login_name":"a","login_password_hash":"h","email":"a@b"}"#;

        let user: User = serde_json::from_str(json).unwrap();

        assert!(!user.email_verified);
        assert!(user.reset_password_token.is_none());
    }

    #[test]
    fn test_search_field_display_redacts_token() {
        let field = UserSearchField::ResetPasswordToken("secret-token".to_string());

        let shown = field.to_string();

        assert!(!shown.contains("secret-token"));
        assert_eq!(
            UserSearchField::LoginName("alice".to_string()).to_string(),
            "login_name=alice"
        );
    }
}
