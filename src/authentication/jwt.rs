use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::constants::SESSION_LIFETIME_HOURS;
use crate::error::CoreError;
use crate::schema::{User, UserRole, Uuid};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(user: &User) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(SESSION_LIFETIME_HOURS)).timestamp();

        Self {
            user_id: user.id,
            username: user.username.to_owned(),
            role: user.role,
            iat,
            exp,
        }
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Local::now().timestamp()).is_negative()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            username: value.username,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

/// Who is calling. Anonymous callers own no favorites, cart or subscriptions.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Anonymous,
    Authenticated(SessionData),
}

impl Identity {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(session) => Some(session.user_id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }
}

impl From<SessionData> for Identity {
    fn from(value: SessionData) -> Self {
        Identity::Authenticated(value)
    }
}

pub(crate) fn session_key(secret: &[u8]) -> Result<Hmac<Sha256>, CoreError> {
    Hmac::new_from_slice(secret)
        .map_err(|_| CoreError::Unauthorized(String::from("Invalid session key")))
}

pub fn verify_jwt_session(token: &str, secret: &[u8]) -> Result<JwtSessionData, CoreError> {
    let key = session_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| CoreError::Unauthorized(String::from("Invalid session; Invalid token")))?;

    if session.is_expired() {
        return Err(CoreError::Unauthorized(String::from(
            "Invalid session; Token expired",
        )));
    }

    Ok(session)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jwt::SignWithKey;

    pub(crate) fn user(id: Uuid, role: UserRole) -> User {
        User {
            id,
            email: format!("user{id}@example.com"),
            username: format!("user{id}"),
            first_name: String::from("Test"),
            last_name: String::from("User"),
            role,
        }
    }

    pub(crate) fn sign(claims: &JwtSessionData, secret: &[u8]) -> String {
        let key = session_key(secret).expect("key");
        claims.clone().sign_with_key(&key).expect("sign")
    }

    #[test]
    fn valid_token_round_trips() {
        let claims = JwtSessionData::new(&user(4, UserRole::Admin));
        let token = sign(&claims, b"secret");

        let session: SessionData = verify_jwt_session(&token, b"secret")
            .expect("verify")
            .into();
        assert_eq!(session.user_id, 4);
        assert!(session.is_admin);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign(&JwtSessionData::new(&user(1, UserRole::User)), b"secret");
        let err = verify_jwt_session(&token, b"other").unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = JwtSessionData::new(&user(1, UserRole::User));
        claims.exp = Local::now().timestamp() - 60;
        let token = sign(&claims, b"secret");

        assert!(matches!(
            verify_jwt_session(&token, b"secret"),
            Err(CoreError::Unauthorized(_))
        ));
    }

    #[test]
    fn anonymous_identity_has_no_user() {
        assert_eq!(Identity::Anonymous.user_id(), None);
        assert!(!Identity::Anonymous.is_authenticated());

        let session: SessionData = JwtSessionData::new(&user(9, UserRole::User)).into();
        let identity = Identity::from(session);
        assert_eq!(identity.user_id(), Some(9));
        assert!(identity.is_authenticated());
    }
}
