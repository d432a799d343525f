use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::config::Config;
use crate::database::schema::User;
use crate::error::Error;
use crate::schema::{Id, UserRole};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, username: String, role: UserRole, lifetime: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(Error::unauthorized());
        }
        Ok(())
    }

    /// Own resources need `own`, anybody else's need `all`.
    pub fn authenticate_owner(
        &self,
        owner: Id,
        own: ActionType,
        all: ActionType,
    ) -> Result<(), Error> {
        match owner == self.user_id {
            true => self.authenticate(own),
            false => self.authenticate(all),
        }
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        Self {
            user_id: value.user_id,
            username: value.username,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

/// Whoever is making the request.
#[derive(Debug, Clone, PartialEq)]
pub enum Viewer {
    Anonymous,
    Authenticated(SessionData),
}

impl Viewer {
    pub fn user_id(&self) -> Option<Id> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Authenticated(session) => Some(session.user_id),
        }
    }

    pub fn session(&self) -> Result<&SessionData, Error> {
        match self {
            Viewer::Anonymous => Err(Error::Unauthorized(String::from(
                "Authentication credentials were not provided",
            ))),
            Viewer::Authenticated(session) => Ok(session),
        }
    }
}

impl From<Option<SessionData>> for Viewer {
    fn from(value: Option<SessionData>) -> Self {
        match value {
            Some(session) => Viewer::Authenticated(session),
            None => Viewer::Anonymous,
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Internal(format!("Invalid signing key: {e}")))
}

pub fn generate_jwt_session(user: &User, config: &Config) -> Result<String, Error> {
    let key = signing_key(&config.jwt_secret)?;
    let claims = JwtSessionData::new(
        user.id,
        user.username.to_owned(),
        user.role,
        Duration::hours(config.session_lifetime_hours),
    );

    claims
        .sign_with_key(&key)
        .map_err(|e| Error::Internal(format!("Failed to sign session: {e}")))
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| Error::Unauthorized(String::from("Invalid session; Invalid token")))?;

    let now = Utc::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(Error::Unauthorized(String::from(
            "Invalid session; Token expired",
        )));
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Ada"),
            last_name: String::from("Cook"),
            password: String::new(),
            role: UserRole::User,
            avatar: None,
        }
    }

    #[test]
    fn signed_session_round_trips_with_the_same_secret() {
        let config = Config::default();
        let token = generate_jwt_session(&user(), &config).unwrap();

        let session: SessionData = verify_jwt_session(&token, &config.jwt_secret)
            .unwrap()
            .into();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.username, "cook");
        assert!(!session.is_admin);
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = generate_jwt_session(&user(), &Config::default()).unwrap();
        let err = verify_jwt_session(&token, "another secret").unwrap_err();
        assert_eq!(err.code(), 401);
    }

    #[test]
    fn expired_session_is_rejected() {
        let key = signing_key("secret").unwrap();
        let token = JwtSessionData::new(7, String::from("cook"), UserRole::User, Duration::hours(-1))
            .sign_with_key(&key)
            .unwrap();

        let err = verify_jwt_session(&token, "secret").unwrap_err();
        assert_eq!(err.to_string(), "Invalid session; Token expired");
    }

    #[test]
    fn anonymous_viewer_has_no_session() {
        assert_eq!(Viewer::Anonymous.user_id(), None);
        assert!(Viewer::Anonymous.session().is_err());
        assert_eq!(Viewer::from(None).user_id(), None);
    }
}
