use std::fmt::{self, Display};

use serde_json::json;
use warp::http::StatusCode;

use super::schema::RelationKind;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{field}: {info}")]
    Validation { field: &'static str, info: String },

    #[error("{0}")]
    Conflict(Conflict),

    #[error("{0} not found")]
    NotFound(Missing),

    #[error("You can't subscribe to yourself")]
    SelfReference,

    #[error("No free short code found after {attempts} attempts")]
    Capacity { attempts: u64 },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Query(#[from] QueryError),

    #[error("{0}")]
    Cache(#[from] CacheError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(field: &'static str, info: impl Into<String>) -> Self {
        Self::Validation {
            field,
            info: info.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized(String::from(
            "You don't have permission to perform this action",
        ))
    }

    /// HTTP status the outer layer should answer with.
    pub fn code(&self) -> u16 {
        match self {
            Error::Validation { .. } | Error::Conflict(_) | Error::SelfReference => 400,
            Error::Unauthorized(_) => 401,
            Error::NotFound(_) => 404,
            Error::Capacity { .. } => 503,
            Error::Query(_) | Error::Cache(_) | Error::Internal(_) => 500,
        }
    }

    pub fn into_reply(self) -> impl warp::Reply {
        let status =
            StatusCode::from_u16(self.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                log::error!("{self}");
                String::from("Internal server error")
            }
            _ => self.to_string(),
        };

        warp::reply::with_status(warp::reply::json(&json!({ "errors": message })), status)
    }
}

impl warp::reject::Reject for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    Relation(RelationKind),
    Subscription,
    ShortCode,
    Username,
    Email,
    Tag,
}

impl Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Conflict::Relation(RelationKind::Favorite) => "Recipe is already in favorites",
            Conflict::Relation(RelationKind::ShoppingCart) => {
                "Recipe is already in the shopping cart"
            }
            Conflict::Subscription => "You are already subscribed to this user",
            Conflict::ShortCode => "Short code is already taken",
            Conflict::Username => "A user with that username already exists",
            Conflict::Email => "A user with that email already exists",
            Conflict::Tag => "A tag with that name or slug already exists",
        };
        write!(f, "{message}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Recipe,
    User,
    ShortLink,
    Relation(RelationKind),
    Subscription,
}

impl Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Missing::Recipe => "Recipe",
            Missing::User => "User",
            Missing::ShortLink => "Short link",
            Missing::Relation(RelationKind::Favorite) => "Favorite",
            Missing::Relation(RelationKind::ShoppingCart) => "Shopping cart entry",
            Missing::Subscription => "Subscription",
        };
        write!(f, "{message}")
    }
}

#[derive(Debug)]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query failed: {}", self.info)
    }
}

impl std::error::Error for QueryError {}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(e),
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(e),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(String::from("Unknown error")),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        Error::Query(QueryError::from(value))
    }
}

#[derive(Debug)]
pub struct CacheError {
    info: String,
}

impl CacheError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cache failed: {}", self.info)
    }
}

impl std::error::Error for CacheError {}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(value: redis::RedisError) -> Self {
        Error::Cache(CacheError::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(Error::validation("tags", "empty").code(), 400);
        assert_eq!(Error::Conflict(Conflict::Subscription).code(), 400);
        assert_eq!(Error::SelfReference.code(), 400);
        assert_eq!(Error::NotFound(Missing::Recipe).code(), 404);
        assert_eq!(Error::unauthorized().code(), 401);
        assert_eq!(Error::Capacity { attempts: 10 }.code(), 503);
        assert_eq!(Error::Internal(String::from("boom")).code(), 500);
    }

    #[test]
    fn messages_name_the_failing_thing() {
        assert_eq!(
            Error::validation("cooking_time", "must be at least 1").to_string(),
            "cooking_time: must be at least 1"
        );
        assert_eq!(
            Error::NotFound(Missing::Relation(RelationKind::ShoppingCart)).to_string(),
            "Shopping cart entry not found"
        );
        assert_eq!(
            Error::Conflict(Conflict::Relation(RelationKind::Favorite)).to_string(),
            "Recipe is already in favorites"
        );
    }

    #[tokio::test]
    async fn replies_with_status_and_json_body() {
        use warp::Reply;

        let response = Error::NotFound(Missing::Recipe).into_reply().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = warp::hyper::body::to_bytes(response.into_body())
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"errors":"Recipe not found"}"#);
    }

    #[tokio::test]
    async fn internal_details_stay_out_of_replies() {
        use warp::Reply;

        let response = Error::Internal(String::from("pool exploded"))
            .into_reply()
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = warp::hyper::body::to_bytes(response.into_body())
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"errors":"Internal server error"}"#);
    }
}
