use std::{convert::Infallible, sync::Arc};

use warp::{reject::Rejection, Filter};

use crate::constants::SESSION_COOKIE;

use super::jwt::{verify_jwt_session, SessionData, Viewer};

/// Resolves the optional session cookie. Missing or invalid sessions fall back to anonymous.
pub fn with_viewer(
    secret: Arc<str>,
) -> impl Filter<Extract = (Viewer,), Error = Infallible> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE).map(move |session: Option<String>| {
        let session = session.and_then(|token| match verify_jwt_session(&token, &secret) {
            Ok(data) => Some(SessionData::from(data)),
            Err(e) => {
                log::trace!("> Ignoring session: {e}");
                None
            }
        });
        Viewer::from(session)
    })
}

pub fn with_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::cookie::<String>(SESSION_COOKIE).and_then(move |session: String| {
        let secret = secret.clone();
        async move {
            match verify_jwt_session(&session, &secret) {
                Ok(data) => Ok(SessionData::from(data)),
                Err(e) => Err(warp::reject::custom(e)),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::{config::Config, schema::{User, UserRole}};

    use super::super::jwt::generate_jwt_session;
    use super::*;

    fn token(config: &Config) -> String {
        let user = User {
            id: 3,
            email: String::from("a@b.c"),
            username: String::from("viewer"),
            first_name: String::from("A"),
            last_name: String::from("B"),
            password: String::new(),
            role: UserRole::Admin,
            avatar: None,
        };
        generate_jwt_session(&user, config).unwrap()
    }

    #[tokio::test]
    async fn viewer_filter_never_rejects() {
        let filter = with_viewer(Arc::from("secret"));

        let viewer: Result<Viewer, Infallible> = warp::test::request().filter(&filter).await;
        assert_eq!(viewer.unwrap(), Viewer::Anonymous);

        let viewer = warp::test::request()
            .header("cookie", "session=garbage")
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(viewer, Viewer::Anonymous);
    }

    #[tokio::test]
    async fn viewer_filter_reads_a_valid_session() {
        let config = Config::default();
        let filter = with_viewer(Arc::from(config.jwt_secret.as_str()));

        let viewer = warp::test::request()
            .header("cookie", format!("session={}", token(&config)))
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(viewer.user_id(), Some(3));
    }

    #[tokio::test]
    async fn session_filter_rejects_missing_cookie() {
        let filter = with_session(Arc::from("secret"));
        assert!(warp::test::request().filter(&filter).await.is_err());
    }
}
