mod utils;

use recipe_box_sdk::{
    actions::{clear_avatar, get_profile, login_user, register_user, set_avatar},
    error::{Conflict, Error},
    jwt::{verify_jwt_session, Viewer},
    memory::MemoryStore,
    schema::Registration,
    Config,
};
use utils::session;

fn registration(username: &str, email: &str) -> Registration {
    Registration {
        email: email.to_string(),
        username: username.to_string(),
        first_name: String::from("Grace"),
        last_name: String::from("Hopper"),
        password: String::from("cobol-forever"),
    }
}

#[tokio::test]
async fn test_registered_user_can_log_in() {
    let store = MemoryStore::new();
    let config = Config::default();

    let user = register_user(registration("grace", "grace@example.com"), &store)
        .await
        .unwrap();
    assert_ne!(user.password, "cobol-forever");

    let token = login_user("grace@example.com", "cobol-forever", &config, &store)
        .await
        .unwrap();
    let claims = verify_jwt_session(&token, &config.jwt_secret).unwrap();
    assert_eq!(claims.user_id, user.id);

    let err = login_user("grace@example.com", "wrong-password", &config, &store)
        .await
        .unwrap_err();
    assert_eq!(err.code(), 401);
    assert!(login_user("nobody@example.com", "cobol-forever", &config, &store)
        .await
        .is_err());
}

#[tokio::test]
async fn test_username_and_email_are_unique() {
    let store = MemoryStore::new();
    register_user(registration("grace", "grace@example.com"), &store)
        .await
        .unwrap();

    let err = register_user(registration("grace", "other@example.com"), &store)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(Conflict::Username)));

    let err = register_user(registration("hopper", "grace@example.com"), &store)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(Conflict::Email)));
}

#[tokio::test]
async fn test_avatar_can_be_set_and_cleared() {
    let store = MemoryStore::new();
    let user = register_user(registration("grace", "grace@example.com"), &store)
        .await
        .unwrap();
    let session = session(&user);

    set_avatar(String::from("users/avatars/grace.png"), &session, &store)
        .await
        .unwrap();
    let profile = get_profile(user.id, &Viewer::Anonymous, &store)
        .await
        .unwrap();
    assert_eq!(profile.avatar.as_deref(), Some("users/avatars/grace.png"));

    assert!(set_avatar(String::new(), &session, &store).await.is_err());

    clear_avatar(&session, &store).await.unwrap();
    let profile = get_profile(user.id, &Viewer::Anonymous, &store)
        .await
        .unwrap();
    assert_eq!(profile.avatar, None);
}
