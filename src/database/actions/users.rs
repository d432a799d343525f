use crate::{
    config::Config,
    constants::{EMAIL_MAX_LENGTH, NAME_MAX_LENGTH, PASSWORD_MIN_LENGTH, USERNAME_MAX_LENGTH},
    cryptography::{hash_password, verify_password},
    error::{Error, Missing},
    jwt::{generate_jwt_session, SessionData, Viewer},
    repository::{SubscriptionRepository, UserRepository},
    schema::{Id, NewUser, Registration, User, UserProfile, UserRole},
};

use super::subscriptions::is_following;

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-')
}

pub fn validate_registration(form: &Registration) -> Result<(), Error> {
    let username_length = form.username.chars().count();
    if username_length == 0 || username_length > USERNAME_MAX_LENGTH {
        return Err(Error::validation(
            "username",
            format!("Must be between 1 and {USERNAME_MAX_LENGTH} characters"),
        ));
    }
    if !form.username.chars().all(is_username_char) {
        return Err(Error::validation(
            "username",
            "May contain only letters, digits and @/./+/-/_",
        ));
    }

    let well_formed = match form.email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !well_formed || form.email.chars().count() > EMAIL_MAX_LENGTH {
        return Err(Error::validation("email", "Enter a valid email address"));
    }

    for (field, value) in [
        ("first_name", &form.first_name),
        ("last_name", &form.last_name),
    ] {
        let length = value.trim().chars().count();
        if length == 0 || length > NAME_MAX_LENGTH {
            return Err(Error::validation(
                field,
                format!("Must be between 1 and {NAME_MAX_LENGTH} characters"),
            ));
        }
    }

    if form.password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(Error::validation(
            "password",
            format!("Must be at least {PASSWORD_MIN_LENGTH} characters"),
        ));
    }

    Ok(())
}

/// Creates a user whose password is stored as an argon2 hash.
pub async fn register_user<S: UserRepository + ?Sized>(
    form: Registration,
    store: &S,
) -> Result<User, Error> {
    validate_registration(&form)?;

    let user = store
        .insert_user(NewUser {
            password: hash_password(&form.password)?,
            email: form.email,
            username: form.username,
            first_name: form.first_name,
            last_name: form.last_name,
            role: UserRole::User,
        })
        .await?;

    log::info!("Registered user {} ({})", user.id, user.username);
    Ok(user)
}

/// Returns a signed session token.
pub async fn login_user<S: UserRepository + ?Sized>(
    email: &str,
    password: &str,
    config: &Config,
    store: &S,
) -> Result<String, Error> {
    let user = match store.find_user_by_email(email).await? {
        Some(user) => user,
        None => {
            log::warn!("Rejected login for unknown email");
            return Err(invalid_credentials());
        }
    };

    if !verify_password(password, &user.password)? {
        log::warn!("Rejected login for user {}", user.id);
        return Err(invalid_credentials());
    }

    generate_jwt_session(&user, config)
}

fn invalid_credentials() -> Error {
    Error::Unauthorized(String::from("Invalid credentials"))
}

pub async fn get_profile<S: UserRepository + SubscriptionRepository + ?Sized>(
    user_id: Id,
    viewer: &Viewer,
    store: &S,
) -> Result<UserProfile, Error> {
    let user = match store.get_user(user_id).await? {
        Some(user) => user,
        None => return Err(Error::NotFound(Missing::User)),
    };

    let is_subscribed = match viewer.user_id() {
        Some(viewer) => is_following(viewer, user_id, store).await?,
        None => false,
    };

    Ok(UserProfile::from_user(user, is_subscribed))
}

/// `avatar` is a reference to an already stored image.
pub async fn set_avatar<S: UserRepository + ?Sized>(
    avatar: String,
    session: &SessionData,
    store: &S,
) -> Result<(), Error> {
    if avatar.trim().is_empty() {
        return Err(Error::validation("avatar", "This field is required"));
    }
    store.set_avatar(session.user_id, Some(avatar)).await
}

pub async fn clear_avatar<S: UserRepository + ?Sized>(
    session: &SessionData,
    store: &S,
) -> Result<(), Error> {
    store.set_avatar(session.user_id, None).await
}
