use std::collections::HashMap;

use crate::{
    authentication::permissions::ActionType,
    error::{Conflict, Error, Missing},
    jwt::SessionData,
    repository::{RecipeRepository, SubscriptionRepository, UserRepository},
    schema::{Followee, Id, ShortRecipe, User, UserProfile},
};

/// Adds the edge `follower -> followee`.
pub async fn follow<S: SubscriptionRepository + ?Sized>(
    follower: Id,
    followee: Id,
    store: &S,
) -> Result<(), Error> {
    if follower == followee {
        return Err(Error::SelfReference);
    }

    if !store.insert_subscription(follower, followee).await? {
        return Err(Error::Conflict(Conflict::Subscription));
    }

    log::info!("User {follower} subscribed to {followee}");
    Ok(())
}

/// Removes the edge `follower -> followee`, failing with `NotFound` if absent.
pub async fn unfollow<S: SubscriptionRepository + ?Sized>(
    follower: Id,
    followee: Id,
    store: &S,
) -> Result<(), Error> {
    if !store.delete_subscription(follower, followee).await? {
        return Err(Error::NotFound(Missing::Subscription));
    }

    log::info!("User {follower} unsubscribed from {followee}");
    Ok(())
}

pub async fn is_following<S: SubscriptionRepository + ?Sized>(
    follower: Id,
    followee: Id,
    store: &S,
) -> Result<bool, Error> {
    if follower == followee {
        return Ok(false);
    }
    let followed = store.followed_ids(follower, &[followee]).await?;
    Ok(followed.contains(&followee))
}

fn check_recipes_limit(recipes_limit: Option<i64>) -> Result<(), Error> {
    match recipes_limit {
        Some(limit) if limit < 0 => Err(Error::validation(
            "recipes_limit",
            "Must be a non-negative integer",
        )),
        _ => Ok(()),
    }
}

/// Builds followee cards with a constant number of store round trips.
async fn followee_cards<S: RecipeRepository + ?Sized>(
    users: Vec<User>,
    recipes_limit: Option<i64>,
    store: &S,
) -> Result<Vec<Followee>, Error> {
    if users.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Id> = users.iter().map(|u| u.id).collect();
    let recipes = store.recipes_by_authors(&ids, recipes_limit).await?;
    let counts = store.recipe_counts_by_authors(&ids).await?;

    let mut by_author: HashMap<Id, Vec<ShortRecipe>> = HashMap::new();
    for recipe in &recipes {
        by_author
            .entry(recipe.author_id)
            .or_default()
            .push(ShortRecipe::from(recipe));
    }

    Ok(users
        .into_iter()
        .map(|user| {
            let id = user.id;
            Followee {
                profile: UserProfile::from_user(user, true),
                recipes: by_author.remove(&id).unwrap_or_default(),
                recipes_count: counts.get(&id).copied().unwrap_or(0),
            }
        })
        .collect())
}

/// Follows `followee` and returns its card as the subscriptions list shows it.
pub async fn subscribe<S>(
    followee: Id,
    recipes_limit: Option<i64>,
    session: &SessionData,
    store: &S,
) -> Result<Followee, Error>
where
    S: UserRepository + RecipeRepository + SubscriptionRepository + ?Sized,
{
    session.authenticate(ActionType::ManageSubscriptions)?;
    check_recipes_limit(recipes_limit)?;

    let user = match store.get_user(followee).await? {
        Some(user) => user,
        None => return Err(Error::NotFound(Missing::User)),
    };

    follow(session.user_id, followee, store).await?;

    let mut cards = followee_cards(vec![user], recipes_limit, store).await?;
    cards
        .pop()
        .ok_or_else(|| Error::Internal(String::from("Followee card went missing")))
}

pub async fn unsubscribe<S: SubscriptionRepository + ?Sized>(
    followee: Id,
    session: &SessionData,
    store: &S,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageSubscriptions)?;
    unfollow(session.user_id, followee, store).await
}

/// Everyone the session user follows, newest subscription first, each with at
/// most `recipes_limit` recipes and the uncapped recipe count.
pub async fn list_followees<S>(
    recipes_limit: Option<i64>,
    session: &SessionData,
    store: &S,
) -> Result<Vec<Followee>, Error>
where
    S: RecipeRepository + SubscriptionRepository + ?Sized,
{
    session.authenticate(ActionType::ManageSubscriptions)?;
    check_recipes_limit(recipes_limit)?;

    let users = store.list_followees(session.user_id).await?;
    followee_cards(users, recipes_limit, store).await
}
