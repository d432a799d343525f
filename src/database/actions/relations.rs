use std::collections::HashSet;

use crate::{
    authentication::permissions::ActionType,
    error::{Conflict, Error, Missing},
    jwt::{SessionData, Viewer},
    repository::{RecipeRepository, RelationRepository},
    schema::{AnnotatedRecipe, Id, Recipe, RelationKind, ShortRecipe},
};

/// Favorite and cart memberships of the viewer among a set of recipes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RelationFlags {
    favorited: HashSet<Id>,
    in_cart: HashSet<Id>,
}

impl RelationFlags {
    pub fn is_favorited(&self, recipe: Id) -> bool {
        self.favorited.contains(&recipe)
    }

    pub fn is_in_shopping_cart(&self, recipe: Id) -> bool {
        self.in_cart.contains(&recipe)
    }
}

/// Two set lookups for an authenticated viewer, none for an anonymous one,
/// however many recipes are asked about.
pub async fn relation_flags<S: RelationRepository + ?Sized>(
    viewer: &Viewer,
    recipe_ids: &[Id],
    store: &S,
) -> Result<RelationFlags, Error> {
    let user = match viewer.user_id() {
        Some(user) if !recipe_ids.is_empty() => user,
        _ => return Ok(RelationFlags::default()),
    };

    Ok(RelationFlags {
        favorited: store
            .related_recipe_ids(RelationKind::Favorite, user, recipe_ids)
            .await?,
        in_cart: store
            .related_recipe_ids(RelationKind::ShoppingCart, user, recipe_ids)
            .await?,
    })
}

/// Attaches the viewer's relationship flags, keeping the input order.
pub async fn annotate_recipes<S: RelationRepository + ?Sized>(
    viewer: &Viewer,
    recipes: Vec<Recipe>,
    store: &S,
) -> Result<Vec<AnnotatedRecipe>, Error> {
    let ids: Vec<Id> = recipes.iter().map(|r| r.id).collect();
    let flags = relation_flags(viewer, &ids, store).await?;

    Ok(recipes
        .into_iter()
        .map(|recipe| AnnotatedRecipe {
            is_favorited: flags.is_favorited(recipe.id),
            is_in_shopping_cart: flags.is_in_shopping_cart(recipe.id),
            recipe,
        })
        .collect())
}

pub async fn add_relation<S: RecipeRepository + RelationRepository + ?Sized>(
    kind: RelationKind,
    recipe_id: Id,
    session: &SessionData,
    store: &S,
) -> Result<ShortRecipe, Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;

    let recipe = match store.get_recipe(recipe_id).await? {
        Some(recipe) => recipe,
        None => return Err(Error::NotFound(Missing::Recipe)),
    };

    if !store
        .insert_relation(kind, session.user_id, recipe_id)
        .await?
    {
        return Err(Error::Conflict(Conflict::Relation(kind)));
    }

    log::info!(
        "User {} added recipe {recipe_id} to {kind:?}",
        session.user_id
    );
    Ok(ShortRecipe::from(&recipe))
}

/// Fails with `NotFound` when there is nothing to remove.
pub async fn remove_relation<S: RelationRepository + ?Sized>(
    kind: RelationKind,
    recipe_id: Id,
    session: &SessionData,
    store: &S,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;

    if !store
        .delete_relation(kind, session.user_id, recipe_id)
        .await?
    {
        return Err(Error::NotFound(Missing::Relation(kind)));
    }

    log::info!(
        "User {} removed recipe {recipe_id} from {kind:?}",
        session.user_id
    );
    Ok(())
}

pub async fn add_to_favorites<S: RecipeRepository + RelationRepository + ?Sized>(
    recipe_id: Id,
    session: &SessionData,
    store: &S,
) -> Result<ShortRecipe, Error> {
    add_relation(RelationKind::Favorite, recipe_id, session, store).await
}

pub async fn remove_from_favorites<S: RelationRepository + ?Sized>(
    recipe_id: Id,
    session: &SessionData,
    store: &S,
) -> Result<(), Error> {
    remove_relation(RelationKind::Favorite, recipe_id, session, store).await
}

pub async fn add_to_shopping_cart<S: RecipeRepository + RelationRepository + ?Sized>(
    recipe_id: Id,
    session: &SessionData,
    store: &S,
) -> Result<ShortRecipe, Error> {
    add_relation(RelationKind::ShoppingCart, recipe_id, session, store).await
}

pub async fn remove_from_shopping_cart<S: RelationRepository + ?Sized>(
    recipe_id: Id,
    session: &SessionData,
    store: &S,
) -> Result<(), Error> {
    remove_relation(RelationKind::ShoppingCart, recipe_id, session, store).await
}
