//! Persistence seams consumed by the operations in [`crate::actions`].
//!
//! Every multi-step write (`create_recipe`, `replace_recipe`) is executed by
//! the implementation inside a single transaction. Batched reads take a slice
//! of ids and must cost a constant number of round trips.
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use super::{
    error::Error,
    schema::{
        Id, Ingredient, IngredientAmount, LinkedRecipeTag, NewIngredient, NewRecipe, NewTag,
        NewUser, Recipe, RecipeDraft, RecipeFilter, RecipePart, RelationKind, Tag, User,
    },
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict::Username` or `Conflict::Email`.
    async fn insert_user(&self, user: NewUser) -> Result<User, Error>;

    async fn get_user(&self, id: Id) -> Result<Option<User>, Error>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    async fn get_users(&self, ids: &[Id]) -> Result<Vec<User>, Error>;

    async fn set_avatar(&self, id: Id, avatar: Option<String>) -> Result<(), Error>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Rows colliding on (name, measurement_unit) are skipped. Returns the number inserted.
    async fn insert_ingredients(&self, ingredients: Vec<NewIngredient>) -> Result<u64, Error>;

    async fn get_ingredients(&self, ids: &[Id]) -> Result<Vec<Ingredient>, Error>;

    /// Case-insensitive name prefix search, ordered by name.
    async fn search_ingredients(&self, prefix: &str) -> Result<Vec<Ingredient>, Error>;

    async fn insert_tag(&self, tag: NewTag) -> Result<Tag, Error>;

    async fn list_tags(&self) -> Result<Vec<Tag>, Error>;
}

#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Inserts the recipe with its full ingredient and tag set atomically.
    ///
    /// Unknown ingredient or tag ids fail with a validation error and a
    /// taken short code with `Conflict::ShortCode`; nothing is written in
    /// either case.
    async fn create_recipe(&self, recipe: NewRecipe) -> Result<Recipe, Error>;

    /// Updates scalar fields, clears and rebuilds the ingredient and tag sets
    /// atomically.
    async fn replace_recipe(&self, id: Id, draft: RecipeDraft) -> Result<Recipe, Error>;

    async fn delete_recipe(&self, id: Id) -> Result<bool, Error>;

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, Error>;

    /// Newest first. Relation filters apply only when `viewer` is known.
    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        viewer: Option<Id>,
    ) -> Result<Vec<Recipe>, Error>;

    async fn list_recipe_parts(&self, recipe_ids: &[Id]) -> Result<Vec<RecipePart>, Error>;

    async fn list_recipe_tags(&self, recipe_ids: &[Id]) -> Result<Vec<LinkedRecipeTag>, Error>;

    async fn short_code_exists(&self, code: &str) -> Result<bool, Error>;

    /// Codes of exactly `length` symbols.
    async fn short_code_count(&self, length: usize) -> Result<u64, Error>;

    async fn find_by_short_code(&self, code: &str) -> Result<Option<Id>, Error>;

    /// Newest first, at most `limit` per author when given.
    async fn recipes_by_authors(
        &self,
        authors: &[Id],
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, Error>;

    async fn recipe_counts_by_authors(&self, authors: &[Id]) -> Result<HashMap<Id, i64>, Error>;
}

#[async_trait]
pub trait RelationRepository: Send + Sync {
    /// Returns false when the pair already existed.
    async fn insert_relation(&self, kind: RelationKind, user: Id, recipe: Id)
        -> Result<bool, Error>;

    /// Returns false when there was nothing to remove.
    async fn delete_relation(&self, kind: RelationKind, user: Id, recipe: Id)
        -> Result<bool, Error>;

    /// The subset of `among` the user holds a relation of `kind` with.
    async fn related_recipe_ids(
        &self,
        kind: RelationKind,
        user: Id,
        among: &[Id],
    ) -> Result<HashSet<Id>, Error>;

    async fn all_related_recipe_ids(&self, kind: RelationKind, user: Id) -> Result<Vec<Id>, Error>;

    async fn ingredient_amounts(&self, recipe_ids: &[Id]) -> Result<Vec<IngredientAmount>, Error>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Returns false when the edge already existed.
    async fn insert_subscription(&self, follower: Id, followee: Id) -> Result<bool, Error>;

    async fn delete_subscription(&self, follower: Id, followee: Id) -> Result<bool, Error>;

    /// The subset of `among` followed by `follower`.
    async fn followed_ids(&self, follower: Id, among: &[Id]) -> Result<HashSet<Id>, Error>;

    /// Newest subscription first.
    async fn list_followees(&self, follower: Id) -> Result<Vec<User>, Error>;
}

pub trait Store:
    UserRepository + CatalogRepository + RecipeRepository + RelationRepository + SubscriptionRepository
{
}

impl<T> Store for T where
    T: UserRepository
        + CatalogRepository
        + RecipeRepository
        + RelationRepository
        + SubscriptionRepository
{
}
