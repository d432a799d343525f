use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::Error;

pub type Id = i32;

#[derive(
    Clone, Copy, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

/// Which user-recipe membership table a row belongs to.
#[derive(
    Clone, Copy, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "relation_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Favorite,
    ShoppingCart,
}

impl TryFrom<&str> for RelationKind {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "favorite" => Ok(Self::Favorite),
            "shopping_cart" => Ok(Self::ShoppingCart),
            _ => Err(Error::validation("relation", "Invalid variant")),
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Already hashed.
    pub password: String,
    pub role: UserRole,
}

/// Sign-up form, password still in plain text.
#[derive(Deserialize, Clone, Debug)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub is_subscribed: bool,
}

impl UserProfile {
    pub fn from_user(user: User, is_subscribed: bool) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar: user.avatar,
            is_subscribed,
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub slug: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct NewTag {
    pub name: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub short_code: String,
    pub pub_date: DateTime<Utc>,
}

/// The compact card returned by favorite/cart actions and followee listings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ShortRecipe {
    pub id: Id,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<&Recipe> for ShortRecipe {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.to_owned(),
            image: recipe.image.to_owned(),
            cooking_time: recipe.cooking_time,
        }
    }
}

/// A recipe ingredient line joined with its reference data.
#[derive(sqlx::FromRow, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RecipePart {
    #[serde(skip_serializing)]
    pub recipe_id: Id,
    #[serde(rename = "id")]
    pub ingredient_id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Clone, Debug, PartialEq)]
pub struct LinkedRecipeTag {
    pub recipe_id: Id,
    pub id: Id,
    pub name: String,
    pub slug: String,
}

impl From<LinkedRecipeTag> for Tag {
    fn from(value: LinkedRecipeTag) -> Self {
        Self {
            id: value.id,
            name: value.name,
            slug: value.slug,
        }
    }
}

/// Raw join row consumed by the shopping list aggregation.
#[derive(sqlx::FromRow, Clone, Copy, Debug, PartialEq, Eq)]
pub struct IngredientAmount {
    pub ingredient_id: Id,
    pub amount: i32,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct IngredientInput {
    pub id: Id,
    pub amount: i32,
}

/// Client supplied recipe contents, used both for creation and for full updates.
#[derive(Deserialize, Clone, Debug)]
pub struct RecipeDraft {
    pub name: String,
    /// Reference to an already stored image asset.
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub ingredients: Vec<IngredientInput>,
    pub tags: Vec<Id>,
}

#[derive(Clone, Debug)]
pub struct NewRecipe {
    pub author_id: Id,
    pub short_code: String,
    pub draft: RecipeDraft,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    /// Tag slugs, any of which must match.
    pub tags: Vec<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct AnnotatedRecipe {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RecipeRow {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipePart>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(sqlx::FromRow, Serialize, Clone, Debug, PartialEq)]
pub struct Subscription {
    pub follower_id: Id,
    pub followee_id: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Followee {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub recipes: Vec<ShortRecipe>,
    pub recipes_count: i64,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ShoppingListLine {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

impl Display for ShoppingListLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) - {}",
            self.name, self.measurement_unit, self.total_amount
        )
    }
}
