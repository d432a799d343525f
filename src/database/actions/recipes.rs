use std::collections::{HashMap, HashSet};

use redis::aio::MultiplexedConnection;

use crate::{
    authentication::permissions::ActionType,
    cache::cache::rotate_recipe_binding,
    constants::{
        COOKING_TIME_MAX, COOKING_TIME_MIN, INGREDIENT_AMOUNT_MIN, RECIPE_NAME_MAX_LENGTH,
    },
    error::{Conflict, Error, Missing},
    jwt::{SessionData, Viewer},
    repository::{RecipeRepository, RelationRepository},
    schema::{Id, NewRecipe, Recipe, RecipeDraft, RecipeFilter, RecipePart, RecipeRow, Tag},
};

use super::{relations::relation_flags, short_links::ShortCodeGenerator};

/// Checks everything that can be checked without the store.
pub fn validate_draft(draft: &RecipeDraft) -> Result<(), Error> {
    let name_length = draft.name.trim().chars().count();
    if name_length == 0 || name_length > RECIPE_NAME_MAX_LENGTH {
        return Err(Error::validation(
            "name",
            format!("Must be between 1 and {RECIPE_NAME_MAX_LENGTH} characters"),
        ));
    }
    if draft.text.trim().is_empty() {
        return Err(Error::validation("text", "This field is required"));
    }
    if draft.image.trim().is_empty() {
        return Err(Error::validation("image", "This field is required"));
    }
    if !(COOKING_TIME_MIN..=COOKING_TIME_MAX).contains(&draft.cooking_time) {
        return Err(Error::validation(
            "cooking_time",
            format!("Must be between {COOKING_TIME_MIN} and {COOKING_TIME_MAX} minutes"),
        ));
    }

    if draft.ingredients.is_empty() {
        return Err(Error::validation(
            "ingredients",
            "At least one ingredient is required",
        ));
    }
    let mut seen = HashSet::new();
    for part in &draft.ingredients {
        if !seen.insert(part.id) {
            return Err(Error::validation(
                "ingredients",
                format!("Ingredient {} is listed twice", part.id),
            ));
        }
        if part.amount < INGREDIENT_AMOUNT_MIN {
            return Err(Error::validation(
                "amount",
                format!("Must be at least {INGREDIENT_AMOUNT_MIN}"),
            ));
        }
    }

    if draft.tags.is_empty() {
        return Err(Error::validation("tags", "At least one tag is required"));
    }
    let mut seen = HashSet::new();
    if let Some(tag) = draft.tags.iter().find(|tag| !seen.insert(**tag)) {
        return Err(Error::validation(
            "tags",
            format!("Tag {tag} is listed twice"),
        ));
    }

    Ok(())
}

/// Attaches tags, ingredient lines and the viewer's flags. Costs the same
/// number of store round trips for any number of recipes.
async fn build_rows<S: RecipeRepository + RelationRepository + ?Sized>(
    recipes: Vec<Recipe>,
    viewer: &Viewer,
    store: &S,
) -> Result<Vec<RecipeRow>, Error> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Id> = recipes.iter().map(|r| r.id).collect();
    let flags = relation_flags(viewer, &ids, store).await?;

    let mut parts: HashMap<Id, Vec<RecipePart>> = HashMap::new();
    for part in store.list_recipe_parts(&ids).await? {
        parts.entry(part.recipe_id).or_default().push(part);
    }

    let mut tags: HashMap<Id, Vec<Tag>> = HashMap::new();
    for tag in store.list_recipe_tags(&ids).await? {
        tags.entry(tag.recipe_id).or_default().push(tag.into());
    }

    Ok(recipes
        .into_iter()
        .map(|recipe| {
            let mut recipe_tags = tags.remove(&recipe.id).unwrap_or_default();
            recipe_tags.sort_by(|a, b| a.name.cmp(&b.name));

            RecipeRow {
                tags: recipe_tags,
                ingredients: parts.remove(&recipe.id).unwrap_or_default(),
                is_favorited: flags.is_favorited(recipe.id),
                is_in_shopping_cart: flags.is_in_shopping_cart(recipe.id),
                recipe,
            }
        })
        .collect())
}

pub async fn fetch_recipes<S: RecipeRepository + RelationRepository + ?Sized>(
    filter: &RecipeFilter,
    viewer: &Viewer,
    store: &S,
) -> Result<Vec<RecipeRow>, Error> {
    let recipes = store.list_recipes(filter, viewer.user_id()).await?;
    build_rows(recipes, viewer, store).await
}

pub async fn get_recipe_row<S: RecipeRepository + RelationRepository + ?Sized>(
    id: Id,
    viewer: &Viewer,
    store: &S,
) -> Result<RecipeRow, Error> {
    let recipe = match store.get_recipe(id).await? {
        Some(recipe) => recipe,
        None => return Err(Error::NotFound(Missing::Recipe)),
    };

    let mut rows = build_rows(vec![recipe], viewer, store).await?;
    rows.pop().ok_or(Error::NotFound(Missing::Recipe))
}

/// Fetches a recipe the session is allowed to change.
pub async fn get_recipe_mut<S: RecipeRepository + ?Sized>(
    id: Id,
    session: &SessionData,
    store: &S,
) -> Result<Recipe, Error> {
    let recipe = match store.get_recipe(id).await? {
        Some(recipe) => recipe,
        None => return Err(Error::NotFound(Missing::Recipe)),
    };

    session.authenticate_owner(
        recipe.author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    )?;
    Ok(recipe)
}

/// Stores the recipe under a fresh short code. A code taken between the
/// check and the insert is regenerated, at most as often as the generator's
/// attempt budget allows.
pub async fn create_recipe<S: RecipeRepository + RelationRepository + ?Sized>(
    draft: RecipeDraft,
    generator: &ShortCodeGenerator,
    session: &SessionData,
    store: &S,
) -> Result<RecipeRow, Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    validate_draft(&draft)?;

    let budget = generator
        .attempt_budget(store.short_code_count(generator.length()).await?)?;
    let mut conflicts: u64 = 0;
    let recipe = loop {
        let short_code = generator.generate(store).await?;
        let recipe = NewRecipe {
            author_id: session.user_id,
            short_code,
            draft: draft.clone(),
        };

        match store.create_recipe(recipe).await {
            Ok(recipe) => break recipe,
            Err(Error::Conflict(Conflict::ShortCode)) => {
                conflicts += 1;
                log::warn!("Short code taken on insert ({conflicts}/{budget})");
                if conflicts >= budget {
                    return Err(Error::Capacity {
                        attempts: conflicts,
                    });
                }
            }
            Err(e) => return Err(e),
        }
    };

    log::info!(
        "User {} created recipe {} ({})",
        session.user_id,
        recipe.id,
        recipe.short_code
    );
    let viewer = Viewer::Authenticated(session.to_owned());
    let mut rows = build_rows(vec![recipe], &viewer, store).await?;
    rows.pop()
        .ok_or_else(|| Error::Internal(String::from("Created recipe went missing")))
}

/// Replaces every field and the full ingredient and tag sets. The short code
/// and author stay as they are.
pub async fn update_recipe<S: RecipeRepository + RelationRepository + ?Sized>(
    id: Id,
    draft: RecipeDraft,
    session: &SessionData,
    store: &S,
) -> Result<RecipeRow, Error> {
    get_recipe_mut(id, session, store).await?;
    validate_draft(&draft)?;

    let recipe = store.replace_recipe(id, draft).await?;
    log::info!("User {} updated recipe {id}", session.user_id);

    let viewer = Viewer::Authenticated(session.to_owned());
    let mut rows = build_rows(vec![recipe], &viewer, store).await?;
    rows.pop().ok_or(Error::NotFound(Missing::Recipe))
}

pub async fn delete_recipe<S: RecipeRepository + ?Sized>(
    id: Id,
    session: &SessionData,
    store: &S,
) -> Result<(), Error> {
    get_recipe_mut(id, session, store).await?;

    if !store.delete_recipe(id).await? {
        return Err(Error::NotFound(Missing::Recipe));
    }

    log::info!("User {} deleted recipe {id}", session.user_id);
    Ok(())
}

/// Deletes the recipe and invalidates cached short links.
pub async fn delete_recipe_cached<S: RecipeRepository + ?Sized>(
    id: Id,
    session: &SessionData,
    store: &S,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    delete_recipe(id, session, store).await?;

    if let Err(e) = rotate_recipe_binding(cache).await {
        log::error!("Failed to invalidate recipe cache: {e}");
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::schema::IngredientInput;

    use super::*;

    fn draft() -> RecipeDraft {
        RecipeDraft {
            name: String::from("Pancakes"),
            image: String::from("recipes/images/pancakes.png"),
            text: String::from("Mix and fry."),
            cooking_time: 20,
            ingredients: vec![
                IngredientInput { id: 1, amount: 200 },
                IngredientInput { id: 2, amount: 2 },
            ],
            tags: vec![1],
        }
    }

    fn field_of(draft: &RecipeDraft) -> &'static str {
        match validate_draft(draft) {
            Err(Error::Validation { field, .. }) => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_a_complete_draft() {
        assert!(validate_draft(&draft()).is_ok());
    }

    #[test]
    fn cooking_time_is_bounded() {
        let mut d = draft();
        d.cooking_time = 0;
        assert_eq!(field_of(&d), "cooking_time");
        d.cooking_time = 1441;
        assert_eq!(field_of(&d), "cooking_time");
        d.cooking_time = 1440;
        assert!(validate_draft(&d).is_ok());
    }

    #[test]
    fn ingredients_must_be_present_unique_and_positive() {
        let mut d = draft();
        d.ingredients.clear();
        assert_eq!(field_of(&d), "ingredients");

        let mut d = draft();
        d.ingredients.push(IngredientInput { id: 1, amount: 5 });
        assert_eq!(field_of(&d), "ingredients");

        let mut d = draft();
        d.ingredients[0].amount = 0;
        assert_eq!(field_of(&d), "amount");
    }

    #[test]
    fn tags_must_be_present_and_unique() {
        let mut d = draft();
        d.tags.clear();
        assert_eq!(field_of(&d), "tags");

        let mut d = draft();
        d.tags = vec![3, 3];
        assert_eq!(field_of(&d), "tags");
    }

    #[test]
    fn text_fields_are_required() {
        let mut d = draft();
        d.name = String::from("   ");
        assert_eq!(field_of(&d), "name");

        let mut d = draft();
        d.image.clear();
        assert_eq!(field_of(&d), "image");
    }
}
