use crate::{
    error::Error,
    repository::CatalogRepository,
    schema::{Ingredient, NewIngredient, NewTag, Tag},
};

pub async fn create_tag<S: CatalogRepository + ?Sized>(tag: NewTag, store: &S) -> Result<Tag, Error> {
    if tag.name.trim().is_empty() {
        return Err(Error::validation("name", "This field is required"));
    }
    if tag.slug.is_empty()
        || !tag
            .slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::validation(
            "slug",
            "May contain only latin letters, digits, - and _",
        ));
    }

    let tag = store.insert_tag(tag).await?;
    log::info!("Created tag {}", tag.slug);
    Ok(tag)
}

pub async fn list_tags<S: CatalogRepository + ?Sized>(store: &S) -> Result<Vec<Tag>, Error> {
    store.list_tags().await
}

/// Inserts reference ingredients, skipping ones already known. Returns how many were new.
pub async fn import_ingredients<S: CatalogRepository + ?Sized>(
    ingredients: Vec<NewIngredient>,
    store: &S,
) -> Result<u64, Error> {
    if let Some(blank) = ingredients
        .iter()
        .find(|i| i.name.trim().is_empty() || i.measurement_unit.trim().is_empty())
    {
        return Err(Error::validation(
            "ingredients",
            format!("Incomplete ingredient {:?}", blank.name),
        ));
    }

    let inserted = store.insert_ingredients(ingredients).await?;
    log::info!("Imported {inserted} ingredients");
    Ok(inserted)
}

pub async fn search_ingredients<S: CatalogRepository + ?Sized>(
    prefix: &str,
    store: &S,
) -> Result<Vec<Ingredient>, Error> {
    store.search_ingredients(prefix.trim()).await
}
