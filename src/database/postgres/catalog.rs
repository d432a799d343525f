use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use crate::{
    error::{Conflict, Error},
    repository::CatalogRepository,
    schema::{Id, Ingredient, NewIngredient, NewTag, Tag},
};

use super::{map_constraint, PgStore};

/// Two binds per row keeps a batch well under Postgres' 65535 parameter cap.
const INGREDIENT_BATCH_SIZE: usize = 1_000;

#[async_trait]
impl CatalogRepository for PgStore {
    async fn insert_ingredients(&self, ingredients: Vec<NewIngredient>) -> Result<u64, Error> {
        if ingredients.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for batch in ingredients.chunks(INGREDIENT_BATCH_SIZE) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
            builder.push_values(batch, |mut row, ingredient| {
                row.push_bind(ingredient.name.clone())
                    .push_bind(ingredient.measurement_unit.clone());
            });
            builder.push(" ON CONFLICT DO NOTHING");

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    async fn get_ingredients(&self, ids: &[Id]) -> Result<Vec<Ingredient>, Error> {
        let rows: Vec<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn search_ingredients(&self, prefix: &str) -> Result<Vec<Ingredient>, Error> {
        let pattern = format!(
            "{}%",
            prefix
                .to_lowercase()
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );

        let rows: Vec<Ingredient> = sqlx::query_as(
            "SELECT * FROM ingredients WHERE LOWER(name) LIKE $1 ORDER BY name, id",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn insert_tag(&self, tag: NewTag) -> Result<Tag, Error> {
        let row: Tag = sqlx::query_as("INSERT INTO tags (name, slug) VALUES ($1, $2) RETURNING *")
            .bind(tag.name)
            .bind(tag.slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                map_constraint(e, |constraint| match constraint {
                    "unique_tag_name" | "unique_tag_slug" => Some(Error::Conflict(Conflict::Tag)),
                    _ => None,
                })
            })?;

        Ok(row)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        let rows: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingredient_batches_fit_the_bind_limit() {
        assert!(INGREDIENT_BATCH_SIZE * 2 <= u16::MAX as usize);
    }
}
