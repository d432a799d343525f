use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Transaction};

use crate::{
    error::{Conflict, Error, Missing},
    repository::RecipeRepository,
    schema::{
        Id, IngredientInput, LinkedRecipeTag, NewRecipe, Recipe, RecipeDraft, RecipeFilter,
        RecipePart, RelationKind,
    },
};

use super::{map_constraint, PgStore};

/// Fails with a field-level validation error when any of `ids` is missing from `table`.
async fn ensure_known(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    field: &'static str,
    ids: &[Id],
) -> Result<(), Error> {
    let found: Vec<(Id,)> = sqlx::query_as(&format!("SELECT id FROM {table} WHERE id = ANY($1)"))
        .bind(ids)
        .fetch_all(&mut **tx)
        .await?;
    let found: HashSet<Id> = found.into_iter().map(|row| row.0).collect();

    match ids.iter().find(|id| !found.contains(id)) {
        Some(id) => Err(Error::validation(field, format!("{id} doesn't exist"))),
        None => Ok(()),
    }
}

async fn insert_parts(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    parts: &[IngredientInput],
) -> Result<(), Error> {
    if parts.is_empty() {
        return Ok(());
    }
    ensure_known(
        tx,
        "ingredients",
        "ingredients",
        &parts.iter().map(|p| p.id).collect::<Vec<Id>>(),
    )
    .await?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    builder.push_values(parts, |mut row, part| {
        row.push_bind(recipe_id)
            .push_bind(part.id)
            .push_bind(part.amount);
    });

    builder.build().execute(&mut **tx).await.map_err(|e| {
        map_constraint(e, |constraint| match constraint {
            "unique_recipe_ingredient" => Some(Error::validation(
                "ingredients",
                "Every ingredient must be listed once",
            )),
            "recipe_ingredient_amount_positive" => {
                Some(Error::validation("amount", "Amount must be at least 1"))
            }
            _ => None,
        })
    })?;

    Ok(())
}

async fn insert_tags(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    tags: &[Id],
) -> Result<(), Error> {
    if tags.is_empty() {
        return Ok(());
    }
    ensure_known(tx, "tags", "tags", tags).await?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    builder.push_values(tags, |mut row, tag| {
        row.push_bind(recipe_id).push_bind(*tag);
    });

    builder.build().execute(&mut **tx).await.map_err(|e| {
        map_constraint(e, |constraint| match constraint {
            "unique_recipe_tag" => Some(Error::validation("tags", "Every tag must be listed once")),
            _ => None,
        })
    })?;

    Ok(())
}

#[async_trait]
impl RecipeRepository for PgStore {
    async fn create_recipe(&self, recipe: NewRecipe) -> Result<Recipe, Error> {
        let NewRecipe {
            author_id,
            short_code,
            draft,
        } = recipe;
        let mut tx = self.pool.begin().await?;

        let row: Recipe = sqlx::query_as(
            "
            INSERT INTO recipes (author_id, name, image, text, cooking_time, short_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        ",
        )
        .bind(author_id)
        .bind(draft.name)
        .bind(draft.image)
        .bind(draft.text)
        .bind(draft.cooking_time)
        .bind(short_code)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            map_constraint(e, |constraint| match constraint {
                "unique_recipe_short_code" => Some(Error::Conflict(Conflict::ShortCode)),
                "recipes_author_id_fkey" => Some(Error::NotFound(Missing::User)),
                "recipe_cooking_time_range" => Some(Error::validation(
                    "cooking_time",
                    "Cooking time must be between 1 and 1440 minutes",
                )),
                _ => None,
            })
        })?;

        insert_parts(&mut tx, row.id, &draft.ingredients).await?;
        insert_tags(&mut tx, row.id, &draft.tags).await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn replace_recipe(&self, id: Id, draft: RecipeDraft) -> Result<Recipe, Error> {
        let mut tx = self.pool.begin().await?;

        let row: Option<Recipe> = sqlx::query_as(
            "
            UPDATE recipes SET name = $1, image = $2, text = $3, cooking_time = $4
            WHERE id = $5
            RETURNING *
        ",
        )
        .bind(draft.name)
        .bind(draft.image)
        .bind(draft.text)
        .bind(draft.cooking_time)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Err(Error::NotFound(Missing::Recipe)),
        };

        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_parts(&mut tx, id, &draft.ingredients).await?;

        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_tags(&mut tx, id, &draft.tags).await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, Error> {
        let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        viewer: Option<Id>,
    ) -> Result<Vec<Recipe>, Error> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT r.* FROM recipes r WHERE TRUE");

        if let Some(author) = filter.author {
            builder.push(" AND r.author_id = ").push_bind(author);
        }

        if !filter.tags.is_empty() {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                     WHERE rt.recipe_id = r.id AND t.slug = ANY(",
                )
                .push_bind(filter.tags.clone())
                .push("))");
        }

        if let Some(viewer) = viewer {
            let flags = [
                (RelationKind::Favorite, filter.is_favorited),
                (RelationKind::ShoppingCart, filter.is_in_shopping_cart),
            ];
            for (kind, flag) in flags {
                let Some(flag) = flag else { continue };

                builder
                    .push(if flag { " AND EXISTS" } else { " AND NOT EXISTS" })
                    .push(
                        " (SELECT 1 FROM user_recipe_relations rel \
                         WHERE rel.recipe_id = r.id AND rel.kind = ",
                    )
                    .push_bind(kind)
                    .push(" AND rel.user_id = ")
                    .push_bind(viewer)
                    .push(")");
            }
        }

        builder.push(" ORDER BY r.pub_date DESC, r.id DESC");

        let rows: Vec<Recipe> = builder
            .build_query_as::<Recipe>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn list_recipe_parts(&self, recipe_ids: &[Id]) -> Result<Vec<RecipePart>, Error> {
        let rows: Vec<RecipePart> = sqlx::query_as(
            "
            SELECT ri.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name,
                i.measurement_unit AS measurement_unit, ri.amount AS amount
            FROM recipe_ingredients ri
            INNER JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ANY($1)
        ",
        )
        .bind(recipe_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_recipe_tags(&self, recipe_ids: &[Id]) -> Result<Vec<LinkedRecipeTag>, Error> {
        let rows: Vec<LinkedRecipeTag> = sqlx::query_as(
            "
            SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name, t.slug AS slug
            FROM recipe_tags rt
            INNER JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = ANY($1)
            ORDER BY t.name
        ",
        )
        .bind(recipe_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn short_code_exists(&self, code: &str) -> Result<bool, Error> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM recipes WHERE short_code = $1)")
                .bind(code)
                .fetch_one(&self.pool)
                .await?;

        Ok(row.0)
    }

    async fn short_code_count(&self, length: usize) -> Result<u64, Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE char_length(short_code) = $1")
                .bind(length as i32)
                .fetch_one(&self.pool)
            .await?;

        Ok(row.0.max(0) as u64)
    }

    async fn find_by_short_code(&self, code: &str) -> Result<Option<Id>, Error> {
        let row: Option<(Id,)> = sqlx::query_as("SELECT id FROM recipes WHERE short_code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.0))
    }

    async fn recipes_by_authors(
        &self,
        authors: &[Id],
        limit: Option<i64>,
    ) -> Result<Vec<Recipe>, Error> {
        let rows: Vec<Recipe> = sqlx::query_as(
            "
            SELECT id, author_id, name, image, text, cooking_time, short_code, pub_date
            FROM (
                SELECT r.*,
                    ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS author_rank
                FROM recipes r
                WHERE r.author_id = ANY($1)
            ) ranked
            WHERE $2::BIGINT IS NULL OR author_rank <= $2
            ORDER BY pub_date DESC, id DESC
        ",
        )
        .bind(authors)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn recipe_counts_by_authors(&self, authors: &[Id]) -> Result<HashMap<Id, i64>, Error> {
        let rows: Vec<(Id, i64)> = sqlx::query_as(
            "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
        )
        .bind(authors)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}
