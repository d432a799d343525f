use std::collections::HashSet;

use async_trait::async_trait;

use crate::{
    error::{Error, Missing},
    repository::RelationRepository,
    schema::{Id, IngredientAmount, RelationKind},
};

use super::{map_constraint, PgStore};

#[async_trait]
impl RelationRepository for PgStore {
    async fn insert_relation(
        &self,
        kind: RelationKind,
        user: Id,
        recipe: Id,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            "INSERT INTO user_recipe_relations (kind, user_id, recipe_id) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(kind)
        .bind(user)
        .bind(recipe)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_constraint(e, |constraint| match constraint {
                "user_recipe_relations_recipe_id_fkey" => Some(Error::NotFound(Missing::Recipe)),
                "user_recipe_relations_user_id_fkey" => Some(Error::NotFound(Missing::User)),
                _ => None,
            })
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_relation(
        &self,
        kind: RelationKind,
        user: Id,
        recipe: Id,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            "DELETE FROM user_recipe_relations WHERE kind = $1 AND user_id = $2 AND recipe_id = $3",
        )
        .bind(kind)
        .bind(user)
        .bind(recipe)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn related_recipe_ids(
        &self,
        kind: RelationKind,
        user: Id,
        among: &[Id],
    ) -> Result<HashSet<Id>, Error> {
        let rows: Vec<(Id,)> = sqlx::query_as(
            "
            SELECT recipe_id FROM user_recipe_relations
            WHERE kind = $1 AND user_id = $2 AND recipe_id = ANY($3)
        ",
        )
        .bind(kind)
        .bind(user)
        .bind(among)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn all_related_recipe_ids(&self, kind: RelationKind, user: Id) -> Result<Vec<Id>, Error> {
        let rows: Vec<(Id,)> = sqlx::query_as(
            "SELECT recipe_id FROM user_recipe_relations WHERE kind = $1 AND user_id = $2",
        )
        .bind(kind)
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn ingredient_amounts(&self, recipe_ids: &[Id]) -> Result<Vec<IngredientAmount>, Error> {
        let rows: Vec<IngredientAmount> = sqlx::query_as(
            "SELECT ingredient_id, amount FROM recipe_ingredients WHERE recipe_id = ANY($1)",
        )
        .bind(recipe_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
