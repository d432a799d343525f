use std::collections::HashSet;

use async_trait::async_trait;

use crate::{
    error::{Error, Missing},
    repository::SubscriptionRepository,
    schema::{Id, User},
};

use super::{map_constraint, PgStore};

#[async_trait]
impl SubscriptionRepository for PgStore {
    async fn insert_subscription(&self, follower: Id, followee: Id) -> Result<bool, Error> {
        let result = sqlx::query(
            "INSERT INTO subscriptions (follower_id, followee_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(follower)
        .bind(followee)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_constraint(e, |constraint| match constraint {
                "user_cant_follow_self" => Some(Error::SelfReference),
                "subscriptions_follower_id_fkey" | "subscriptions_followee_id_fkey" => {
                    Some(Error::NotFound(Missing::User))
                }
                _ => None,
            })
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_subscription(&self, follower: Id, followee: Id) -> Result<bool, Error> {
        let result =
            sqlx::query("DELETE FROM subscriptions WHERE follower_id = $1 AND followee_id = $2")
                .bind(follower)
                .bind(followee)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn followed_ids(&self, follower: Id, among: &[Id]) -> Result<HashSet<Id>, Error> {
        let rows: Vec<(Id,)> = sqlx::query_as(
            "SELECT followee_id FROM subscriptions WHERE follower_id = $1 AND followee_id = ANY($2)",
        )
        .bind(follower)
        .bind(among)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.0).collect())
    }

    async fn list_followees(&self, follower: Id) -> Result<Vec<User>, Error> {
        let rows: Vec<User> = sqlx::query_as(
            "
            SELECT u.* FROM subscriptions s
            INNER JOIN users u ON u.id = s.followee_id
            WHERE s.follower_id = $1
            ORDER BY s.created_at DESC
        ",
        )
        .bind(follower)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
