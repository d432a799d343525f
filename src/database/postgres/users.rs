use async_trait::async_trait;

use crate::{
    error::{Conflict, Error, Missing},
    repository::UserRepository,
    schema::{Id, NewUser, User},
};

use super::{map_constraint, PgStore};

#[async_trait]
impl UserRepository for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, Error> {
        let row: User = sqlx::query_as(
            "
            INSERT INTO users (email, username, first_name, last_name, password, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        ",
        )
        .bind(user.email)
        .bind(user.username)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.password)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_constraint(e, |constraint| match constraint {
                "unique_user_email" => Some(Error::Conflict(Conflict::Email)),
                "unique_user_username" => Some(Error::Conflict(Conflict::Username)),
                _ => None,
            })
        })?;

        Ok(row)
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, Error> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn get_users(&self, ids: &[Id]) -> Result<Vec<User>, Error> {
        let rows: Vec<User> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn set_avatar(&self, id: Id, avatar: Option<String>) -> Result<(), Error> {
        let result = sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
            .bind(avatar)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(Missing::User));
        }
        Ok(())
    }
}
