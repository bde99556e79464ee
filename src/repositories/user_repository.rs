//! Repository for user accounts

use crate::error::RepositoryError;
use crate::models::User;
use sqlx::PgPool;
use uuid::Uuid;

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, display_name, payout_method, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by email, creating the account on first sight.
    pub async fn find_or_create_by_email(
        &self,
        email: &str,
        display_name: &str,
    ) -> Result<User, RepositoryError> {
        let existing = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, display_name, payout_method, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(user) = existing {
            return Ok(user);
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, display_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET display_name = users.display_name
            RETURNING id, email, display_name, payout_method, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Configure (or clear) the user's payout destination.
    pub async fn set_payout_method(
        &self,
        user_id: Uuid,
        payout_method: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET payout_method = $2
            WHERE id = $1
            RETURNING id, email, display_name, payout_method, created_at
            "#,
        )
        .bind(user_id)
        .bind(payout_method)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("User {} not found", user_id)))?;

        Ok(user)
    }
}
