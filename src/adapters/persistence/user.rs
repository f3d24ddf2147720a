use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::user::{NewUser, UserRepo},
    domain::entities::user::{LOCAL_PROVIDER, User},
};

fn row_to_user(row: sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        provider: row.get("provider"),
        provider_id: row.get("provider_id"),
        name: row.get("name"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        image_url: row.get("image_url"),
        email_verified: row.get("email_verified"),
        profile_completed: row.get("profile_completed"),
        is_platform_admin: row.get("is_platform_admin"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, username, email, password_hash, provider, provider_id, name,
    first_name, last_name, image_url, email_verified, profile_completed,
    is_platform_admin, created_at, updated_at
"#;

#[async_trait]
impl UserRepo for PostgresPersistence {
    async fn create(&self, new_user: &NewUser) -> AppResult<User> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO users (id, username, email, password_hash, provider, first_name, last_name)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(LOCAL_PROVIDER)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_user(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_user))
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            SELECT_COLS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_user))
    }

    async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = $1", SELECT_COLS))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_user))
    }

    async fn update(&self, user: &User) -> AppResult<User> {
        let row = sqlx::query(&format!(
            r#"UPDATE users SET
                 username = $2, email = $3, password_hash = $4, name = $5,
                 first_name = $6, last_name = $7, image_url = $8,
                 email_verified = $9, profile_completed = $10, is_platform_admin = $11,
                 updated_at = NOW() AT TIME ZONE 'utc'
               WHERE id = $1
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.image_url)
        .bind(user.email_verified)
        .bind(user.profile_completed)
        .bind(user.is_platform_admin)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_user(row))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn save_email_verification(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: NaiveDateTime,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO email_verifications (token_hash, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn consume_email_verification(
        &self,
        token_hash: &str,
        now: NaiveDateTime,
    ) -> AppResult<Option<Uuid>> {
        // Single statement so a token cannot be used twice concurrently.
        let row = sqlx::query(
            r#"DELETE FROM email_verifications
               WHERE token_hash = $1
               RETURNING user_id, expires_at"#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.and_then(|r| {
            let expires_at: NaiveDateTime = r.get("expires_at");
            (expires_at > now).then(|| r.get("user_id"))
        }))
    }
}
