use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::schema::{Association, Member, Role, User, UserAssociation};

const MAX_CONNECTIONS: u32 = 8;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Failed to create SQLite connect options")?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database `{}`", database_url))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Private in-memory database living as long as the returned handle.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Failed to create SQLite connect options")?;
        // Every connection would see its own empty database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .context("Database migration error")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> anyhow::Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to start database transaction")
    }

    pub async fn save_user(&self, user: &User) -> anyhow::Result<User> {
        let saved = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, is_superuser)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_superuser)
        .fetch_one(&self.pool)
        .await
        .context("Failed to save user to database")?;

        Ok(saved)
    }

    pub async fn get_user(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to get user with username {}", username))?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to get user with id {}", user_id))?;
        Ok(user)
    }

    /// True when either the username or the email is already registered.
    pub async fn user_exists(&self, username: &str, email: &str) -> anyhow::Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
                .bind(username)
                .bind(email.to_lowercase())
                .fetch_one(&self.pool)
                .await
                .context("Failed to check for existing user")?;
        Ok(count > 0)
    }

    pub async fn get_association(&self, association_id: i64) -> anyhow::Result<Option<Association>> {
        let association =
            sqlx::query_as::<_, Association>("SELECT * FROM associations WHERE id = ?")
                .bind(association_id)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Failed to get association with id {}", association_id))?;
        Ok(association)
    }

    pub async fn get_association_by_name(&self, name: &str) -> anyhow::Result<Option<Association>> {
        let association =
            sqlx::query_as::<_, Association>("SELECT * FROM associations WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Failed to get association named {}", name))?;
        Ok(association)
    }

    pub async fn get_member_role(
        &self,
        association_id: i64,
        user_id: i64,
    ) -> anyhow::Result<Option<Role>> {
        let role = sqlx::query_scalar::<_, Role>(
            "SELECT role FROM memberships WHERE association_id = ? AND user_id = ?",
        )
        .bind(association_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get membership role")?;
        Ok(role)
    }

    pub async fn add_member(
        &self,
        association_id: i64,
        user_id: i64,
        role: Role,
    ) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO memberships (association_id, user_id, role) VALUES (?, ?, ?)")
            .bind(association_id)
            .bind(user_id)
            .bind(role)
            .execute(&self.pool)
            .await
            .with_context(|| {
                format!(
                    "Failed to add user {} to association {}",
                    user_id, association_id
                )
            })?;
        Ok(())
    }

    pub async fn get_members(&self, association_id: i64) -> anyhow::Result<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(
            r#"
            SELECT m.user_id, u.username, u.email, m.role, m.joined_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.association_id = ?
            ORDER BY m.joined_at, m.id
            "#,
        )
        .bind(association_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to get members of association {}", association_id))?;
        Ok(members)
    }

    pub async fn get_user_associations(&self, user_id: i64) -> anyhow::Result<Vec<UserAssociation>> {
        let associations = sqlx::query_as::<_, UserAssociation>(
            r#"
            SELECT a.id, a.name, a.description, m.role, m.joined_at
            FROM memberships m
            JOIN associations a ON a.id = m.association_id
            WHERE m.user_id = ?
            ORDER BY a.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to get associations of user {}", user_id))?;
        Ok(associations)
    }
}
