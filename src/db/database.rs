use std::str::FromStr;

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::UserRow;

const USER_COLUMNS: &str =
    "id, username, email, full_name, api_token, role, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    pub(super) pool: SqlitePool,
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

impl Database {
    pub async fn init(database_url: &str) -> Result<Self> {
        let in_memory = is_memory_url(database_url);
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Each in-memory connection is a separate database.
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;

        let database = Database { pool };
        database.create_schema().await?;
        info!("Database tables created successfully");
        Ok(database)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                username TEXT NOT NULL UNIQUE,\
                email TEXT NOT NULL UNIQUE,\
                full_name TEXT,\
                api_token TEXT NOT NULL UNIQUE,\
                role TEXT NOT NULL DEFAULT 'user',\
                is_active INTEGER NOT NULL DEFAULT 1,\
                created_at TEXT NOT NULL,\
                updated_at TEXT\
            );",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS brands (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                owner_id INTEGER NOT NULL,\
                name TEXT NOT NULL,\
                description TEXT,\
                industry TEXT,\
                website_url TEXT,\
                brand_voice TEXT,\
                color_palette TEXT,\
                typography TEXT,\
                logo_urls TEXT,\
                imagery_style TEXT,\
                messaging_pillars TEXT,\
                target_audience TEXT,\
                brand_values TEXT,\
                competitors TEXT,\
                content_guidelines TEXT,\
                approved_hashtags TEXT,\
                banned_words TEXT,\
                style_guide_url TEXT,\
                social_media_handles TEXT,\
                is_active INTEGER NOT NULL DEFAULT 1,\
                created_at TEXT NOT NULL,\
                updated_at TEXT,\
                UNIQUE(owner_id, name),\
                FOREIGN KEY(owner_id) REFERENCES users(id)\
            );",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS campaigns (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                name TEXT NOT NULL,\
                description TEXT,\
                brand_id INTEGER NOT NULL,\
                creator_id INTEGER NOT NULL,\
                objective TEXT,\
                target_audience TEXT,\
                budget REAL,\
                start_date TEXT,\
                end_date TEXT,\
                platforms TEXT,\
                content_types TEXT,\
                content_count TEXT,\
                content_specs TEXT,\
                status TEXT NOT NULL DEFAULT 'planning',\
                progress REAL NOT NULL DEFAULT 0,\
                is_active INTEGER NOT NULL DEFAULT 1,\
                created_at TEXT NOT NULL,\
                updated_at TEXT,\
                UNIQUE(brand_id, name),\
                FOREIGN KEY(brand_id) REFERENCES brands(id),\
                FOREIGN KEY(creator_id) REFERENCES users(id)\
            );",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS content_pieces (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                title TEXT NOT NULL,\
                content_type TEXT NOT NULL,\
                brand_id INTEGER NOT NULL,\
                campaign_id INTEGER,\
                creator_id INTEGER NOT NULL,\
                generated_text TEXT,\
                generated_html TEXT,\
                image_prompt TEXT,\
                image_urls TEXT,\
                video_script TEXT,\
                metadata TEXT,\
                ai_model_used TEXT,\
                generation_prompt TEXT,\
                generation_parameters TEXT,\
                reference_materials_used TEXT,\
                platform TEXT,\
                dimensions TEXT,\
                duration INTEGER,\
                word_count INTEGER,\
                character_count INTEGER,\
                status TEXT NOT NULL DEFAULT 'draft',\
                approval_notes TEXT,\
                revision_count INTEGER NOT NULL DEFAULT 0,\
                is_active INTEGER NOT NULL DEFAULT 1,\
                published_at TEXT,\
                created_at TEXT NOT NULL,\
                updated_at TEXT,\
                FOREIGN KEY(brand_id) REFERENCES brands(id),\
                FOREIGN KEY(campaign_id) REFERENCES campaigns(id),\
                FOREIGN KEY(creator_id) REFERENCES users(id)\
            );",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reference_materials (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                brand_id INTEGER NOT NULL,\
                name TEXT NOT NULL,\
                description TEXT,\
                file_type TEXT NOT NULL,\
                file_url TEXT NOT NULL,\
                file_size INTEGER,\
                original_filename TEXT NOT NULL,\
                extracted_text TEXT,\
                color_analysis TEXT,\
                style_analysis TEXT,\
                content_tags TEXT,\
                usage_count INTEGER NOT NULL DEFAULT 0,\
                last_used TEXT,\
                is_active INTEGER NOT NULL DEFAULT 1,\
                created_at TEXT NOT NULL,\
                updated_at TEXT,\
                FOREIGN KEY(brand_id) REFERENCES brands(id)\
            );",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_brands_owner_id ON brands(owner_id);")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_campaigns_brand_id ON campaigns(brand_id);")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_content_pieces_creator_id ON content_pieces(creator_id);",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_content_pieces_campaign_id ON content_pieces(campaign_id);",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reference_materials_brand_id ON reference_materials(brand_id);",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        full_name: Option<&str>,
        api_token: &str,
    ) -> Result<UserRow> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, full_name, api_token, role, is_active, created_at) \
             VALUES (?, ?, ?, ?, 'user', 1, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(full_name)
        .bind(api_token)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    /// Resolves a bearer token to an active user.
    pub async fn find_user_by_token(&self, api_token: &str) -> Result<Option<UserRow>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE api_token = ? AND is_active = 1");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(api_token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool> {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE username = ? OR lower(email) = lower(?)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken > 0)
    }
}

#[cfg(test)]
pub(crate) async fn memory_database() -> Database {
    Database::init("sqlite::memory:")
        .await
        .expect("in-memory database")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_in_memory_urls() {
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite://file:studio?mode=memory&cache=shared"));
        assert!(!is_memory_url("sqlite://brand_studio.db?mode=rwc"));
    }

    #[tokio::test]
    async fn users_resolve_by_token_only_when_active() {
        let db = memory_database().await;
        let user = db
            .create_user("ana", "ana@example.com", Some("Ana"), "token-ana")
            .await
            .unwrap();
        assert_eq!(user.role, "user");
        assert_eq!(user.api_token, "token-ana");
        assert!(user.is_active);

        let found = db.find_user_by_token("token-ana").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(db.find_user_by_token("other").await.unwrap().is_none());

        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(user.id)
            .execute(&db.pool)
            .await
            .unwrap();
        assert!(db.find_user_by_token("token-ana").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn detects_taken_usernames_and_emails() {
        let db = memory_database().await;
        db.create_user("ana", "ana@example.com", None, "t1")
            .await
            .unwrap();
        assert!(db.username_or_email_taken("ana", "x@example.com").await.unwrap());
        assert!(db.username_or_email_taken("bob", "ANA@example.com").await.unwrap());
        assert!(!db.username_or_email_taken("bob", "bob@example.com").await.unwrap());
    }
}
