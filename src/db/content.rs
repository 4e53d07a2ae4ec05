use anyhow::Result;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite};

use crate::db::database::Database;
use crate::db::models::{ContentPieceRow, ContentStatus, ContentType, NewContentPiece};

pub(super) const CONTENT_COLUMNS: &str = "id, title, content_type, brand_id, campaign_id, \
     creator_id, generated_text, generated_html, image_prompt, image_urls, video_script, metadata, \
     ai_model_used, generation_prompt, generation_parameters, reference_materials_used, platform, \
     dimensions, duration, word_count, character_count, status, approval_notes, revision_count, \
     is_active, published_at, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub brand_id: Option<i64>,
    pub campaign_id: Option<i64>,
    pub content_type: Option<ContentType>,
    pub status: Option<ContentStatus>,
}

impl Database {
    pub async fn insert_content_piece(&self, piece: &NewContentPiece) -> Result<ContentPieceRow> {
        let result = sqlx::query(
            "INSERT INTO content_pieces (title, content_type, brand_id, campaign_id, creator_id, \
             generated_text, generated_html, image_prompt, video_script, metadata, ai_model_used, \
             generation_prompt, generation_parameters, reference_materials_used, platform, \
             word_count, character_count, status, revision_count, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 1, ?)",
        )
        .bind(&piece.title)
        .bind(piece.content_type.as_str())
        .bind(piece.brand_id)
        .bind(piece.campaign_id)
        .bind(piece.creator_id)
        .bind(&piece.generated_text)
        .bind(&piece.generated_html)
        .bind(&piece.image_prompt)
        .bind(&piece.video_script)
        .bind(piece.metadata.as_ref().map(Json))
        .bind(&piece.ai_model_used)
        .bind(&piece.generation_prompt)
        .bind(Json(&piece.generation_parameters))
        .bind(Json(&piece.reference_materials_used))
        .bind(&piece.platform)
        .bind(piece.word_count)
        .bind(piece.character_count)
        .bind(piece.status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.fetch_content_piece(result.last_insert_rowid()).await
    }

    async fn fetch_content_piece(&self, content_id: i64) -> Result<ContentPieceRow> {
        let query = format!("SELECT {CONTENT_COLUMNS} FROM content_pieces WHERE id = ?");
        let row = sqlx::query_as::<_, ContentPieceRow>(&query)
            .bind(content_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn find_owned_content(
        &self,
        content_id: i64,
        creator_id: i64,
    ) -> Result<Option<ContentPieceRow>> {
        let query =
            format!("SELECT {CONTENT_COLUMNS} FROM content_pieces WHERE id = ? AND creator_id = ?");
        let row = sqlx::query_as::<_, ContentPieceRow>(&query)
            .bind(content_id)
            .bind(creator_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Newest first.
    pub async fn list_content(
        &self,
        creator_id: i64,
        filter: &ContentFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ContentPieceRow>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {CONTENT_COLUMNS} FROM content_pieces WHERE creator_id = "
        ));
        builder.push_bind(creator_id);
        if let Some(brand_id) = filter.brand_id {
            builder.push(" AND brand_id = ").push_bind(brand_id);
        }
        if let Some(campaign_id) = filter.campaign_id {
            builder.push(" AND campaign_id = ").push_bind(campaign_id);
        }
        if let Some(content_type) = filter.content_type {
            builder
                .push(" AND content_type = ")
                .push_bind(content_type.as_str());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder
            .build_query_as::<ContentPieceRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Sets the review status. `approval_notes` is only overwritten when given
    /// and `published_at` is stamped on the transition to published.
    pub async fn update_content_status(
        &self,
        content_id: i64,
        status: ContentStatus,
        approval_notes: Option<&str>,
    ) -> Result<ContentPieceRow> {
        let now = Utc::now();
        let published_at = (status == ContentStatus::Published).then_some(now);
        sqlx::query(
            "UPDATE content_pieces SET status = ?, approval_notes = COALESCE(?, approval_notes), \
             published_at = COALESCE(published_at, ?), updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(approval_notes)
        .bind(published_at)
        .bind(now)
        .bind(content_id)
        .execute(&self.pool)
        .await?;

        self.fetch_content_piece(content_id).await
    }

    pub async fn delete_content_piece(&self, content_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM content_pieces WHERE id = ?")
            .bind(content_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::Map;

    use super::ContentFilter;
    use crate::db::database::{memory_database, Database};
    use crate::db::models::{BrandFields, ContentStatus, ContentType, NewContentPiece};

    pub(crate) fn piece(
        brand_id: i64,
        creator_id: i64,
        content_type: ContentType,
    ) -> NewContentPiece {
        NewContentPiece {
            title: format!("{} - Acme", content_type.label()),
            content_type,
            brand_id,
            campaign_id: None,
            creator_id,
            generated_text: Some("Hello world".to_string()),
            generated_html: None,
            image_prompt: None,
            video_script: None,
            metadata: None,
            ai_model_used: "claude-test".to_string(),
            generation_prompt: "prompt".to_string(),
            generation_parameters: Map::new(),
            reference_materials_used: vec![3, 4],
            platform: Some("instagram".to_string()),
            word_count: Some(2),
            character_count: Some(11),
            status: ContentStatus::Generated,
        }
    }

    async fn seeded() -> (Database, i64, i64) {
        let db = memory_database().await;
        let user = db.create_user("u", "u@x.test", None, "t").await.unwrap();
        let brand = db
            .insert_brand(user.id, &BrandFields { name: "Acme".into(), ..Default::default() })
            .await
            .unwrap();
        (db, user.id, brand.id)
    }

    #[tokio::test]
    async fn content_round_trips_enums_and_json_columns() {
        let (db, user_id, brand_id) = seeded().await;
        let stored = db
            .insert_content_piece(&piece(brand_id, user_id, ContentType::BlogPost))
            .await
            .unwrap();
        assert_eq!(stored.content_type, ContentType::BlogPost);
        assert_eq!(stored.status, ContentStatus::Generated);
        assert_eq!(stored.reference_materials_used.unwrap().0, vec![3, 4]);
        assert_eq!(stored.revision_count, 0);
    }

    #[tokio::test]
    async fn list_filters_by_type_and_status() {
        let (db, user_id, brand_id) = seeded().await;
        let post = db
            .insert_content_piece(&piece(brand_id, user_id, ContentType::SocialPost))
            .await
            .unwrap();
        db.insert_content_piece(&piece(brand_id, user_id, ContentType::BannerAd))
            .await
            .unwrap();

        let posts = db
            .list_content(
                user_id,
                &ContentFilter { content_type: Some(ContentType::SocialPost), ..Default::default() },
                0,
                20,
            )
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, post.id);

        db.update_content_status(post.id, ContentStatus::Approved, Some("ship it"))
            .await
            .unwrap();
        let approved = db
            .list_content(
                user_id,
                &ContentFilter { status: Some(ContentStatus::Approved), ..Default::default() },
                0,
                20,
            )
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].approval_notes.as_deref(), Some("ship it"));
        assert!(approved[0].published_at.is_none());
    }

    #[tokio::test]
    async fn publishing_stamps_published_at_and_delete_is_permanent() {
        let (db, user_id, brand_id) = seeded().await;
        let post = db
            .insert_content_piece(&piece(brand_id, user_id, ContentType::SocialPost))
            .await
            .unwrap();
        let published = db
            .update_content_status(post.id, ContentStatus::Published, None)
            .await
            .unwrap();
        assert!(published.published_at.is_some());

        db.delete_content_piece(post.id).await.unwrap();
        assert!(db.find_owned_content(post.id, user_id).await.unwrap().is_none());
    }
}
