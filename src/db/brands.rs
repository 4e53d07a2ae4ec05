use anyhow::Result;
use chrono::Utc;
use sqlx::types::Json;

use crate::db::database::Database;
use crate::db::models::{BrandAnalytics, BrandFields, BrandRow, StatusCount, TypeCount};

const BRAND_COLUMNS: &str = "id, owner_id, name, description, industry, website_url, brand_voice, \
     color_palette, typography, logo_urls, imagery_style, messaging_pillars, target_audience, \
     brand_values, competitors, content_guidelines, approved_hashtags, banned_words, \
     style_guide_url, social_media_handles, is_active, created_at, updated_at";

impl Database {
    pub async fn insert_brand(&self, owner_id: i64, fields: &BrandFields) -> Result<BrandRow> {
        let result = sqlx::query(
            "INSERT INTO brands (owner_id, name, description, industry, website_url, brand_voice, \
             color_palette, typography, logo_urls, imagery_style, messaging_pillars, target_audience, \
             brand_values, competitors, content_guidelines, approved_hashtags, banned_words, \
             style_guide_url, social_media_handles, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(owner_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.industry)
        .bind(&fields.website_url)
        .bind(&fields.brand_voice)
        .bind(fields.color_palette.as_ref().map(Json))
        .bind(fields.typography.as_ref().map(Json))
        .bind(fields.logo_urls.as_ref().map(Json))
        .bind(&fields.imagery_style)
        .bind(fields.messaging_pillars.as_ref().map(Json))
        .bind(fields.target_audience.as_ref().map(Json))
        .bind(fields.brand_values.as_ref().map(Json))
        .bind(fields.competitors.as_ref().map(Json))
        .bind(fields.content_guidelines.as_ref().map(Json))
        .bind(fields.approved_hashtags.as_ref().map(Json))
        .bind(fields.banned_words.as_ref().map(Json))
        .bind(&fields.style_guide_url)
        .bind(fields.social_media_handles.as_ref().map(Json))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.fetch_brand(result.last_insert_rowid()).await
    }

    async fn fetch_brand(&self, brand_id: i64) -> Result<BrandRow> {
        let query = format!("SELECT {BRAND_COLUMNS} FROM brands WHERE id = ?");
        let row = sqlx::query_as::<_, BrandRow>(&query)
            .bind(brand_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    /// Looks a brand up by id within one owner's brands. Inactive brands are
    /// still returned so they can be inspected or restored.
    pub async fn find_owned_brand(&self, brand_id: i64, owner_id: i64) -> Result<Option<BrandRow>> {
        let query = format!("SELECT {BRAND_COLUMNS} FROM brands WHERE id = ? AND owner_id = ?");
        let row = sqlx::query_as::<_, BrandRow>(&query)
            .bind(brand_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn brand_name_taken(
        &self,
        owner_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM brands WHERE owner_id = ? AND name = ? AND (? IS NULL OR id != ?)",
        )
        .bind(owner_id)
        .bind(name)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken > 0)
    }

    pub async fn list_brands(&self, owner_id: i64, skip: i64, limit: i64) -> Result<Vec<BrandRow>> {
        let query = format!(
            "SELECT {BRAND_COLUMNS} FROM brands WHERE owner_id = ? AND is_active = 1 \
             ORDER BY id LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, BrandRow>(&query)
            .bind(owner_id)
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn update_brand(
        &self,
        brand_id: i64,
        fields: &BrandFields,
        is_active: bool,
    ) -> Result<BrandRow> {
        sqlx::query(
            "UPDATE brands SET name = ?, description = ?, industry = ?, website_url = ?, \
             brand_voice = ?, color_palette = ?, typography = ?, logo_urls = ?, imagery_style = ?, \
             messaging_pillars = ?, target_audience = ?, brand_values = ?, competitors = ?, \
             content_guidelines = ?, approved_hashtags = ?, banned_words = ?, style_guide_url = ?, \
             social_media_handles = ?, is_active = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.industry)
        .bind(&fields.website_url)
        .bind(&fields.brand_voice)
        .bind(fields.color_palette.as_ref().map(Json))
        .bind(fields.typography.as_ref().map(Json))
        .bind(fields.logo_urls.as_ref().map(Json))
        .bind(&fields.imagery_style)
        .bind(fields.messaging_pillars.as_ref().map(Json))
        .bind(fields.target_audience.as_ref().map(Json))
        .bind(fields.brand_values.as_ref().map(Json))
        .bind(fields.competitors.as_ref().map(Json))
        .bind(fields.content_guidelines.as_ref().map(Json))
        .bind(fields.approved_hashtags.as_ref().map(Json))
        .bind(fields.banned_words.as_ref().map(Json))
        .bind(&fields.style_guide_url)
        .bind(fields.social_media_handles.as_ref().map(Json))
        .bind(is_active)
        .bind(Utc::now())
        .bind(brand_id)
        .execute(&self.pool)
        .await?;

        self.fetch_brand(brand_id).await
    }

    pub async fn soft_delete_brand(&self, brand_id: i64) -> Result<()> {
        sqlx::query("UPDATE brands SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(brand_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn append_brand_logo(&self, brand_id: i64, logo_url: &str) -> Result<BrandRow> {
        let brand = self.fetch_brand(brand_id).await?;
        let mut logos = brand.logo_urls.map(|json| json.0).unwrap_or_default();
        logos.push(logo_url.to_string());

        sqlx::query("UPDATE brands SET logo_urls = ?, updated_at = ? WHERE id = ?")
            .bind(Json(&logos))
            .bind(Utc::now())
            .bind(brand_id)
            .execute(&self.pool)
            .await?;

        self.fetch_brand(brand_id).await
    }

    pub async fn brand_analytics(&self, brand: &BrandRow) -> Result<BrandAnalytics> {
        let total_content_pieces: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM content_pieces WHERE brand_id = ?")
                .bind(brand.id)
                .fetch_one(&self.pool)
                .await?;
        let total_campaigns: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM campaigns WHERE brand_id = ?")
                .bind(brand.id)
                .fetch_one(&self.pool)
                .await?;

        let content_by_type = sqlx::query_as::<_, TypeCount>(
            "SELECT content_type, COUNT(*) AS count FROM content_pieces \
             WHERE brand_id = ? GROUP BY content_type ORDER BY content_type",
        )
        .bind(brand.id)
        .fetch_all(&self.pool)
        .await?;
        let content_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM content_pieces \
             WHERE brand_id = ? GROUP BY status ORDER BY status",
        )
        .bind(brand.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(BrandAnalytics {
            brand_id: brand.id,
            brand_name: brand.name.clone(),
            total_content_pieces,
            total_campaigns,
            content_by_type,
            content_by_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::db::database::memory_database;
    use crate::db::models::BrandFields;

    fn fields(name: &str) -> BrandFields {
        BrandFields {
            name: name.to_string(),
            industry: Some("Coffee".to_string()),
            brand_values: Some(vec!["Craft".to_string(), "Warmth".to_string()]),
            target_audience: json!({"age": "25-40"}).as_object().cloned(),
            ..BrandFields::default()
        }
    }

    #[tokio::test]
    async fn brands_are_scoped_to_their_owner() {
        let db = memory_database().await;
        let owner = db.create_user("o", "o@x.test", None, "t-o").await.unwrap();
        let other = db.create_user("p", "p@x.test", None, "t-p").await.unwrap();

        let brand = db.insert_brand(owner.id, &fields("Acme")).await.unwrap();
        assert_eq!(brand.brand_values.as_ref().unwrap().0.len(), 2);
        assert!(brand.is_active);

        assert!(db.find_owned_brand(brand.id, owner.id).await.unwrap().is_some());
        assert!(db.find_owned_brand(brand.id, other.id).await.unwrap().is_none());
        assert!(db.brand_name_taken(owner.id, "Acme", None).await.unwrap());
        assert!(!db.brand_name_taken(owner.id, "Acme", Some(brand.id)).await.unwrap());
        assert!(!db.brand_name_taken(other.id, "Acme", None).await.unwrap());
    }

    #[tokio::test]
    async fn soft_deleted_brands_leave_listings_but_stay_readable() {
        let db = memory_database().await;
        let owner = db.create_user("o", "o@x.test", None, "t-o").await.unwrap();
        let first = db.insert_brand(owner.id, &fields("One")).await.unwrap();
        db.insert_brand(owner.id, &fields("Two")).await.unwrap();

        db.soft_delete_brand(first.id).await.unwrap();
        db.soft_delete_brand(first.id).await.unwrap();

        let listed = db.list_brands(owner.id, 0, 20).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Two");

        let hidden = db.find_owned_brand(first.id, owner.id).await.unwrap().unwrap();
        assert!(!hidden.is_active);
        assert!(db.brand_name_taken(owner.id, "One", None).await.unwrap());
    }

    #[tokio::test]
    async fn logos_are_appended_in_order() {
        let db = memory_database().await;
        let owner = db.create_user("o", "o@x.test", None, "t-o").await.unwrap();
        let brand = db.insert_brand(owner.id, &fields("Acme")).await.unwrap();

        db.append_brand_logo(brand.id, "/uploads/brands/a.png")
            .await
            .unwrap();
        let updated = db
            .append_brand_logo(brand.id, "/uploads/brands/b.png")
            .await
            .unwrap();
        assert_eq!(
            updated.logo_urls.unwrap().0,
            vec![
                "/uploads/brands/a.png".to_string(),
                "/uploads/brands/b.png".to_string()
            ]
        );
        assert!(updated.updated_at.is_some());
    }
}
