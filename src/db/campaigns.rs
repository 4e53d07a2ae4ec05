use anyhow::Result;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite};

use crate::db::content::CONTENT_COLUMNS;
use crate::db::database::Database;
use crate::db::models::{
    CampaignAnalytics, CampaignFields, CampaignRow, ContentPieceRow, PlatformCount, StatusCount,
    TypeCount,
};

const CAMPAIGN_COLUMNS: &str = "id, name, description, brand_id, creator_id, objective, \
     target_audience, budget, start_date, end_date, platforms, content_types, content_count, \
     content_specs, status, progress, is_active, created_at, updated_at";

#[derive(Debug, Clone, Default)]
pub struct CampaignFilter {
    pub brand_id: Option<i64>,
    pub status: Option<String>,
}

impl Database {
    pub async fn insert_campaign(
        &self,
        brand_id: i64,
        creator_id: i64,
        fields: &CampaignFields,
    ) -> Result<CampaignRow> {
        let result = sqlx::query(
            "INSERT INTO campaigns (name, description, brand_id, creator_id, objective, \
             target_audience, budget, start_date, end_date, platforms, content_types, \
             content_count, content_specs, status, progress, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'planning', 0, 1, ?)",
        )
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(brand_id)
        .bind(creator_id)
        .bind(&fields.objective)
        .bind(fields.target_audience.as_ref().map(Json))
        .bind(fields.budget)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .bind(fields.platforms.as_ref().map(Json))
        .bind(fields.content_types.as_ref().map(Json))
        .bind(fields.content_count.as_ref().map(Json))
        .bind(fields.content_specs.as_ref().map(Json))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.fetch_campaign(result.last_insert_rowid()).await
    }

    async fn fetch_campaign(&self, campaign_id: i64) -> Result<CampaignRow> {
        let query = format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?");
        let row = sqlx::query_as::<_, CampaignRow>(&query)
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn find_owned_campaign(
        &self,
        campaign_id: i64,
        creator_id: i64,
    ) -> Result<Option<CampaignRow>> {
        let query =
            format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ? AND creator_id = ?");
        let row = sqlx::query_as::<_, CampaignRow>(&query)
            .bind(campaign_id)
            .bind(creator_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn find_campaign_for_brand(
        &self,
        campaign_id: i64,
        brand_id: i64,
    ) -> Result<Option<CampaignRow>> {
        let query =
            format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ? AND brand_id = ?");
        let row = sqlx::query_as::<_, CampaignRow>(&query)
            .bind(campaign_id)
            .bind(brand_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn campaign_name_taken(
        &self,
        brand_id: i64,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM campaigns WHERE brand_id = ? AND name = ? AND (? IS NULL OR id != ?)",
        )
        .bind(brand_id)
        .bind(name)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken > 0)
    }

    pub async fn list_campaigns(
        &self,
        creator_id: i64,
        filter: &CampaignFilter,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<CampaignRow>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE is_active = 1 AND creator_id = "
        ));
        builder.push_bind(creator_id);
        if let Some(brand_id) = filter.brand_id {
            builder.push(" AND brand_id = ").push_bind(brand_id);
        }
        if let Some(status) = filter.status.as_deref() {
            builder.push(" AND status = ").push_bind(status.to_string());
        }
        builder
            .push(" ORDER BY id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(skip);

        let rows = builder
            .build_query_as::<CampaignRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn update_campaign(
        &self,
        campaign_id: i64,
        fields: &CampaignFields,
        status: &str,
        progress: f64,
        is_active: bool,
    ) -> Result<CampaignRow> {
        sqlx::query(
            "UPDATE campaigns SET name = ?, description = ?, objective = ?, target_audience = ?, \
             budget = ?, start_date = ?, end_date = ?, platforms = ?, content_types = ?, \
             content_count = ?, content_specs = ?, status = ?, progress = ?, is_active = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.objective)
        .bind(fields.target_audience.as_ref().map(Json))
        .bind(fields.budget)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .bind(fields.platforms.as_ref().map(Json))
        .bind(fields.content_types.as_ref().map(Json))
        .bind(fields.content_count.as_ref().map(Json))
        .bind(fields.content_specs.as_ref().map(Json))
        .bind(status)
        .bind(progress)
        .bind(is_active)
        .bind(Utc::now())
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;

        self.fetch_campaign(campaign_id).await
    }

    pub async fn soft_delete_campaign(&self, campaign_id: i64) -> Result<()> {
        sqlx::query("UPDATE campaigns SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(campaign_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn campaign_content(
        &self,
        campaign_id: i64,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<ContentPieceRow>> {
        let query = format!(
            "SELECT {CONTENT_COLUMNS} FROM content_pieces WHERE campaign_id = ? \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, ContentPieceRow>(&query)
            .bind(campaign_id)
            .bind(limit)
            .bind(skip)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn campaign_content_count(&self, campaign_id: i64) -> Result<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM content_pieces WHERE campaign_id = ?")
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    pub async fn campaign_analytics(&self, campaign: &CampaignRow) -> Result<CampaignAnalytics> {
        let total_content_pieces: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM content_pieces WHERE campaign_id = ?")
                .bind(campaign.id)
                .fetch_one(&self.pool)
                .await?;
        let content_by_type = sqlx::query_as::<_, TypeCount>(
            "SELECT content_type, COUNT(*) AS count FROM content_pieces \
             WHERE campaign_id = ? GROUP BY content_type ORDER BY content_type",
        )
        .bind(campaign.id)
        .fetch_all(&self.pool)
        .await?;
        let content_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM content_pieces \
             WHERE campaign_id = ? GROUP BY status ORDER BY status",
        )
        .bind(campaign.id)
        .fetch_all(&self.pool)
        .await?;
        let content_by_platform = sqlx::query_as::<_, PlatformCount>(
            "SELECT platform, COUNT(*) AS count FROM content_pieces \
             WHERE campaign_id = ? AND platform IS NOT NULL GROUP BY platform ORDER BY platform",
        )
        .bind(campaign.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(CampaignAnalytics {
            campaign_id: campaign.id,
            campaign_name: campaign.name.clone(),
            campaign_status: campaign.status.clone(),
            campaign_progress: campaign.progress,
            total_content_pieces,
            content_by_type,
            content_by_status,
            content_by_platform,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::CampaignFilter;
    use crate::db::content::tests::piece;
    use crate::db::database::memory_database;
    use crate::db::models::{BrandFields, CampaignFields, ContentType};

    fn campaign(name: &str) -> CampaignFields {
        CampaignFields {
            name: name.to_string(),
            objective: Some("Awareness".to_string()),
            platforms: Some(vec!["instagram".to_string()]),
            ..CampaignFields::default()
        }
    }

    #[tokio::test]
    async fn campaigns_start_in_planning_and_filter_by_brand_and_status() {
        let db = memory_database().await;
        let user = db.create_user("u", "u@x.test", None, "t").await.unwrap();
        let brand_a = db
            .insert_brand(user.id, &BrandFields { name: "A".into(), ..Default::default() })
            .await
            .unwrap();
        let brand_b = db
            .insert_brand(user.id, &BrandFields { name: "B".into(), ..Default::default() })
            .await
            .unwrap();

        let first = db
            .insert_campaign(brand_a.id, user.id, &campaign("Launch"))
            .await
            .unwrap();
        assert_eq!(first.status, "planning");
        assert_eq!(first.progress, 0.0);
        db.insert_campaign(brand_b.id, user.id, &campaign("Launch"))
            .await
            .unwrap();

        let fields = CampaignFields::from(&first);
        db.update_campaign(first.id, &fields, "active", 40.0, true)
            .await
            .unwrap();

        let by_brand = db
            .list_campaigns(
                user.id,
                &CampaignFilter { brand_id: Some(brand_a.id), status: None },
                0,
                20,
            )
            .await
            .unwrap();
        assert_eq!(by_brand.len(), 1);

        let active = db
            .list_campaigns(
                user.id,
                &CampaignFilter { brand_id: None, status: Some("active".into()) },
                0,
                20,
            )
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].progress, 40.0);

        assert!(db.campaign_name_taken(brand_a.id, "Launch", None).await.unwrap());
        assert!(!db
            .campaign_name_taken(brand_a.id, "Launch", Some(first.id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn campaigns_for_another_brand_are_not_found() {
        let db = memory_database().await;
        let user = db.create_user("u", "u@x.test", None, "t").await.unwrap();
        let brand = db
            .insert_brand(user.id, &BrandFields { name: "A".into(), ..Default::default() })
            .await
            .unwrap();
        let created = db
            .insert_campaign(brand.id, user.id, &campaign("Launch"))
            .await
            .unwrap();

        assert!(db
            .find_campaign_for_brand(created.id, brand.id)
            .await
            .unwrap()
            .is_some());
        assert!(db
            .find_campaign_for_brand(created.id, brand.id + 1)
            .await
            .unwrap()
            .is_none());

        db.soft_delete_campaign(created.id).await.unwrap();
        let listed = db
            .list_campaigns(user.id, &CampaignFilter::default(), 0, 20)
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn content_count_covers_pieces_beyond_the_page() {
        let db = memory_database().await;
        let user = db.create_user("u", "u@x.test", None, "t").await.unwrap();
        let brand = db
            .insert_brand(user.id, &BrandFields { name: "A".into(), ..Default::default() })
            .await
            .unwrap();
        let launch = db
            .insert_campaign(brand.id, user.id, &campaign("Launch"))
            .await
            .unwrap();
        for _ in 0..25 {
            let mut new_piece = piece(brand.id, user.id, ContentType::SocialPost);
            new_piece.campaign_id = Some(launch.id);
            db.insert_content_piece(&new_piece).await.unwrap();
        }
        db.insert_content_piece(&piece(brand.id, user.id, ContentType::BlogPost))
            .await
            .unwrap();

        let page = db.campaign_content(launch.id, 0, 20).await.unwrap();
        assert_eq!(page.len(), 20);
        assert_eq!(db.campaign_content_count(launch.id).await.unwrap(), 25);
    }
}
