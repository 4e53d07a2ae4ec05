use anyhow::Result;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite};

use crate::db::database::Database;
use crate::db::models::{NewReferenceMaterial, ReferenceMaterialRow};

const REFERENCE_COLUMNS: &str = "id, brand_id, name, description, file_type, file_url, file_size, \
     original_filename, extracted_text, color_analysis, style_analysis, content_tags, usage_count, \
     last_used, is_active, created_at, updated_at";

// Well below SQLITE_MAX_VARIABLE_NUMBER on every SQLite build.
const IDS_PER_QUERY: usize = 500;

impl Database {
    pub async fn insert_reference_material(
        &self,
        material: &NewReferenceMaterial,
    ) -> Result<ReferenceMaterialRow> {
        let result = sqlx::query(
            "INSERT INTO reference_materials (brand_id, name, description, file_type, file_url, \
             file_size, original_filename, extracted_text, color_analysis, style_analysis, \
             content_tags, usage_count, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 1, ?)",
        )
        .bind(material.brand_id)
        .bind(&material.name)
        .bind(&material.description)
        .bind(&material.file_type)
        .bind(&material.file_url)
        .bind(material.file_size)
        .bind(&material.original_filename)
        .bind(&material.extracted_text)
        .bind(material.color_analysis.as_ref().map(Json))
        .bind(material.style_analysis.as_ref().map(Json))
        .bind(material.content_tags.as_ref().map(Json))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        let query = format!("SELECT {REFERENCE_COLUMNS} FROM reference_materials WHERE id = ?");
        let row = sqlx::query_as::<_, ReferenceMaterialRow>(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    /// Ownership is checked by the caller through the material's brand.
    pub async fn find_reference_material(
        &self,
        material_id: i64,
    ) -> Result<Option<ReferenceMaterialRow>> {
        let query = format!("SELECT {REFERENCE_COLUMNS} FROM reference_materials WHERE id = ?");
        let row = sqlx::query_as::<_, ReferenceMaterialRow>(&query)
            .bind(material_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_reference_materials(
        &self,
        brand_id: i64,
        file_type: Option<&str>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<ReferenceMaterialRow>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {REFERENCE_COLUMNS} FROM reference_materials WHERE is_active = 1 AND brand_id = "
        ));
        builder.push_bind(brand_id);
        if let Some(file_type) = file_type {
            builder.push(" AND file_type = ").push_bind(file_type.to_string());
        }
        builder
            .push(" ORDER BY id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(skip);

        let rows = builder
            .build_query_as::<ReferenceMaterialRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Active materials of `brand_id` among `ids`, in id order. Unknown,
    /// foreign and inactive ids are dropped silently. Ids are looked up in
    /// chunks so a long list stays under SQLite's bind-parameter limit.
    pub async fn reference_materials_for_generation(
        &self,
        ids: &[i64],
        brand_id: i64,
    ) -> Result<Vec<ReferenceMaterialRow>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut rows = Vec::new();
        for chunk in ids.chunks(IDS_PER_QUERY) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {REFERENCE_COLUMNS} FROM reference_materials WHERE is_active = 1 AND brand_id = "
            ));
            builder.push_bind(brand_id).push(" AND id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(") ORDER BY id");

            rows.extend(
                builder
                    .build_query_as::<ReferenceMaterialRow>()
                    .fetch_all(&self.pool)
                    .await?,
            );
        }
        Ok(rows)
    }

    pub async fn touch_reference_material(&self, material_id: i64) -> Result<ReferenceMaterialRow> {
        sqlx::query(
            "UPDATE reference_materials SET usage_count = usage_count + 1, last_used = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(material_id)
        .execute(&self.pool)
        .await?;

        let query = format!("SELECT {REFERENCE_COLUMNS} FROM reference_materials WHERE id = ?");
        let row = sqlx::query_as::<_, ReferenceMaterialRow>(&query)
            .bind(material_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn soft_delete_reference_material(&self, material_id: i64) -> Result<()> {
        sqlx::query("UPDATE reference_materials SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(material_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::database::{memory_database, Database};
    use crate::db::models::{BrandFields, NewReferenceMaterial};

    fn material(brand_id: i64, name: &str, file_type: &str) -> NewReferenceMaterial {
        NewReferenceMaterial {
            brand_id,
            name: name.to_string(),
            description: None,
            file_type: file_type.to_string(),
            file_url: format!("/uploads/reference/{name}"),
            file_size: 10,
            original_filename: name.to_string(),
            extracted_text: None,
            color_analysis: None,
            style_analysis: None,
            content_tags: Some(vec!["square".to_string()]),
        }
    }

    async fn seeded() -> (Database, i64) {
        let db = memory_database().await;
        let user = db.create_user("u", "u@x.test", None, "t").await.unwrap();
        let brand = db
            .insert_brand(user.id, &BrandFields { name: "Acme".into(), ..Default::default() })
            .await
            .unwrap();
        (db, brand.id)
    }

    #[tokio::test]
    async fn generation_lookup_keeps_only_active_materials_of_the_brand() {
        let (db, brand_id) = seeded().await;
        let first = db
            .insert_reference_material(&material(brand_id, "a.png", "image"))
            .await
            .unwrap();
        let second = db
            .insert_reference_material(&material(brand_id, "b.txt", "document"))
            .await
            .unwrap();
        db.soft_delete_reference_material(second.id).await.unwrap();

        let found = db
            .reference_materials_for_generation(&[second.id, first.id, 999], brand_id)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, first.id);
        assert_eq!(found[0].tags(), &["square".to_string()]);

        let foreign = db
            .reference_materials_for_generation(&[first.id], brand_id + 1)
            .await
            .unwrap();
        assert!(foreign.is_empty());
        assert!(db
            .reference_materials_for_generation(&[], brand_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn listing_filters_by_file_type_and_touch_counts_usage() {
        let (db, brand_id) = seeded().await;
        let image = db
            .insert_reference_material(&material(brand_id, "a.png", "image"))
            .await
            .unwrap();
        db.insert_reference_material(&material(brand_id, "b.txt", "document"))
            .await
            .unwrap();

        let images = db
            .list_reference_materials(brand_id, Some("image"), 0, 20)
            .await
            .unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, image.id);
        assert_eq!(
            db.list_reference_materials(brand_id, None, 0, 20)
                .await
                .unwrap()
                .len(),
            2
        );

        db.touch_reference_material(image.id).await.unwrap();
        let touched = db.touch_reference_material(image.id).await.unwrap();
        assert_eq!(touched.usage_count, 2);
        assert!(touched.last_used.is_some());
    }

    #[tokio::test]
    async fn generation_lookup_handles_more_ids_than_sqlite_binds() {
        let (db, brand_id) = seeded().await;
        let kept = db
            .insert_reference_material(&material(brand_id, "a.png", "image"))
            .await
            .unwrap();
        let later = db
            .insert_reference_material(&material(brand_id, "b.png", "image"))
            .await
            .unwrap();

        let mut ids: Vec<i64> = (10_000..50_000).collect();
        ids.push(later.id);
        ids.push(kept.id);
        ids.push(kept.id);
        let found = db
            .reference_materials_for_generation(&ids, brand_id)
            .await
            .unwrap();
        let found_ids: Vec<i64> = found.iter().map(|m| m.id).collect();
        assert_eq!(found_ids, vec![kept.id, later.id]);
    }
}
