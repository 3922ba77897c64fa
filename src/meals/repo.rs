use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::meals::dto::{CreateMealRequest, MealFilters, UpdateMealRequest};
use crate::query::date_filter;
use crate::sync::SyncStore;

const COLUMNS: &str = "id, user_id, date, meal_type, name, calories, protein_g, carbs_g, \
                       fat_g, ingredients, eating_reasons, notes, created_at, updated_at";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "crate::dates::date")]
    pub date: Date,
    pub meal_type: String,
    pub name: String,
    pub calories: Option<i32>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub ingredients: serde_json::Value,
    pub eating_reasons: serde_json::Value,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, f: &MealFilters) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(d) = date_filter(f.date.as_deref()) {
        qb.push(" AND date = ").push_bind(d);
    }
    if let Some(d) = date_filter(f.from.as_deref()) {
        qb.push(" AND date >= ").push_bind(d);
    }
    if let Some(d) = date_filter(f.to.as_deref()) {
        qb.push(" AND date <= ").push_bind(d);
    }
    if let Some(mt) = f.meal_type.as_deref().filter(|v| !v.is_empty()) {
        qb.push(" AND meal_type = ").push_bind(mt.to_string());
    }
}

pub async fn list(
    db: &PgPool,
    user_id: Uuid,
    filters: &MealFilters,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<Meal>, i64)> {
    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM meals");
    push_filters(&mut count_qb, user_id, filters);
    let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM meals"));
    push_filters(&mut qb, user_id, filters);
    qb.push(" ORDER BY date DESC, created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build_query_as::<Meal>().fetch_all(db).await?;

    Ok((rows, total))
}

pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<Meal>> {
    sqlx::query_as::<_, Meal>(&format!(
        "SELECT {COLUMNS} FROM meals WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn insert(db: &PgPool, user_id: Uuid, payload: &CreateMealRequest) -> sqlx::Result<Meal> {
    sqlx::query_as::<_, Meal>(&format!(
        "INSERT INTO meals \
             (user_id, date, meal_type, name, calories, protein_g, carbs_g, fat_g, \
              ingredients, eating_reasons, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, \
                 COALESCE($9, '[]'::jsonb), COALESCE($10, '[]'::jsonb), $11) \
         RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(payload.date)
    .bind(&payload.meal_type)
    .bind(&payload.name)
    .bind(payload.calories)
    .bind(payload.protein_g)
    .bind(payload.carbs_g)
    .bind(payload.fat_g)
    .bind(payload.ingredients.as_ref())
    .bind(payload.eating_reasons.as_ref())
    .bind(payload.notes.as_deref())
    .fetch_one(db)
    .await
}

/// Partial update; JSON columns are replaced wholesale, never merged.
pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    payload: &UpdateMealRequest,
) -> sqlx::Result<Option<Meal>> {
    sqlx::query_as::<_, Meal>(&format!(
        "UPDATE meals SET \
             date = COALESCE($3, date), \
             meal_type = COALESCE($4, meal_type), \
             name = COALESCE($5, name), \
             calories = COALESCE($6, calories), \
             protein_g = COALESCE($7, protein_g), \
             carbs_g = COALESCE($8, carbs_g), \
             fat_g = COALESCE($9, fat_g), \
             ingredients = COALESCE($10, ingredients), \
             eating_reasons = COALESCE($11, eating_reasons), \
             notes = COALESCE($12, notes), \
             updated_at = now() \
         WHERE id = $1 AND user_id = $2 \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .bind(payload.date)
    .bind(payload.meal_type.as_deref())
    .bind(payload.name.as_deref())
    .bind(payload.calories)
    .bind(payload.protein_g)
    .bind(payload.carbs_g)
    .bind(payload.fat_g)
    .bind(payload.ingredients.as_ref())
    .bind(payload.eating_reasons.as_ref())
    .bind(payload.notes.as_deref())
    .fetch_optional(db)
    .await
}

pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM meals WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Natural key: (user_id, date, meal_type, name).
pub async fn find_by_natural_key(
    db: &PgPool,
    user_id: Uuid,
    date: Date,
    meal_type: &str,
    name: &str,
) -> sqlx::Result<Option<Uuid>> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM meals \
         WHERE user_id = $1 AND date = $2 AND meal_type = $3 AND name = $4",
    )
    .bind(user_id)
    .bind(date)
    .bind(meal_type)
    .bind(name)
    .fetch_optional(db)
    .await
}

pub struct MealSyncStore<'a> {
    pub db: &'a PgPool,
}

#[async_trait]
impl SyncStore<CreateMealRequest> for MealSyncStore<'_> {
    async fn find_existing(
        &mut self,
        user_id: Uuid,
        item: &CreateMealRequest,
    ) -> anyhow::Result<Option<Uuid>> {
        Ok(find_by_natural_key(self.db, user_id, item.date, &item.meal_type, &item.name).await?)
    }

    async fn insert(&mut self, user_id: Uuid, item: &CreateMealRequest) -> anyhow::Result<Uuid> {
        Ok(insert(self.db, user_id, item).await?.id)
    }

    async fn update(
        &mut self,
        user_id: Uuid,
        id: Uuid,
        item: &CreateMealRequest,
    ) -> anyhow::Result<()> {
        update(self.db, user_id, id, &UpdateMealRequest::from_sync_item(item))
            .await?
            .ok_or_else(|| anyhow::anyhow!("meal no longer exists"))?;
        Ok(())
    }
}
