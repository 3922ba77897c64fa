use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::exercises::dto::{CreateExerciseRequest, ExerciseFilters, UpdateExerciseRequest};
use crate::query::{date_filter, truthy};
use crate::sync::SyncStore;

const COLUMNS: &str = "id, user_id, name, is_template, date, duration_minutes, calories_burned, \
                       intensity, muscle_groups, equipment, notes, created_at, updated_at";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Exercise {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub is_template: bool,
    #[serde(with = "crate::dates::date_option")]
    pub date: Option<Date>,
    pub duration_minutes: Option<i32>,
    pub calories_burned: Option<i32>,
    pub intensity: Option<String>,
    pub muscle_groups: serde_json::Value,
    pub equipment: serde_json::Value,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, f: &ExerciseFilters) {
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
    if let Some(i) = f.intensity.as_deref().filter(|v| !v.is_empty()) {
        qb.push(" AND intensity = ").push_bind(i.to_string());
    }
    if truthy(f.template.as_deref()) {
        qb.push(" AND is_template = TRUE");
    }
}

pub async fn list(
    db: &PgPool,
    user_id: Uuid,
    filters: &ExerciseFilters,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<Exercise>, i64)> {
    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM exercises");
    push_filters(&mut count_qb, user_id, filters);
    let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM exercises"));
    push_filters(&mut qb, user_id, filters);
    qb.push(" ORDER BY date DESC NULLS LAST, created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build_query_as::<Exercise>().fetch_all(db).await?;

    Ok((rows, total))
}

pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<Exercise>> {
    sqlx::query_as::<_, Exercise>(&format!(
        "SELECT {COLUMNS} FROM exercises WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    payload: &CreateExerciseRequest,
) -> sqlx::Result<Exercise> {
    sqlx::query_as::<_, Exercise>(&format!(
        "INSERT INTO exercises \
             (user_id, name, is_template, date, duration_minutes, calories_burned, intensity, \
              muscle_groups, equipment, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, \
                 COALESCE($8, '[]'::jsonb), COALESCE($9, '[]'::jsonb), $10) \
         RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(&payload.name)
    .bind(payload.is_template)
    .bind(payload.date)
    .bind(payload.duration_minutes)
    .bind(payload.calories_burned)
    .bind(payload.intensity.as_deref())
    .bind(payload.muscle_groups.as_ref())
    .bind(payload.equipment.as_ref())
    .bind(payload.notes.as_deref())
    .fetch_one(db)
    .await
}

pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    payload: &UpdateExerciseRequest,
) -> sqlx::Result<Option<Exercise>> {
    sqlx::query_as::<_, Exercise>(&format!(
        "UPDATE exercises SET \
             name = COALESCE($3, name), \
             is_template = COALESCE($4, is_template), \
             date = COALESCE($5, date), \
             duration_minutes = COALESCE($6, duration_minutes), \
             calories_burned = COALESCE($7, calories_burned), \
             intensity = COALESCE($8, intensity), \
             muscle_groups = COALESCE($9, muscle_groups), \
             equipment = COALESCE($10, equipment), \
             notes = COALESCE($11, notes), \
             updated_at = now() \
         WHERE id = $1 AND user_id = $2 \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .bind(payload.name.as_deref())
    .bind(payload.is_template)
    .bind(payload.date)
    .bind(payload.duration_minutes)
    .bind(payload.calories_burned)
    .bind(payload.intensity.as_deref())
    .bind(payload.muscle_groups.as_ref())
    .bind(payload.equipment.as_ref())
    .bind(payload.notes.as_deref())
    .fetch_optional(db)
    .await
}

pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM exercises WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Natural key: (user_id, name, is_template).
pub async fn find_by_natural_key(
    db: &PgPool,
    user_id: Uuid,
    name: &str,
    is_template: bool,
) -> sqlx::Result<Option<Uuid>> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM exercises WHERE user_id = $1 AND name = $2 AND is_template = $3",
    )
    .bind(user_id)
    .bind(name)
    .bind(is_template)
    .fetch_optional(db)
    .await
}

pub struct ExerciseSyncStore<'a> {
    pub db: &'a PgPool,
}

#[async_trait]
impl SyncStore<CreateExerciseRequest> for ExerciseSyncStore<'_> {
    async fn find_existing(
        &mut self,
        user_id: Uuid,
        item: &CreateExerciseRequest,
    ) -> anyhow::Result<Option<Uuid>> {
        Ok(find_by_natural_key(self.db, user_id, &item.name, item.is_template).await?)
    }

    async fn insert(
        &mut self,
        user_id: Uuid,
        item: &CreateExerciseRequest,
    ) -> anyhow::Result<Uuid> {
        Ok(insert(self.db, user_id, item).await?.id)
    }

    async fn update(
        &mut self,
        user_id: Uuid,
        id: Uuid,
        item: &CreateExerciseRequest,
    ) -> anyhow::Result<()> {
        update(
            self.db,
            user_id,
            id,
            &UpdateExerciseRequest::from_sync_item(item),
        )
        .await?
        .ok_or_else(|| anyhow::anyhow!("exercise no longer exists"))?;
        Ok(())
    }
}
