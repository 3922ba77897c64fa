use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::medications::dto::{
    CreateMedicationRequest, MedicationFilters, UpdateMedicationRequest,
};
use crate::query::truthy;
use crate::sync::SyncStore;

const COLUMNS: &str = "id, user_id, name, dosage, frequency, reminder_times, start_date, \
                       end_date, is_active, notes, created_at, updated_at";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Medication {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub reminder_times: serde_json::Value,
    #[serde(with = "crate::dates::date_option")]
    pub start_date: Option<Date>,
    #[serde(with = "crate::dates::date_option")]
    pub end_date: Option<Date>,
    pub is_active: bool,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, f: &MedicationFilters) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if truthy(f.active.as_deref()) {
        qb.push(" AND is_active = TRUE");
    }
}

pub async fn list(
    db: &PgPool,
    user_id: Uuid,
    filters: &MedicationFilters,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<Medication>, i64)> {
    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM medications");
    push_filters(&mut count_qb, user_id, filters);
    let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM medications"));
    push_filters(&mut qb, user_id, filters);
    qb.push(" ORDER BY name ASC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build_query_as::<Medication>().fetch_all(db).await?;

    Ok((rows, total))
}

pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<Medication>> {
    sqlx::query_as::<_, Medication>(&format!(
        "SELECT {COLUMNS} FROM medications WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    payload: &CreateMedicationRequest,
) -> sqlx::Result<Medication> {
    sqlx::query_as::<_, Medication>(&format!(
        "INSERT INTO medications \
             (user_id, name, dosage, frequency, reminder_times, start_date, end_date, \
              is_active, notes) \
         VALUES ($1, $2, $3, $4, COALESCE($5, '[]'::jsonb), $6, $7, $8, $9) \
         RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(&payload.name)
    .bind(payload.dosage.as_deref())
    .bind(payload.frequency.as_deref())
    .bind(payload.reminder_times.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.is_active)
    .bind(payload.notes.as_deref())
    .fetch_one(db)
    .await
}

pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    payload: &UpdateMedicationRequest,
) -> sqlx::Result<Option<Medication>> {
    sqlx::query_as::<_, Medication>(&format!(
        "UPDATE medications SET \
             name = COALESCE($3, name), \
             dosage = COALESCE($4, dosage), \
             frequency = COALESCE($5, frequency), \
             reminder_times = COALESCE($6, reminder_times), \
             start_date = COALESCE($7, start_date), \
             end_date = COALESCE($8, end_date), \
             is_active = COALESCE($9, is_active), \
             notes = COALESCE($10, notes), \
             updated_at = now() \
         WHERE id = $1 AND user_id = $2 \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .bind(payload.name.as_deref())
    .bind(payload.dosage.as_deref())
    .bind(payload.frequency.as_deref())
    .bind(payload.reminder_times.as_ref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.is_active)
    .bind(payload.notes.as_deref())
    .fetch_optional(db)
    .await
}

pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM medications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Natural key: (user_id, name).
pub async fn find_by_natural_key(
    db: &PgPool,
    user_id: Uuid,
    name: &str,
) -> sqlx::Result<Option<Uuid>> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM medications WHERE user_id = $1 AND name = $2")
        .bind(user_id)
        .bind(name)
        .fetch_optional(db)
        .await
}

pub struct MedicationSyncStore<'a> {
    pub db: &'a PgPool,
}

#[async_trait]
impl SyncStore<CreateMedicationRequest> for MedicationSyncStore<'_> {
    async fn find_existing(
        &mut self,
        user_id: Uuid,
        item: &CreateMedicationRequest,
    ) -> anyhow::Result<Option<Uuid>> {
        Ok(find_by_natural_key(self.db, user_id, &item.name).await?)
    }

    async fn insert(
        &mut self,
        user_id: Uuid,
        item: &CreateMedicationRequest,
    ) -> anyhow::Result<Uuid> {
        Ok(insert(self.db, user_id, item).await?.id)
    }

    async fn update(
        &mut self,
        user_id: Uuid,
        id: Uuid,
        item: &CreateMedicationRequest,
    ) -> anyhow::Result<()> {
        update(
            self.db,
            user_id,
            id,
            &UpdateMedicationRequest::from_sync_item(item),
        )
        .await?
        .ok_or_else(|| anyhow::anyhow!("medication no longer exists"))?;
        Ok(())
    }
}
