use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::health_metrics::dto::{
    CreateHealthMetricRequest, HealthMetricFilters, UpdateHealthMetricRequest,
};
use crate::query::date_filter;
use crate::sync::SyncStore;

const COLUMNS: &str = "id, user_id, date, weight_kg, sleep_hours, heart_rate, steps, \
                       water_ml, mood, energy_level, notes, created_at, updated_at";

/// Rows are soft-deleted; every query here excludes deleted rows.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HealthMetric {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "crate::dates::date")]
    pub date: Date,
    pub weight_kg: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub heart_rate: Option<i32>,
    pub steps: Option<i32>,
    pub water_ml: Option<i32>,
    pub mood: Option<String>,
    pub energy_level: Option<i32>,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, f: &HealthMetricFilters) {
    qb.push(" WHERE user_id = ")
        .push_bind(user_id)
        .push(" AND deleted_at IS NULL");
    if let Some(d) = date_filter(f.date.as_deref()) {
        qb.push(" AND date = ").push_bind(d);
    }
    if let Some(d) = date_filter(f.from.as_deref()) {
        qb.push(" AND date >= ").push_bind(d);
    }
    if let Some(d) = date_filter(f.to.as_deref()) {
        qb.push(" AND date <= ").push_bind(d);
    }
}

pub async fn list(
    db: &PgPool,
    user_id: Uuid,
    filters: &HealthMetricFilters,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<HealthMetric>, i64)> {
    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM health_metrics");
    push_filters(&mut count_qb, user_id, filters);
    let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM health_metrics"));
    push_filters(&mut qb, user_id, filters);
    qb.push(" ORDER BY date DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build_query_as::<HealthMetric>().fetch_all(db).await?;

    Ok((rows, total))
}

pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<HealthMetric>> {
    sqlx::query_as::<_, HealthMetric>(&format!(
        "SELECT {COLUMNS} FROM health_metrics \
         WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

/// A second non-deleted record for the same day trips the partial unique
/// index and surfaces as a 409.
pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    payload: &CreateHealthMetricRequest,
) -> sqlx::Result<HealthMetric> {
    sqlx::query_as::<_, HealthMetric>(&format!(
        "INSERT INTO health_metrics \
             (user_id, date, weight_kg, sleep_hours, heart_rate, steps, water_ml, mood, \
              energy_level, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(payload.date)
    .bind(payload.weight_kg)
    .bind(payload.sleep_hours)
    .bind(payload.heart_rate)
    .bind(payload.steps)
    .bind(payload.water_ml)
    .bind(payload.mood.as_deref())
    .bind(payload.energy_level)
    .bind(payload.notes.as_deref())
    .fetch_one(db)
    .await
}

pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    payload: &UpdateHealthMetricRequest,
) -> sqlx::Result<Option<HealthMetric>> {
    sqlx::query_as::<_, HealthMetric>(&format!(
        "UPDATE health_metrics SET \
             date = COALESCE($3, date), \
             weight_kg = COALESCE($4, weight_kg), \
             sleep_hours = COALESCE($5, sleep_hours), \
             heart_rate = COALESCE($6, heart_rate), \
             steps = COALESCE($7, steps), \
             water_ml = COALESCE($8, water_ml), \
             mood = COALESCE($9, mood), \
             energy_level = COALESCE($10, energy_level), \
             notes = COALESCE($11, notes), \
             updated_at = now() \
         WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .bind(payload.date)
    .bind(payload.weight_kg)
    .bind(payload.sleep_hours)
    .bind(payload.heart_rate)
    .bind(payload.steps)
    .bind(payload.water_ml)
    .bind(payload.mood.as_deref())
    .bind(payload.energy_level)
    .bind(payload.notes.as_deref())
    .fetch_optional(db)
    .await
}

pub async fn soft_delete(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "UPDATE health_metrics SET deleted_at = now(), updated_at = now() \
         WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Natural key: (user_id, date) among non-deleted rows.
pub async fn find_by_natural_key(
    db: &PgPool,
    user_id: Uuid,
    date: Date,
) -> sqlx::Result<Option<Uuid>> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM health_metrics \
         WHERE user_id = $1 AND date = $2 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .bind(date)
    .fetch_optional(db)
    .await
}

pub struct HealthMetricSyncStore<'a> {
    pub db: &'a PgPool,
}

#[async_trait]
impl SyncStore<CreateHealthMetricRequest> for HealthMetricSyncStore<'_> {
    async fn find_existing(
        &mut self,
        user_id: Uuid,
        item: &CreateHealthMetricRequest,
    ) -> anyhow::Result<Option<Uuid>> {
        Ok(find_by_natural_key(self.db, user_id, item.date).await?)
    }

    async fn insert(
        &mut self,
        user_id: Uuid,
        item: &CreateHealthMetricRequest,
    ) -> anyhow::Result<Uuid> {
        Ok(insert(self.db, user_id, item).await?.id)
    }

    async fn update(
        &mut self,
        user_id: Uuid,
        id: Uuid,
        item: &CreateHealthMetricRequest,
    ) -> anyhow::Result<()> {
        update(
            self.db,
            user_id,
            id,
            &UpdateHealthMetricRequest::from_sync_item(item),
        )
        .await?
        .ok_or_else(|| anyhow::anyhow!("health metric no longer exists"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{reconcile, ConflictResolution};
    use std::collections::HashMap;

    /// In-memory store keyed by (user, date), the same natural key the
    /// Postgres store resolves against.
    #[derive(Default)]
    struct MemMetricStore {
        rows: HashMap<(Uuid, Date), (Uuid, Option<f64>)>,
    }

    #[async_trait]
    impl SyncStore<CreateHealthMetricRequest> for MemMetricStore {
        async fn find_existing(
            &mut self,
            user_id: Uuid,
            item: &CreateHealthMetricRequest,
        ) -> anyhow::Result<Option<Uuid>> {
            Ok(self.rows.get(&(user_id, item.date)).map(|(id, _)| *id))
        }

        async fn insert(
            &mut self,
            user_id: Uuid,
            item: &CreateHealthMetricRequest,
        ) -> anyhow::Result<Uuid> {
            let id = Uuid::new_v4();
            self.rows.insert((user_id, item.date), (id, item.weight_kg));
            Ok(id)
        }

        async fn update(
            &mut self,
            user_id: Uuid,
            id: Uuid,
            item: &CreateHealthMetricRequest,
        ) -> anyhow::Result<()> {
            self.rows.insert((user_id, item.date), (id, item.weight_kg));
            Ok(())
        }
    }

    fn metric(date: &str, weight_kg: f64) -> CreateHealthMetricRequest {
        serde_json::from_value(serde_json::json!({"date": date, "weight_kg": weight_kg})).unwrap()
    }

    fn valid(_: &CreateHealthMetricRequest) -> Result<(), String> {
        Ok(())
    }

    #[tokio::test]
    async fn repeated_sync_of_the_same_day_updates_the_single_record() {
        let mut store = MemMetricStore::default();
        let user = Uuid::new_v4();

        let first = reconcile(
            &mut store,
            user,
            &[metric("2024-03-01", 72.0)],
            ConflictResolution::ClientWins,
            valid,
        )
        .await;
        assert_eq!(first.synced_count, 1);

        let second = reconcile(
            &mut store,
            user,
            &[metric("2024-03-01", 71.5)],
            ConflictResolution::ClientWins,
            valid,
        )
        .await;
        assert_eq!(second.updated_count, 1);
        assert_eq!(store.rows.len(), 1);

        let key = (user, crate::dates::parse_date("2024-03-01").unwrap());
        assert_eq!(store.rows[&key].1, Some(71.5));
    }
}
