use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::meal_plans::dto::{CreateMealPlanRequest, MealPlanFilters, UpdateMealPlanRequest};
use crate::query::truthy;
use crate::sync::SyncStore;

const COLUMNS: &str = "id, user_id, name, start_date, end_date, is_active, goals, metadata, \
                       created_at, updated_at";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MealPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(with = "crate::dates::date_option")]
    pub start_date: Option<Date>,
    #[serde(with = "crate::dates::date_option")]
    pub end_date: Option<Date>,
    pub is_active: bool,
    pub goals: serde_json::Value,
    pub metadata: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, f: &MealPlanFilters) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if truthy(f.active.as_deref()) {
        qb.push(" AND is_active = TRUE");
    }
}

pub async fn list(
    db: &PgPool,
    user_id: Uuid,
    filters: &MealPlanFilters,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<MealPlan>, i64)> {
    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM meal_plans");
    push_filters(&mut count_qb, user_id, filters);
    let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM meal_plans"));
    push_filters(&mut qb, user_id, filters);
    qb.push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build_query_as::<MealPlan>().fetch_all(db).await?;

    Ok((rows, total))
}

pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<Option<MealPlan>> {
    sqlx::query_as::<_, MealPlan>(&format!(
        "SELECT {COLUMNS} FROM meal_plans WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

/// Clears the active flag on every other plan so at most one stays active.
pub async fn deactivate_others(
    db: &PgPool,
    user_id: Uuid,
    except_id: Option<Uuid>,
) -> sqlx::Result<()> {
    let mut qb = QueryBuilder::new(
        "UPDATE meal_plans SET is_active = FALSE, updated_at = now() WHERE user_id = ",
    );
    qb.push_bind(user_id).push(" AND is_active = TRUE");
    if let Some(id) = except_id {
        qb.push(" AND id <> ").push_bind(id);
    }
    qb.build().execute(db).await?;
    Ok(())
}

pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    payload: &CreateMealPlanRequest,
) -> sqlx::Result<MealPlan> {
    if payload.is_active {
        deactivate_others(db, user_id, None).await?;
    }
    sqlx::query_as::<_, MealPlan>(&format!(
        "INSERT INTO meal_plans \
             (user_id, name, start_date, end_date, is_active, goals, metadata) \
         VALUES ($1, $2, $3, $4, $5, COALESCE($6, '[]'::jsonb), COALESCE($7, '{{}}'::jsonb)) \
         RETURNING {COLUMNS}"
    ))
    .bind(user_id)
    .bind(&payload.name)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.is_active)
    .bind(payload.goals.as_ref())
    .bind(payload.metadata.as_ref())
    .fetch_one(db)
    .await
}

pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    payload: &UpdateMealPlanRequest,
) -> sqlx::Result<Option<MealPlan>> {
    if payload.is_active == Some(true) {
        deactivate_others(db, user_id, Some(id)).await?;
    }
    sqlx::query_as::<_, MealPlan>(&format!(
        "UPDATE meal_plans SET \
             name = COALESCE($3, name), \
             start_date = COALESCE($4, start_date), \
             end_date = COALESCE($5, end_date), \
             is_active = COALESCE($6, is_active), \
             goals = COALESCE($7, goals), \
             metadata = COALESCE($8, metadata), \
             updated_at = now() \
         WHERE id = $1 AND user_id = $2 \
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .bind(payload.name.as_deref())
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.is_active)
    .bind(payload.goals.as_ref())
    .bind(payload.metadata.as_ref())
    .fetch_optional(db)
    .await
}

pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM meal_plans WHERE id = $1 AND user_id = $2")
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
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM meal_plans WHERE user_id = $1 AND name = $2")
        .bind(user_id)
        .bind(name)
        .fetch_optional(db)
        .await
}

pub struct MealPlanSyncStore<'a> {
    pub db: &'a PgPool,
}

#[async_trait]
impl SyncStore<CreateMealPlanRequest> for MealPlanSyncStore<'_> {
    async fn find_existing(
        &mut self,
        user_id: Uuid,
        item: &CreateMealPlanRequest,
    ) -> anyhow::Result<Option<Uuid>> {
        Ok(find_by_natural_key(self.db, user_id, &item.name).await?)
    }

    async fn insert(
        &mut self,
        user_id: Uuid,
        item: &CreateMealPlanRequest,
    ) -> anyhow::Result<Uuid> {
        Ok(insert(self.db, user_id, item).await?.id)
    }

    async fn update(
        &mut self,
        user_id: Uuid,
        id: Uuid,
        item: &CreateMealPlanRequest,
    ) -> anyhow::Result<()> {
        update(
            self.db,
            user_id,
            id,
            &UpdateMealPlanRequest::from_sync_item(item),
        )
        .await?
        .ok_or_else(|| anyhow::anyhow!("meal plan no longer exists"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{reconcile, ConflictResolution};
    use std::collections::HashMap;

    /// In-memory store keyed by (user, name) that mirrors the
    /// deactivate-before-activate write order of the Postgres store.
    #[derive(Default)]
    struct MemPlanStore {
        rows: HashMap<(Uuid, String), (Uuid, bool)>,
    }

    impl MemPlanStore {
        fn activate(&mut self, user_id: Uuid, winner: Uuid) {
            for ((owner, _), (id, active)) in self.rows.iter_mut() {
                if *owner == user_id && *id != winner {
                    *active = false;
                }
            }
        }

        fn active_plans(&self, user_id: Uuid) -> Vec<String> {
            self.rows
                .iter()
                .filter(|((owner, _), (_, active))| *owner == user_id && *active)
                .map(|((_, name), _)| name.clone())
                .collect()
        }
    }

    #[async_trait]
    impl SyncStore<CreateMealPlanRequest> for MemPlanStore {
        async fn find_existing(
            &mut self,
            user_id: Uuid,
            item: &CreateMealPlanRequest,
        ) -> anyhow::Result<Option<Uuid>> {
            Ok(self
                .rows
                .get(&(user_id, item.name.clone()))
                .map(|(id, _)| *id))
        }

        async fn insert(
            &mut self,
            user_id: Uuid,
            item: &CreateMealPlanRequest,
        ) -> anyhow::Result<Uuid> {
            let id = Uuid::new_v4();
            self.rows
                .insert((user_id, item.name.clone()), (id, item.is_active));
            if item.is_active {
                self.activate(user_id, id);
            }
            Ok(id)
        }

        async fn update(
            &mut self,
            user_id: Uuid,
            id: Uuid,
            item: &CreateMealPlanRequest,
        ) -> anyhow::Result<()> {
            self.rows
                .insert((user_id, item.name.clone()), (id, item.is_active));
            if item.is_active {
                self.activate(user_id, id);
            }
            Ok(())
        }
    }

    fn plan(name: &str, active: bool) -> CreateMealPlanRequest {
        serde_json::from_value(serde_json::json!({"name": name, "is_active": active})).unwrap()
    }

    fn valid(_: &CreateMealPlanRequest) -> Result<(), String> {
        Ok(())
    }

    #[tokio::test]
    async fn at_most_one_plan_stays_active_across_syncs() {
        let mut store = MemPlanStore::default();
        let user = Uuid::new_v4();

        let batch = vec![
            plan("Cutting", true),
            plan("Bulking", true),
            plan("Maintenance", false),
        ];
        reconcile(&mut store, user, &batch, ConflictResolution::ClientWins, valid).await;
        assert_eq!(store.active_plans(user), vec!["Bulking".to_string()]);

        // a later batch that re-activates an existing plan moves the flag
        let batch = vec![plan("Cutting", true)];
        reconcile(&mut store, user, &batch, ConflictResolution::ClientWins, valid).await;
        assert_eq!(store.active_plans(user), vec!["Cutting".to_string()]);
        assert_eq!(store.rows.len(), 3);
    }

    #[tokio::test]
    async fn another_users_active_plan_is_untouched() {
        let mut store = MemPlanStore::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        reconcile(
            &mut store,
            alice,
            &[plan("Alice plan", true)],
            ConflictResolution::ClientWins,
            valid,
        )
        .await;
        reconcile(
            &mut store,
            bob,
            &[plan("Bob plan", true)],
            ConflictResolution::ClientWins,
            valid,
        )
        .await;

        assert_eq!(store.active_plans(alice).len(), 1);
        assert_eq!(store.active_plans(bob).len(), 1);
    }
}
