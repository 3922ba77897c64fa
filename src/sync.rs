use async_trait::async_trait;
use axum::{response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::response;
use crate::state::AppState;

/// Caller-declared conflict resolution. Applied as declared, there is no
/// timestamp or version comparison behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    #[default]
    ClientWins,
    ServerWins,
}

#[derive(Debug, Default, Serialize)]
pub struct SyncOutcome {
    /// Items inserted because no row matched their natural key.
    pub synced_count: usize,
    /// Items that matched an existing row and overwrote it.
    pub updated_count: usize,
    /// Items that matched but were left untouched under server_wins.
    pub skipped_count: usize,
    pub errors: Vec<SyncItemError>,
}

#[derive(Debug, Serialize)]
pub struct SyncItemError {
    pub index: usize,
    pub message: String,
}

/// Per-entity persistence operations for the reconciliation loop. The
/// lookup must be scoped to `user_id`, the natural key is the store's
/// business.
#[async_trait]
pub trait SyncStore<T: Sync> {
    async fn find_existing(&mut self, user_id: Uuid, item: &T) -> anyhow::Result<Option<Uuid>>;
    async fn insert(&mut self, user_id: Uuid, item: &T) -> anyhow::Result<Uuid>;
    async fn update(&mut self, user_id: Uuid, id: Uuid, item: &T) -> anyhow::Result<()>;
}

/// Bulk natural-key upsert. Items are independent: a failure is recorded
/// under its index and the loop continues, nothing is rolled back.
pub async fn reconcile<T, S, V>(
    store: &mut S,
    user_id: Uuid,
    items: &[T],
    resolution: ConflictResolution,
    validate: V,
) -> SyncOutcome
where
    T: Sync,
    S: SyncStore<T> + Send,
    V: Fn(&T) -> Result<(), String>,
{
    let mut outcome = SyncOutcome::default();

    for (index, item) in items.iter().enumerate() {
        if let Err(message) = validate(item) {
            outcome.errors.push(SyncItemError { index, message });
            continue;
        }

        match store.find_existing(user_id, item).await {
            Ok(Some(existing_id)) => match resolution {
                ConflictResolution::ServerWins => outcome.skipped_count += 1,
                ConflictResolution::ClientWins => {
                    match store.update(user_id, existing_id, item).await {
                        Ok(()) => outcome.updated_count += 1,
                        Err(e) => outcome.errors.push(SyncItemError {
                            index,
                            message: e.to_string(),
                        }),
                    }
                }
            },
            Ok(None) => match store.insert(user_id, item).await {
                Ok(_) => outcome.synced_count += 1,
                Err(e) => outcome.errors.push(SyncItemError {
                    index,
                    message: e.to_string(),
                }),
            },
            Err(e) => outcome.errors.push(SyncItemError {
                index,
                message: e.to_string(),
            }),
        }
    }

    outcome
}

/// Advisory per-(user, entity type) bookkeeping, touched after every
/// batch. Not consulted for conflict detection.
pub async fn touch_status(db: &PgPool, user_id: Uuid, entity_type: &str) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO sync_status (user_id, entity_type, last_synced_at) VALUES ($1, $2, now()) \
         ON CONFLICT (user_id, entity_type) DO UPDATE SET last_synced_at = now()",
    )
    .bind(user_id)
    .bind(entity_type)
    .execute(db)
    .await?;
    Ok(())
}

/// Best-effort variant used by the sync handlers; bookkeeping must never
/// fail a batch that already applied.
pub async fn touch_status_logged(db: &PgPool, user_id: Uuid, entity_type: &str) {
    if let Err(e) = touch_status(db, user_id, entity_type).await {
        warn!(error = %e, entity_type, "failed to update sync status");
    }
}

#[derive(Debug, Serialize, FromRow)]
pub struct SyncStatusRow {
    pub entity_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_synced_at: OffsetDateTime,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/sync/status", get(get_sync_status))
}

#[instrument(skip(state))]
async fn get_sync_status(
    axum::extract::State(state): axum::extract::State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let rows = sqlx::query_as::<_, SyncStatusRow>(
        "SELECT entity_type, last_synced_at FROM sync_status \
         WHERE user_id = $1 ORDER BY entity_type",
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(response::ok("Sync status retrieved", rows))
}

/// Handlers serialize the outcome inside the standard envelope.
pub fn outcome_response(entity: &str, outcome: SyncOutcome) -> Json<crate::response::Envelope<SyncOutcome>> {
    response::ok(&format!("{entity} synchronized"), outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// In-memory store keyed by a (user, name) natural key.
    #[derive(Default)]
    struct MemStore {
        rows: HashMap<(Uuid, String), (Uuid, i32)>,
        fail_on: Option<String>,
    }

    #[derive(Clone)]
    struct Item {
        name: String,
        value: i32,
    }

    #[async_trait]
    impl SyncStore<Item> for MemStore {
        async fn find_existing(
            &mut self,
            user_id: Uuid,
            item: &Item,
        ) -> anyhow::Result<Option<Uuid>> {
            Ok(self
                .rows
                .get(&(user_id, item.name.clone()))
                .map(|(id, _)| *id))
        }

        async fn insert(&mut self, user_id: Uuid, item: &Item) -> anyhow::Result<Uuid> {
            if self.fail_on.as_deref() == Some(item.name.as_str()) {
                anyhow::bail!("insert failed");
            }
            let id = Uuid::new_v4();
            self.rows
                .insert((user_id, item.name.clone()), (id, item.value));
            Ok(id)
        }

        async fn update(&mut self, user_id: Uuid, id: Uuid, item: &Item) -> anyhow::Result<()> {
            self.rows
                .insert((user_id, item.name.clone()), (id, item.value));
            Ok(())
        }
    }

    fn valid(_: &Item) -> Result<(), String> {
        Ok(())
    }

    #[tokio::test]
    async fn sync_is_idempotent_for_unchanged_input() {
        let mut store = MemStore::default();
        let user = Uuid::new_v4();
        let items = vec![Item {
            name: "eggs".into(),
            value: 200,
        }];

        let first = reconcile(&mut store, user, &items, ConflictResolution::ClientWins, valid).await;
        assert_eq!(first.synced_count, 1);
        assert_eq!(first.updated_count, 0);

        let second =
            reconcile(&mut store, user, &items, ConflictResolution::ClientWins, valid).await;
        assert_eq!(second.synced_count, 0);
        assert_eq!(second.updated_count, 1);
        assert_eq!(store.rows.len(), 1);
    }

    #[tokio::test]
    async fn natural_keys_are_scoped_per_user() {
        let mut store = MemStore::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let items = vec![Item {
            name: "run".into(),
            value: 1,
        }];

        reconcile(&mut store, alice, &items, ConflictResolution::ClientWins, valid).await;
        let outcome =
            reconcile(&mut store, bob, &items, ConflictResolution::ClientWins, valid).await;

        assert_eq!(outcome.synced_count, 1);
        assert_eq!(store.rows.len(), 2);
    }

    #[tokio::test]
    async fn server_wins_skips_matched_rows() {
        let mut store = MemStore::default();
        let user = Uuid::new_v4();
        let items = vec![Item {
            name: "eggs".into(),
            value: 200,
        }];
        reconcile(&mut store, user, &items, ConflictResolution::ClientWins, valid).await;

        let changed = vec![Item {
            name: "eggs".into(),
            value: 999,
        }];
        let outcome =
            reconcile(&mut store, user, &changed, ConflictResolution::ServerWins, valid).await;

        assert_eq!(outcome.skipped_count, 1);
        assert_eq!(outcome.updated_count, 0);
        assert_eq!(store.rows[&(user, "eggs".to_string())].1, 200);
    }

    #[tokio::test]
    async fn failures_are_per_item_and_do_not_abort_the_batch() {
        let mut store = MemStore {
            fail_on: Some("bad".into()),
            ..Default::default()
        };
        let user = Uuid::new_v4();
        let items = vec![
            Item {
                name: "good".into(),
                value: 1,
            },
            Item {
                name: "bad".into(),
                value: 2,
            },
            Item {
                name: "also-good".into(),
                value: 3,
            },
        ];

        let outcome =
            reconcile(&mut store, user, &items, ConflictResolution::ClientWins, valid).await;

        assert_eq!(outcome.synced_count, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].index, 1);
        // the earlier item survives the later failure
        assert!(store.rows.contains_key(&(user, "good".to_string())));
    }

    #[tokio::test]
    async fn invalid_items_are_reported_with_their_index() {
        let mut store = MemStore::default();
        let user = Uuid::new_v4();
        let items = vec![
            Item {
                name: "ok".into(),
                value: 1,
            },
            Item {
                name: "".into(),
                value: 2,
            },
        ];

        let outcome = reconcile(
            &mut store,
            user,
            &items,
            ConflictResolution::ClientWins,
            |item: &Item| {
                if item.name.is_empty() {
                    Err("name is required".into())
                } else {
                    Ok(())
                }
            },
        )
        .await;

        assert_eq!(outcome.synced_count, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].index, 1);
        assert_eq!(outcome.errors[0].message, "name is required");
    }

    #[test]
    fn conflict_resolution_deserializes_snake_case_and_defaults() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default)]
            conflict_resolution: ConflictResolution,
        }

        let p: Probe = serde_json::from_str(r#"{"conflict_resolution": "server_wins"}"#).unwrap();
        assert_eq!(p.conflict_resolution, ConflictResolution::ServerWins);
        let p: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(p.conflict_resolution, ConflictResolution::ClientWins);
    }
}
