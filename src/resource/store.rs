use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{FieldSet, PartialList, Queries, Resource, ResourceError};
use crate::config::DatabaseConfig;

/// What `update` does when no row has the resource's id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMissing {
    /// Fail with [`ResourceError::NotFound`].
    #[default]
    NotFound,
    /// Succeed without touching the resource; `updated_at` keeps its value.
    Ignore,
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Deadline for a single store operation, including waiting for a connection.
    pub timeout: Duration,
    pub update_missing: UpdateMissing,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            update_missing: UpdateMissing::default(),
        }
    }
}

impl From<&DatabaseConfig> for StoreOptions {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.operation_timeout_ms),
            update_missing: config.update_missing,
        }
    }
}

/// CRUD over one resource table. Cloning is cheap and shares the pool.
#[derive(Clone)]
pub struct ResourceStore {
    pool: PgPool,
    queries: Arc<Queries>,
    options: StoreOptions,
}

impl ResourceStore {
    pub fn new(pool: PgPool, table: &str, options: StoreOptions) -> Result<Self, ResourceError> {
        Ok(Self {
            pool,
            queries: Arc::new(Queries::new(table)?),
            options,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Page through resources in creation order. `fields` is never loaded.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Resource>, PartialList> {
        let mut items = Vec::new();

        let read = async {
            let mut rows = sqlx::query(&self.queries.list)
                .bind(limit)
                .bind(offset)
                .fetch(&self.pool);
            while let Some(row) = rows.try_next().await? {
                items.push(summary_from_row(&row)?);
            }
            Ok::<_, ResourceError>(())
        };

        let outcome = match tokio::time::timeout(self.options.timeout, read).await {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error("list")),
        };

        match outcome {
            Ok(()) => Ok(items),
            Err(source) => Err(PartialList { items, source }),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Resource, ResourceError> {
        let Some(key) = parse_id(id) else {
            return Err(ResourceError::NotFound(id.to_string()));
        };

        let row = self
            .bounded(
                "get",
                sqlx::query(&self.queries.get)
                    .bind(key)
                    .fetch_optional(&self.pool),
            )
            .await?
            .ok_or_else(|| ResourceError::NotFound(id.to_string()))?;

        let mut resource = summary_from_row(&row)?;
        resource.fields = decode_fields(&row, id)?;
        Ok(resource)
    }

    /// Insert a new resource, writing the assigned `id` and `created_at` back.
    pub async fn create(&self, resource: &mut Resource) -> Result<(), ResourceError> {
        if resource.is_persisted() {
            return Err(ResourceError::AlreadyExists(resource.id.clone()));
        }

        let row = self
            .bounded(
                "create",
                sqlx::query(&self.queries.create)
                    .bind(&resource.label)
                    .bind(resource.fields.as_ref().map(Json))
                    .fetch_one(&self.pool),
            )
            .await?;

        let id: Uuid = row.try_get("id")?;
        resource.id = id.to_string();
        resource.created_at = Some(row.try_get("created_at")?);
        resource.updated_at = None;
        Ok(())
    }

    /// Replace `label` and the whole `fields` payload. On success `resource`
    /// is overwritten with the stored row, so `created_at` always comes from
    /// the database and never from the caller.
    pub async fn update(&self, resource: &mut Resource) -> Result<(), ResourceError> {
        if !resource.is_persisted() {
            return Err(ResourceError::MissingIdentifier);
        }

        let row = match parse_id(&resource.id) {
            Some(key) => {
                self.bounded(
                    "update",
                    sqlx::query(&self.queries.update)
                        .bind(&resource.label)
                        .bind(resource.fields.as_ref().map(Json))
                        .bind(key)
                        .fetch_optional(&self.pool),
                )
                .await?
            }
            None => None,
        };

        match (row, self.options.update_missing) {
            (Some(row), _) => {
                let mut stored = summary_from_row(&row)?;
                stored.fields = decode_fields(&row, &stored.id)?;
                *resource = stored;
                Ok(())
            }
            (None, UpdateMissing::NotFound) => Err(ResourceError::NotFound(resource.id.clone())),
            (None, UpdateMissing::Ignore) => {
                tracing::debug!(id = %resource.id, "update matched no rows");
                Ok(())
            }
        }
    }

    /// Returns whether a row was removed. No route exposes this.
    pub async fn delete(&self, id: &str) -> Result<bool, ResourceError> {
        let Some(key) = parse_id(id) else {
            return Ok(false);
        };

        let done = self
            .bounded(
                "delete",
                sqlx::query(&self.queries.delete)
                    .bind(key)
                    .execute(&self.pool),
            )
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn bounded<T, F>(&self, operation: &'static str, query: F) -> Result<T, ResourceError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.options.timeout, query).await {
            Ok(result) => result.map_err(ResourceError::from),
            Err(_) => Err(self.timeout_error(operation)),
        }
    }

    fn timeout_error(&self, operation: &'static str) -> ResourceError {
        ResourceError::Timeout {
            operation,
            timeout_ms: self.options.timeout.as_millis() as u64,
        }
    }
}

/// Ids are uuids; any other string cannot name a stored row.
fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

fn summary_from_row(row: &PgRow) -> Result<Resource, sqlx::Error> {
    let id: Uuid = row.try_get("id")?;
    let label: Option<String> = row.try_get("label")?;
    Ok(Resource {
        id: id.to_string(),
        label: label.unwrap_or_default(),
        fields: None,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn decode_fields(row: &PgRow, id: &str) -> Result<Option<FieldSet>, ResourceError> {
    let decode_error = |reason: String| ResourceError::Decode {
        id: id.to_string(),
        reason,
    };

    let raw: Option<serde_json::Value> = row
        .try_get("fields")
        .map_err(|e| decode_error(e.to_string()))?;
    raw.map(serde_json::from_value::<FieldSet>)
        .transpose()
        .map_err(|e| decode_error(e.to_string()))
}
