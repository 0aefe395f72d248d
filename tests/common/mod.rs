#![allow(dead_code)]

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use axum::{body::Body, http::Request, response::Response, Router};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::ServiceExt;
use uuid::Uuid;

use resource_api::auth::Authorization;
use resource_api::config::{AppConfig, Environment};
use resource_api::database::DatabaseManager;
use resource_api::resource::{ResourceStore, StoreOptions, UpdateMissing};
use resource_api::{router, AppState};

pub const SECRET: &str = "integration-secret";
pub const IDENTITY: &str = "user@example.com";

/// Env var naming a disposable Postgres database for store tests.
pub const DB_TEST_URL: &str = "DB_TEST_URL";

pub fn config(table: &str) -> AppConfig {
    let mut config = AppConfig::for_environment(Environment::Development);
    config.security.secret = SECRET.to_string();
    config.security.auths = vec![Authorization {
        id: IDENTITY.to_string(),
        key_digest: "not-checked".to_string(),
        roles: BTreeSet::from(["editor".to_string()]),
    }];
    config.database.table = table.to_string();
    config
}

pub fn token_for(id: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 600;
    encode(
        &Header::new(Algorithm::HS256),
        &json!({ "id": id, "exp": exp }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("token encodes")
}

pub fn bearer(id: &str) -> String {
    format!("Bearer {}", token_for(id))
}

/// State whose pool points nowhere; fine for requests that never reach the store.
pub fn offline_state() -> AppState {
    let mut config = config("api.resources");
    config.database.url = "postgres://nobody@127.0.0.1:1/none".to_string();
    config.database.connection_timeout = 1;

    let pool = DatabaseManager::connect_lazy(&config.database).expect("lazy pool");
    AppState::new(&config, pool).expect("state")
}

pub fn offline_app() -> Router {
    router(offline_state())
}

pub async fn send(app: &Router, request: Request<Body>) -> Result<(Response, Value)> {
    let response = app.clone().oneshot(request).await?;
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    Ok((Response::from_parts(parts, Body::empty()), value))
}

/// A freshly created resource table in the test database.
pub struct TestDb {
    pub pool: PgPool,
    pub table: String,
}

impl TestDb {
    /// Fails when no test database is configured; callers are `#[ignore]`d
    /// and run with `cargo test -- --ignored`.
    pub async fn open() -> Result<Self> {
        let url = std::env::var(DB_TEST_URL)
            .with_context(|| format!("{} must point at a scratch database", DB_TEST_URL))?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .context("failed to connect to test database")?;

        let table = format!("resources_{}", Uuid::new_v4().simple());
        sqlx::query(&format!(
            "CREATE TABLE \"{}\" (
                id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                label text NOT NULL DEFAULT '',
                fields jsonb,
                created_at timestamptz NOT NULL,
                updated_at timestamptz
            )",
            table
        ))
        .execute(&pool)
        .await
        .context("failed to create test table")?;

        Ok(Self { pool, table })
    }

    pub fn store(&self, update_missing: UpdateMissing) -> ResourceStore {
        let options = StoreOptions {
            update_missing,
            ..StoreOptions::default()
        };
        ResourceStore::new(self.pool.clone(), &self.table, options).expect("valid table")
    }

    pub fn app(&self) -> Router {
        let state = AppState::new(&config(&self.table), self.pool.clone()).expect("state");
        router(state)
    }

    pub async fn cleanup(self) -> Result<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", self.table))
            .execute(&self.pool)
            .await?;
        self.pool.close().await;
        Ok(())
    }
}
