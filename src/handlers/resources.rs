use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::resource::Resource;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET {prefix}/ - page of resources without their fields
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Resource>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(state.api.default_limit)
        .clamp(0, state.api.max_limit);
    let offset = query.offset.unwrap_or(0).max(0);

    let items = state.store.list(limit, offset).await?;
    Ok(Json(items))
}

/// GET {prefix}/:id - single resource with fields
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Resource>, ApiError> {
    let resource = state.store.get(&id).await?;
    Ok(Json(resource))
}

/// POST {prefix}/ - create a resource, responding with its new id
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: Result<Json<Resource>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(mut resource) = body?;
    state.store.create(&mut resource).await?;

    tracing::info!(id = %resource.id, by = %user.id, "resource created");
    Ok(Json(json!({ "id": resource.id })))
}

/// PUT {prefix}/:id - replace label and fields of an existing resource
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    body: Result<Json<Resource>, JsonRejection>,
) -> Result<Json<Resource>, ApiError> {
    let Json(mut resource) = body?;
    resource.id = id;
    state.store.update(&mut resource).await?;

    tracing::info!(id = %resource.id, by = %user.id, "resource updated");
    Ok(Json(resource))
}
