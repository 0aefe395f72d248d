use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;

pub use crate::auth::AuthUser;

/// Bearer token gate for the resource routes.
///
/// On success the verified [`AuthUser`] is added to the request extensions;
/// downstream handlers read identity from there and nowhere else.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match state.authorizer.authorize(request.headers()) {
        Ok(user) => {
            tracing::debug!(id = %user.id, "request authorized");
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(err) => {
            tracing::warn!(
                kind = err.kind(),
                method = %request.method(),
                path = %request.uri().path(),
                "request rejected: {}",
                err
            );
            Err(err.into())
        }
    }
}
