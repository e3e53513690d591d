//! HTTP middleware

use axum::{
    extract::{Extension, Request},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use super::AppState;

/// The user a request acts for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

/// Resolve the caller and attach a [`UserId`] to the request.
///
/// With authorization configured the `Authorization` header must hold a
/// valid bearer token; anything else is rejected with 401.
pub async fn resolve_user(
    Extension(state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user_id = match &state.auth {
        None => state.default_user_id.clone(),
        Some(auth) => {
            let token = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .ok_or(StatusCode::UNAUTHORIZED)?;

            let principal = auth.authorize(token).await.map_err(|e| {
                warn!(error = %e, "Unauthorized request");
                StatusCode::UNAUTHORIZED
            })?;
            req.extensions_mut().insert(principal.clone());
            principal.user_id
        }
    };

    req.extensions_mut().insert(UserId(user_id));
    Ok(next.run(req).await)
}
