//! services/api/src/web/middleware.rs
//!
//! Caller identification for protected routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Header carrying the account id issued by the upstream identity provider.
pub const ACCOUNT_HEADER: &str = "x-account-id";

/// The authenticated account making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

/// Middleware that reads the caller's account id and registers the account on
/// first sight.
///
/// If valid, inserts a `Caller` into request extensions for handlers to use.
/// If missing or blank, returns 401 Unauthorized.
pub async fn require_account(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let account_id = req
        .headers()
        .get(ACCOUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized(format!("{} header is required", ACCOUNT_HEADER)))?
        .to_string();

    state.accounts.ensure_account(&account_id).await?;

    req.extensions_mut().insert(Caller(account_id));
    Ok(next.run(req).await)
}
