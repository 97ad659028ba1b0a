use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::HeaderMap};

use crate::db::users;
use crate::error::AppError;
use crate::models::CurrentUser;
use crate::state::AppState;

/// Set by the authenticating front for every forwarded request
pub const USER_HEADER: &str = "x-user-id";

pub fn user_id_from_headers(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(USER_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = user_id_from_headers(&parts.headers).ok_or(AppError::Unauthenticated)?;
        users::find_current_user(&state.pool, user_id)
            .await?
            .ok_or(AppError::Unauthenticated)
    }
}
