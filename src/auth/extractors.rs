use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{cookies, jwt::JwtKeys};
use crate::{error::ApiError, state::AppState, users::repo_types::User};

/// The authenticated session: the user owning the presented access token.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Cookie first, then "Authorization: Bearer <token>"
        let token = cookies::read_cookie(&parts.headers, cookies::ACCESS_COOKIE)
            .or_else(|| {
                parts
                    .headers
                    .get(axum::http::header::AUTHORIZATION)
                    .and_then(|h| h.to_str().ok())
                    .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
                    .map(|t| t.trim().to_string())
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::auth("Unauthorized request"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(&token).map_err(|e| {
            warn!(error = %e, "invalid or expired access token");
            ApiError::auth("Invalid access token")
        })?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "access token for unknown user");
                ApiError::auth("Invalid access token")
            })?;

        Ok(CurrentUser(user))
    }
}
