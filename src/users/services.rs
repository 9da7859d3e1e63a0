use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, warn};

use super::{dto::TokenPair, repo_types::User};
use crate::{
    auth::jwt::JwtKeys,
    error::ApiError,
    state::AppState,
    storage::{MediaKind, UploadFile},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Fails with a validation error listing every field that is missing or blank.
pub(crate) fn require_fields(fields: &[(&str, Option<&str>)]) -> Result<(), ApiError> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|(_, v)| v.map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| format!("{} is required", name))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation {
            message: "All fields are required".into(),
            errors: missing,
        })
    }
}

pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn sign_pair(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        ApiError::Internal(e)
    })?;
    let refresh_token = keys.sign_refresh(user.id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        ApiError::Internal(e)
    })?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Signs a new access/refresh pair and stores the refresh token as the user's only valid one.
pub async fn issue_tokens(state: &AppState, user: &User) -> Result<TokenPair, ApiError> {
    let pair = sign_pair(state, user)?;

    let stored = state
        .users
        .set_refresh_token(user.id, Some(&pair.refresh_token))
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "persist refresh token failed");
            ApiError::internal("Something went wrong while generating tokens")
        })?;
    if !stored {
        error!(user_id = %user.id, "user vanished while issuing tokens");
        return Err(ApiError::internal(
            "Something went wrong while generating tokens",
        ));
    }

    Ok(pair)
}

/// Exchanges `presented` for a new pair. The swap only happens while `presented`
/// is still the stored token, so a refresh token is accepted at most once.
pub async fn rotate_tokens(
    state: &AppState,
    user: &User,
    presented: &str,
) -> Result<TokenPair, ApiError> {
    let pair = sign_pair(state, user)?;

    let rotated = state
        .users
        .rotate_refresh_token(user.id, presented, &pair.refresh_token)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user.id, "persist refresh token failed");
            ApiError::internal("Something went wrong while generating tokens")
        })?;
    if !rotated {
        warn!(user_id = %user.id, "refresh token already rotated");
        return Err(ApiError::auth("Refresh token is expired or used"));
    }

    Ok(pair)
}

/// Uploads a file and returns its URL; any failure is reported as an upload error.
pub async fn upload_media(
    state: &AppState,
    kind: MediaKind,
    file: UploadFile,
    failure: &str,
) -> Result<String, ApiError> {
    match state.uploader.upload(kind, file).await {
        Ok(url) if !url.trim().is_empty() => Ok(url),
        Ok(_) => {
            warn!(?kind, "uploader returned an empty url");
            Err(ApiError::Upload(failure.to_string()))
        }
        Err(e) => {
            warn!(error = %e, ?kind, "media upload failed");
            Err(ApiError::Upload(failure.to_string()))
        }
    }
}

/// Removes replaced media. Failures are only logged.
pub async fn discard_media(state: &AppState, old_url: &str, new_url: &str) {
    if old_url.is_empty() || old_url == new_url {
        return;
    }
    if let Err(e) = state.uploader.remove(old_url).await {
        warn!(error = %e, url = %old_url, "failed to remove replaced media");
    }
}

/// Removes media uploaded for a request that then failed. Failures are only logged.
pub async fn rollback_media(state: &AppState, urls: &[&str]) {
    for url in urls.iter().filter(|u| !u.is_empty()) {
        if let Err(e) = state.uploader.remove(url).await {
            warn!(error = %e, %url, "failed to remove orphaned media");
        }
    }
}
