use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, FromRef,
        Multipart, State,
    },
    http::HeaderMap,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{
        ChangePasswordRequest, LoginRequest, LoginResponse, PublicUser, RefreshRequest, TokenPair,
        UpdateAccountRequest,
    },
    forms::MultipartForm,
    repo_types::{MediaField, NewUser},
    services::{
        discard_media, is_valid_email, issue_tokens, normalize, require_fields, rollback_media,
        rotate_tokens, upload_media,
    },
};
use crate::{
    auth::{cookies, extractors::CurrentUser, jwt::JwtKeys, password},
    error::ApiError,
    response::ApiResponse,
    state::AppState,
    storage::MediaKind,
};

const MEDIA_BODY_LIMIT: usize = 20 * 1024 * 1024; // 20MB

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/refresh-token", post(refresh_access_token))
        .route("/users/change-password", post(change_password))
        .route("/users/current-user", get(current_user))
        .route("/users/update-account", patch(update_account_details))
}

pub fn media_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/avatar", patch(update_avatar))
        .route("/users/cover-image", patch(update_cover_image))
        .layer(DefaultBodyLimit::max(MEDIA_BODY_LIMIT))
}

/// POST /users/register (multipart)
/// Fields: fullName, email, username, password; files: avatar (required), coverImage
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<PublicUser>, ApiError> {
    let mut form = MultipartForm::read(mp?).await?;

    require_fields(&[
        ("fullName", form.text("fullName")),
        ("email", form.text("email")),
        ("username", form.text("username")),
        ("password", form.text("password")),
    ])?;
    let full_name = form.text("fullName").unwrap_or_default().to_string();
    let email = normalize(form.text("email").unwrap_or_default());
    let username = normalize(form.text("username").unwrap_or_default());
    // passwords are taken verbatim; only the blank check trims
    let password_plain = form.raw("password").unwrap_or_default().to_string();

    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }

    let avatar = form
        .take_file("avatar")
        .ok_or_else(|| ApiError::validation("Avatar file is required"))?;
    let cover = form.take_file("coverImage");

    if state
        .users
        .find_by_username_or_email(Some(&username), Some(&email))
        .await?
        .is_some()
    {
        warn!(%username, %email, "username or email already registered");
        return Err(ApiError::Conflict(
            "User with email or username already exists".into(),
        ));
    }

    let password_hash = password::hash_password(&password_plain)?;

    let avatar_url =
        upload_media(&state, MediaKind::Avatar, avatar, "Error while uploading avatar").await?;
    let cover_url = match cover {
        Some(file) => {
            match upload_media(&state, MediaKind::CoverImage, file, "Error while uploading cover image")
                .await
            {
                Ok(url) => url,
                Err(e) => {
                    rollback_media(&state, &[avatar_url.as_str()]).await;
                    return Err(e);
                }
            }
        }
        None => String::new(),
    };

    let created = match state
        .users
        .create(NewUser {
            username,
            email,
            full_name,
            avatar: avatar_url.clone(),
            cover_image: cover_url.clone(),
            password_hash,
        })
        .await
    {
        Ok(created) => created,
        Err(e) => {
            warn!(error = %e, "create user failed after upload");
            rollback_media(&state, &[avatar_url.as_str(), cover_url.as_str()]).await;
            return Err(e.into());
        }
    };

    let user = state
        .users
        .find_by_id(created.id)
        .await?
        .ok_or_else(|| ApiError::internal("Something went wrong while registering the user"))?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(ApiResponse::created(
        PublicUser::from(user),
        "User registered successfully",
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(HeaderMap, ApiResponse<LoginResponse>), ApiError> {
    let Json(payload) = payload?;

    let username = payload
        .username
        .as_deref()
        .map(normalize)
        .filter(|v| !v.is_empty());
    let email = payload
        .email
        .as_deref()
        .map(normalize)
        .filter(|v| !v.is_empty());
    if username.is_none() && email.is_none() {
        return Err(ApiError::validation("Username or email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let user = state
        .users
        .find_by_username_or_email(username.as_deref(), email.as_deref())
        .await?
        .ok_or_else(|| {
            warn!(?username, ?email, "login unknown user");
            ApiError::NotFound("User does not exist".into())
        })?;

    if !password::verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::auth("Invalid user credentials"));
    }

    let tokens = issue_tokens(&state, &user).await?;
    let keys = JwtKeys::from_ref(&state);
    let headers = cookies::session_cookies(
        &keys,
        &tokens.access_token,
        &tokens.refresh_token,
        state.config.cookie_secure,
    )?;

    info!(user_id = %user.id, "user logged in");
    Ok((
        headers,
        ApiResponse::ok(
            LoginResponse {
                user: PublicUser::from(user),
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<(HeaderMap, ApiResponse<serde_json::Value>), ApiError> {
    if !state.users.set_refresh_token(user.id, None).await? {
        return Err(ApiError::NotFound("User does not exist".into()));
    }
    let headers = cookies::cleared_cookies(state.config.cookie_secure)?;

    info!("user logged out");
    Ok((
        headers,
        ApiResponse::ok(serde_json::json!({}), "User logged out"),
    ))
}

#[instrument(skip_all)]
pub async fn refresh_access_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> Result<(HeaderMap, ApiResponse<TokenPair>), ApiError> {
    let incoming = cookies::read_cookie(&headers, cookies::REFRESH_COOKIE)
        .or_else(|| payload.and_then(|Json(body)| body.refresh_token))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::auth("Unauthorized request"))?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&incoming).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        ApiError::auth("Invalid refresh token")
    })?;

    let user = state
        .users
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::auth("Invalid refresh token"))?;

    if user.refresh_token.as_deref() != Some(incoming.as_str()) {
        warn!(user_id = %user.id, "stale or replayed refresh token");
        return Err(ApiError::auth("Refresh token is expired or used"));
    }

    let tokens = rotate_tokens(&state, &user, &incoming).await?;
    let set_cookies = cookies::session_cookies(
        &keys,
        &tokens.access_token,
        &tokens.refresh_token,
        state.config.cookie_secure,
    )?;

    info!(user_id = %user.id, "access token refreshed");
    Ok((set_cookies, ApiResponse::ok(tokens, "Access token refreshed")))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<ApiResponse<serde_json::Value>, ApiError> {
    let Json(payload) = payload?;
    require_fields(&[
        ("oldPassword", Some(payload.old_password.as_str())),
        ("newPassword", Some(payload.new_password.as_str())),
    ])?;

    if !password::verify_password(&payload.old_password, &user.password_hash)? {
        warn!("change password with wrong old password");
        return Err(ApiError::auth("Invalid old password"));
    }

    let hash = password::hash_password(&payload.new_password)?;
    if !state.users.set_password(user.id, &hash).await? {
        return Err(ApiError::NotFound("User does not exist".into()));
    }

    info!("password changed");
    Ok(ApiResponse::ok(
        serde_json::json!({}),
        "Password changed successfully",
    ))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn current_user(CurrentUser(user): CurrentUser) -> ApiResponse<PublicUser> {
    ApiResponse::ok(PublicUser::from(user), "User fetched successfully")
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_account_details(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicUser>, ApiError> {
    let Json(payload) = payload?;
    require_fields(&[
        ("fullName", Some(payload.full_name.as_str())),
        ("email", Some(payload.email.as_str())),
    ])?;
    let full_name = payload.full_name.trim();
    let email = normalize(&payload.email);
    if !is_valid_email(&email) {
        return Err(ApiError::validation("Invalid email"));
    }

    if let Some(other) = state
        .users
        .find_by_username_or_email(None, Some(&email))
        .await?
    {
        if other.id != user.id {
            warn!(%email, "email already in use");
            return Err(ApiError::Conflict("Email is already in use".into()));
        }
    }

    let updated = state
        .users
        .update_details(user.id, full_name, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User does not exist".into()))?;

    info!("account details updated");
    Ok(ApiResponse::ok(
        PublicUser::from(updated),
        "Account details updated successfully",
    ))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<PublicUser>, ApiError> {
    let updated = replace_media(&state, &user, MediaField::Avatar, mp?).await?;
    Ok(ApiResponse::ok(updated, "Avatar image updated successfully"))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_cover_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<PublicUser>, ApiError> {
    let updated = replace_media(&state, &user, MediaField::CoverImage, mp?).await?;
    Ok(ApiResponse::ok(updated, "Cover image updated successfully"))
}

pub(crate) async fn replace_media(
    state: &AppState,
    user: &crate::users::repo_types::User,
    field: MediaField,
    mp: Multipart,
) -> Result<PublicUser, ApiError> {
    let (form_field, kind, label, old_url) = match field {
        MediaField::Avatar => ("avatar", MediaKind::Avatar, "avatar", &user.avatar),
        MediaField::CoverImage => (
            "coverImage",
            MediaKind::CoverImage,
            "cover image",
            &user.cover_image,
        ),
    };

    let mut form = MultipartForm::read(mp).await?;
    let file = form
        .take_file(form_field)
        .ok_or_else(|| ApiError::validation(format!("{} file is missing", form_field)))?;

    let url = upload_media(state, kind, file, &format!("Error while uploading {}", label)).await?;

    let updated = match state.users.set_media(user.id, field, &url).await {
        Ok(Some(updated)) => updated,
        Ok(None) => {
            rollback_media(state, &[url.as_str()]).await;
            return Err(ApiError::NotFound("User does not exist".into()));
        }
        Err(e) => {
            rollback_media(state, &[url.as_str()]).await;
            return Err(e.into());
        }
    };

    discard_media(state, old_url, &url).await;

    info!(?field, "media replaced");
    Ok(PublicUser::from(updated))
}
