use std::time::Duration;

use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};

use super::{claims::TokenKind, jwt::JwtKeys};
use crate::error::ApiError;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn cookie(name: &str, value: &str, max_age: Duration, secure: bool) -> String {
    let mut c = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        name,
        value,
        max_age.as_secs()
    );
    if secure {
        c.push_str("; Secure");
    }
    c
}

fn header_value(s: String) -> Result<HeaderValue, ApiError> {
    HeaderValue::try_from(s).map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("cookie header")))
}

/// `Set-Cookie` headers carrying a freshly issued token pair.
pub fn session_cookies(
    keys: &JwtKeys,
    access_token: &str,
    refresh_token: &str,
    secure: bool,
) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        header_value(cookie(ACCESS_COOKIE, access_token, keys.ttl(TokenKind::Access), secure))?,
    );
    headers.append(
        SET_COOKIE,
        header_value(cookie(REFRESH_COOKIE, refresh_token, keys.ttl(TokenKind::Refresh), secure))?,
    );
    Ok(headers)
}

/// `Set-Cookie` headers that expire both session cookies.
pub fn cleared_cookies(secure: bool) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        headers.append(SET_COOKIE, header_value(cookie(name, "", Duration::ZERO, secure))?);
    }
    Ok(headers)
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
