//! Client-visible credentials
//!
//! The session token travels in an `HttpOnly` cookie that page script cannot
//! read. The CSRF token travels in a script-readable cookie and must be echoed
//! back in the `X-CSRF-Token` header on every protected request.

use axum::http::{HeaderMap, HeaderValue, header::SET_COOKIE};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Duration, Utc};

pub const SESSION_COOKIE_NAME: &str = "session_token";
pub const CSRF_COOKIE_NAME: &str = "csrf_token";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// Cookie attributes shared by both credentials
#[derive(Debug, Clone, Copy, Default)]
pub struct CookiePolicy {
    pub secure: bool,
}

impl CookiePolicy {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// `Set-Cookie` headers carrying a freshly issued session/CSRF pair
    pub fn issue(
        &self,
        session_token: &str,
        csrf_token: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            self.cookie(SESSION_COOKIE_NAME, session_token, expires_at, true)?,
        );
        headers.append(
            SET_COOKIE,
            self.cookie(CSRF_COOKIE_NAME, csrf_token, expires_at, false)?,
        );
        Ok(headers)
    }

    /// `Set-Cookie` headers that make the client drop both credentials
    pub fn clear(&self) -> anyhow::Result<HeaderMap> {
        let expired = Utc::now() - Duration::hours(1);
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, self.cookie(SESSION_COOKIE_NAME, "", expired, true)?);
        headers.append(SET_COOKIE, self.cookie(CSRF_COOKIE_NAME, "", expired, false)?);
        Ok(headers)
    }

    fn cookie(
        &self,
        name: &str,
        value: &str,
        expires_at: DateTime<Utc>,
        http_only: bool,
    ) -> anyhow::Result<HeaderValue> {
        let max_age = (expires_at - Utc::now()).num_seconds().max(0);
        let expires = expires_at.format("%a, %d %b %Y %H:%M:%S GMT");

        let mut cookie =
            format!("{name}={value}; Path=/; Expires={expires}; Max-Age={max_age}; SameSite=Lax");
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        Ok(HeaderValue::from_str(&cookie)?)
    }
}

/// Session credential from the request cookies, if present and non-empty
pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE_NAME)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// CSRF credential from the request header, if present and non-empty
pub fn csrf_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER_NAME)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
