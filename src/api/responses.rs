//! Shared response helpers
//!
//! Page rendering with the common template variables, redirects after form
//! posts, and the session cookie.

use axum::{
    http::{header, HeaderValue},
    response::{Html, IntoResponse, Redirect, Response},
};
use tera::Context as TeraContext;

use super::middleware::{ApiError, AppState, SESSION_COOKIE};
use crate::models::User;
use crate::services::policy;

/// Start a template context with the variables `base.html` expects
pub fn page_context(user: Option<&User>) -> TeraContext {
    let mut ctx = TeraContext::new();
    ctx.insert("current_user", &user);
    ctx.insert("is_not_author", &policy::is_not_author(user));
    ctx
}

/// Render a page
pub fn render(state: &AppState, template: &str, ctx: &TeraContext) -> Result<Html<String>, ApiError> {
    Ok(Html(state.templates.render(template, ctx)?))
}

/// 303 redirect to `to`
pub fn see_other(to: &str) -> Response {
    Redirect::to(to).into_response()
}

/// Only allow redirects back into this site
///
/// Browsers treat `/\` like `//`, so both are refused, as is any control
/// character.
pub fn safe_next(next: Option<&str>) -> &str {
    match next.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !matches!(path.as_bytes().get(1), Some(b'/' | b'\\'))
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => "/",
    }
}

/// `Set-Cookie` value carrying a session token
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Redirect to `to` while setting a cookie
pub fn redirect_with_cookie(to: &str, cookie: &str) -> Result<Response, ApiError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|e| ApiError::internal_error(format!("Invalid cookie header: {}", e)))?;
    let mut response = see_other(to);
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/5/edit")), "/5/edit");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(Some("/\tevil")), "/");
        assert_eq!(safe_next(Some("/a\\b")), "/a\\b");
        assert_eq!(safe_next(Some("")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn test_session_cookie() {
        assert_eq!(
            session_cookie("tok", 60, false),
            "session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=60"
        );
        assert!(session_cookie("tok", 60, true).ends_with("; Secure"));
        assert!(clear_session_cookie(false).starts_with("session=; "));
    }

    #[test]
    fn test_redirect_with_cookie() {
        let response = redirect_with_cookie("/", "session=tok; Path=/").unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
        assert_eq!(
            response.headers().get(header::SET_COOKIE).unwrap(),
            "session=tok; Path=/"
        );
    }

    #[test]
    fn test_page_context_for_anonymous() {
        let ctx = page_context(None);
        let json = ctx.into_json();
        assert_eq!(json["is_not_author"], true);
        assert!(json["current_user"].is_null());
    }
}
