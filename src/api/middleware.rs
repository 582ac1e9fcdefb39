//! HTTP middleware and request plumbing
//!
//! Contains:
//! - Shared application state
//! - Session resolution (cookie or bearer token) on every request
//! - Extractors for the current user
//! - `ApiError`, the error type every handler returns

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use std::convert::Infallible;
use std::sync::Arc;

use super::responses::page_context;
use crate::models::User;
use crate::services::{Denied, PostService, PostServiceError, UserService, UserServiceError};
use crate::theme::{TemplateEngine, ThemeError};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub post_service: Arc<PostService>,
    pub user_service: Arc<UserService>,
    pub templates: Arc<TemplateEngine>,
    /// Add the `Secure` attribute to the session cookie
    pub secure_cookie: bool,
}

/// Authenticated user extracted from request.
///
/// As an extractor it rejects anonymous requests with a redirect to the
/// login page.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The current user, if any
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::login_required(&parts.uri))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|au| au.0.clone()),
        ))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error returned by handlers, rendered as an HTML page or a login redirect
#[derive(Debug)]
pub enum ApiError {
    /// Anonymous request to a page that needs a login; `next` is where to
    /// come back to
    LoginRequired { next: String },
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    pub fn login_required(uri: &axum::http::Uri) -> Self {
        let next = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        ApiError::LoginRequired { next }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    /// Turn a refused capability check into a response for `uri`
    pub fn denied(denied: Denied, uri: &axum::http::Uri) -> Self {
        match denied {
            Denied::Unauthenticated => ApiError::login_required(uri),
            Denied::Forbidden => {
                ApiError::forbidden("You do not have permission to perform this action")
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::LoginRequired { .. } => StatusCode::SEE_OTHER,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::LoginRequired { next } => write!(f, "Login required for {}", next),
            ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::BadRequest(m)
            | ApiError::Internal(m) => f.write_str(m),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(e: PostServiceError) -> Self {
        match e {
            PostServiceError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            PostServiceError::InvalidPage(e) => ApiError::not_found(e.to_string()),
            PostServiceError::ValidationError(m) => ApiError::bad_request(m),
            PostServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::AuthenticationError(m)
            | UserServiceError::ValidationError(m)
            | UserServiceError::UserExists(m) => ApiError::bad_request(m),
            UserServiceError::InternalError(e) => ApiError::internal_error(format!("{:#}", e)),
        }
    }
}

impl From<ThemeError> for ApiError {
    fn from(e: ThemeError) -> Self {
        ApiError::internal_error(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::LoginRequired { next } => {
                let target = format!("/accounts/login?next={}", urlencoding::encode(&next));
                return Redirect::to(&target).into_response();
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                "Something went wrong on our side.".to_string()
            }
            other => other.to_string(),
        };

        // Plain fallback body; render_error_pages swaps in the themed page
        let body = format!(
            "<h1>{} {}</h1>\n<p>{}</p>\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Error"),
            tera::escape_html(&message),
        );
        let mut response = (status, Html(body)).into_response();
        response
            .extensions_mut()
            .insert(ErrorPage { status, message });
        response
    }
}

/// Error details left on a response for [`render_error_pages`]
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub message: String,
}

// ============================================================================
// Authentication
// ============================================================================

/// Extract session token from the `Authorization: Bearer` header or the
/// session cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_str) = cookie_header.to_str() else {
            continue;
        };
        for cookie in cookie_str.split(';') {
            if let Some((name, value)) = cookie.trim().split_once('=') {
                if name == SESSION_COOKIE && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    None
}

/// Resolve the session on every request.
///
/// Stores an [`AuthenticatedUser`] in the request extensions when the token
/// belongs to a live session; anonymous requests pass through untouched.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Session validation failed"),
        }
    }
    next.run(request).await
}

/// Re-render handler errors with the `error.html` template
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|au| au.0.clone());
    let response = next.run(request).await;

    let Some(page) = response.extensions().get::<ErrorPage>().cloned() else {
        return response;
    };

    let mut ctx = page_context(user.as_ref());
    ctx.insert("status", &page.status.as_u16());
    ctx.insert("title", page.status.canonical_reason().unwrap_or("Error"));
    ctx.insert("message", &page.message);
    match state.templates.render("error.html", &ctx) {
        Ok(html) => (page.status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render error page");
            response
        }
    }
}
