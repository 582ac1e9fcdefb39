//! Account pages: login, logout and signup

use axum::{
    extract::{Form, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use super::middleware::{extract_session_token, ApiError, AppState, MaybeUser};
use super::responses::{
    clear_session_cookie, page_context, redirect_with_cookie, render, safe_next, session_cookie,
};
use crate::models::{CreateUserInput, Session};
use crate::services::UserServiceError;

/// Account routes, nested under `/accounts`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_form).post(login))
        .route("/logout", post(logout))
        .route("/signup", get(signup_form).post(signup))
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

fn login_cookie(state: &AppState, session: &Session) -> String {
    let max_age = state.user_service.session_ttl().num_seconds();
    session_cookie(&session.id, max_age, state.secure_cookie)
}

fn login_page(
    state: &AppState,
    user: &MaybeUser,
    status: StatusCode,
    next: &str,
    username: &str,
    error: Option<&str>,
) -> Result<Response, ApiError> {
    let mut ctx = page_context(user.user());
    ctx.insert("next", next);
    ctx.insert("username", username);
    ctx.insert("error", &error);
    Ok((status, render(state, "accounts/login.html", &ctx)?).into_response())
}

fn signup_page(
    state: &AppState,
    user: &MaybeUser,
    status: StatusCode,
    username: &str,
    email: &str,
    error: Option<&str>,
) -> Result<Response, ApiError> {
    let mut ctx = page_context(user.user());
    ctx.insert("username", username);
    ctx.insert("email", email);
    ctx.insert("error", &error);
    Ok((status, render(state, "accounts/signup.html", &ctx)?).into_response())
}

/// GET /accounts/login
pub async fn login_form(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(query): Query<NextQuery>,
) -> Result<Response, ApiError> {
    let next = safe_next(query.next.as_deref());
    login_page(&state, &user, StatusCode::OK, next, "", None)
}

/// POST /accounts/login
pub async fn login(
    State(state): State<AppState>,
    user: MaybeUser,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let next = safe_next(form.next.as_deref());

    match state.user_service.login(&form.username, &form.password).await {
        Ok(session) => redirect_with_cookie(next, &login_cookie(&state, &session)),
        Err(UserServiceError::AuthenticationError(message)) => login_page(
            &state,
            &user,
            StatusCode::OK,
            next,
            &form.username,
            Some(&message),
        ),
        Err(e) => Err(e.into()),
    }
}

/// POST /accounts/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    redirect_with_cookie("/", &clear_session_cookie(state.secure_cookie))
}

/// GET /accounts/signup
pub async fn signup_form(
    State(state): State<AppState>,
    user: MaybeUser,
) -> Result<Response, ApiError> {
    signup_page(&state, &user, StatusCode::OK, "", "", None)
}

/// POST /accounts/signup
///
/// Creates the account and logs it in.
pub async fn signup(
    State(state): State<AppState>,
    user: MaybeUser,
    Form(form): Form<CreateUserInput>,
) -> Result<Response, ApiError> {
    let username = form.username.clone();
    let email = form.email.clone();
    let password = form.password.clone();

    match state.user_service.register(form).await {
        Ok(created) => {
            let session = state.user_service.login(&created.username, &password).await?;
            redirect_with_cookie("/", &login_cookie(&state, &session))
        }
        Err(UserServiceError::ValidationError(message))
        | Err(UserServiceError::UserExists(message)) => signup_page(
            &state,
            &user,
            StatusCode::BAD_REQUEST,
            &username,
            &email,
            Some(&message),
        ),
        Err(e) => Err(e.into()),
    }
}
