//! HTTP layer - handlers and routing
//!
//! Server-rendered HTML pages:
//! - Post listing, search and detail
//! - Create, edit and delete forms
//! - Becoming an author
//! - Login, logout and signup

pub mod accounts;
pub mod middleware;
pub mod posts;
pub mod responses;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(posts::list_posts))
        .route("/search", get(posts::search_posts))
        .route("/addpost", get(posts::add_post_form).post(posts::create_post))
        .route("/upgrade/", post(posts::become_author))
        .route("/{id}", get(posts::post_detail))
        .route(
            "/{id}/edit",
            get(posts::edit_post_form).post(posts::update_post),
        )
        .route(
            "/{id}/delet",
            get(posts::delete_post_form).post(posts::delete_post),
        )
        .nest("/accounts", accounts::router())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        // Added last so it runs first and error pages see the user
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
