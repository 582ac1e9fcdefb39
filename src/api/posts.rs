//! Post pages
//!
//! Listing, search, detail, and the create/edit/delete forms, plus the
//! "become an author" action.

use axum::{
    extract::{Form, OriginalUri, Path, Query, State},
    response::{Html, Response},
};
use serde::Deserialize;
use std::collections::HashMap;

use super::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use super::responses::{page_context, render, see_other};
use crate::models::{CreatePostInput, PostFilter, PostForm, UpdatePostInput, PAGE_SIZE};
use crate::services::policy::{self, Action};
use crate::services::PostPage;

/// Query parameters of the listing page
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Post ids in paths are plain digits; anything else is simply not a post
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    let not_found = || ApiError::not_found(format!("Post '{}' not found", raw));
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_found());
    }
    raw.parse().map_err(|_| not_found())
}

fn require(user: &AuthenticatedUser, action: Action, uri: &OriginalUri) -> Result<(), ApiError> {
    policy::check(Some(&user.0), action).map_err(|d| ApiError::denied(d, &uri.0))
}

fn insert_page(ctx: &mut tera::Context, page: &PostPage, page_url: &str) {
    ctx.insert("posts", &page.posts.items);
    ctx.insert("page", &page.posts.info());
    ctx.insert("limit_for_listing", &page.limit_for_listing);
    ctx.insert("page_url", page_url);
}

/// GET /
pub async fn list_posts(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, ApiError> {
    let page = state.post_service.list_page(query.page.as_deref()).await?;

    let mut ctx = page_context(user.user());
    insert_page(&mut ctx, &page, "/?page=");
    render(&state, "posts/list.html", &ctx)
}

/// GET /search
pub async fn search_posts(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Html<String>, ApiError> {
    let filter = PostFilter::from_query(&params);
    let page_param = params.get("page").map(String::as_str);
    let page = state.post_service.search(&filter, page_param).await?;

    let query_string = filter.query_string();
    let page_url = if query_string.is_empty() {
        "/search?page=".to_string()
    } else {
        format!("/search?{}&page=", query_string)
    };

    let mut ctx = page_context(user.user());
    insert_page(&mut ctx, &page, &page_url);
    ctx.insert("filter", &filter);
    ctx.insert("page_param", &page_param);
    ctx.insert("paginate", &PAGE_SIZE);
    ctx.insert("authors", &state.post_service.authors().await?);
    ctx.insert("categories", &state.post_service.categories().await?);
    render(&state, "posts/search.html", &ctx)
}

/// GET /{id}
pub async fn post_detail(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let post = state.post_service.get(parse_id(&id)?).await?;

    let mut ctx = page_context(user.user());
    ctx.insert("post", &post);
    render(&state, "posts/detail.html", &ctx)
}

/// GET /addpost
pub async fn add_post_form(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    uri: OriginalUri,
) -> Result<Html<String>, ApiError> {
    require(&user, Action::AddPost, &uri)?;

    let mut ctx = page_context(Some(&user.0));
    ctx.insert("posts", &state.post_service.all().await?);
    ctx.insert("authors", &state.post_service.authors().await?);
    ctx.insert("categories", &state.post_service.categories().await?);
    ctx.insert("new_post_id", &state.post_service.next_post_id_hint().await?);
    render(&state, "posts/add.html", &ctx)
}

/// POST /addpost
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    uri: OriginalUri,
    Form(form): Form<PostForm>,
) -> Result<Response, ApiError> {
    require(&user, Action::AddPost, &uri)?;

    let input = CreatePostInput::from_form(&form).map_err(ApiError::bad_request)?;
    let post = state.post_service.create(input).await?;

    Ok(see_other(&format!("/{}", post.id)))
}

/// GET /{id}/edit
pub async fn edit_post_form(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    uri: OriginalUri,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    require(&user, Action::ChangePost, &uri)?;
    let post = state.post_service.get(parse_id(&id)?).await?;

    let mut ctx = page_context(Some(&user.0));
    ctx.insert("post", &post);
    ctx.insert("authors", &state.post_service.authors().await?);
    ctx.insert("categories", &state.post_service.categories().await?);
    render(&state, "posts/edit.html", &ctx)
}

/// POST /{id}/edit
pub async fn update_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    uri: OriginalUri,
    Path(id): Path<String>,
    Form(form): Form<PostForm>,
) -> Result<Response, ApiError> {
    require(&user, Action::ChangePost, &uri)?;
    let id = parse_id(&id)?;

    let input = UpdatePostInput::from_form(&form).map_err(ApiError::bad_request)?;
    state.post_service.update(id, input).await?;

    Ok(see_other(&format!("/{}", id)))
}

/// GET /{id}/delet
pub async fn delete_post_form(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    uri: OriginalUri,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    require(&user, Action::DeletePost, &uri)?;
    let post = state.post_service.get(parse_id(&id)?).await?;

    let mut ctx = page_context(Some(&user.0));
    ctx.insert("post", &post);
    render(&state, "posts/delete.html", &ctx)
}

/// POST /{id}/delet
pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    uri: OriginalUri,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require(&user, Action::DeletePost, &uri)?;
    state.post_service.delete(parse_id(&id)?).await?;

    Ok(see_other("/"))
}

/// POST /upgrade/
pub async fn become_author(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    uri: OriginalUri,
) -> Result<Response, ApiError> {
    require(&user, Action::BecomeAuthor, &uri)?;
    state.user_service.become_author(user.0.id).await?;

    Ok(see_other("/"))
}
