//! Tests for the template engine

use super::*;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use tera::Context as TeraContext;

fn sample_post() -> serde_json::Value {
    json!({
        "id": 7,
        "title": "Budget <passed>",
        "content": "Parliament approved the budget late on Friday.",
        "post_type": "news",
        "author_id": 1,
        "author_name": "alice",
        "categories": [{"id": 1, "name": "politics"}],
        "created_at": "2026-03-14T09:30:00Z"
    })
}

fn page_info(number: u32, num_pages: u32, total: i64) -> serde_json::Value {
    json!({
        "number": number,
        "num_pages": num_pages,
        "total": total,
        "has_prev": number > 1,
        "has_next": number < num_pages,
        "previous_page_number": if number > 1 { Some(number - 1) } else { None },
        "next_page_number": if number < num_pages { Some(number + 1) } else { None },
    })
}

fn base_context() -> TeraContext {
    let mut ctx = TeraContext::new();
    ctx.insert("current_user", &Option::<serde_json::Value>::None);
    ctx.insert("is_not_author", &true);
    ctx
}

#[test]
fn test_builtin_templates_load() {
    let engine = TemplateEngine::builtin().unwrap();

    for (name, _) in BUILTIN_TEMPLATES {
        assert!(engine.has_template(name), "missing {}", name);
    }
}

#[test]
fn test_render_listing() {
    let engine = TemplateEngine::builtin().unwrap();

    let mut ctx = base_context();
    ctx.insert("posts", &vec![sample_post()]);
    ctx.insert("page", &page_info(1, 4, 18));
    ctx.insert("page_url", "/?page=");
    ctx.insert("limit_for_listing", &2);

    let html = engine.render("posts/list.html", &ctx).unwrap();
    assert!(html.contains("href=\"/7\""));
    assert!(html.contains("14.03.2026"));
    // Autoescaped
    assert!(html.contains("Budget &lt;passed&gt;"));
    assert!(html.contains("/?page=last"));
    assert!(html.contains("/accounts/login"));
}

#[test]
fn test_listing_hides_last_link_near_the_end() {
    let engine = TemplateEngine::builtin().unwrap();

    let mut ctx = base_context();
    ctx.insert("posts", &vec![sample_post()]);
    ctx.insert("page", &page_info(3, 4, 18));
    ctx.insert("page_url", "/?page=");
    ctx.insert("limit_for_listing", &2);

    let html = engine.render("posts/list.html", &ctx).unwrap();
    assert!(!html.contains("page=last"));
    assert!(html.contains("/?page=4"));
}

#[test]
fn test_render_detail_for_author() {
    let engine = TemplateEngine::builtin().unwrap();

    let mut ctx = TeraContext::new();
    ctx.insert("current_user", &json!({"id": 1, "username": "alice", "groups": ["authors"]}));
    ctx.insert("is_not_author", &false);
    ctx.insert("post", &sample_post());

    let html = engine.render("posts/detail.html", &ctx).unwrap();
    assert!(html.contains("alice"));
    assert!(html.contains("politics"));
    assert!(html.contains("/7/edit"));
    assert!(html.contains("/7/delet"));
    assert!(!html.contains("Become an author"));
}

#[test]
fn test_render_search_keeps_filter_values() {
    let engine = TemplateEngine::builtin().unwrap();

    let mut ctx = base_context();
    ctx.insert("posts", &Vec::<serde_json::Value>::new());
    ctx.insert("page", &page_info(1, 1, 0));
    ctx.insert("page_url", "/search?title=budget&page=");
    ctx.insert("limit_for_listing", &-1);
    ctx.insert("paginate", &5);
    ctx.insert(
        "filter",
        &json!({
            "values": {"title": "budget", "post_type": "news"},
            "errors": [{"field": "created_after", "message": "Enter a valid date"}]
        }),
    );
    ctx.insert("authors", &vec![json!({"id": 1, "user_id": 1, "username": "alice"})]);
    ctx.insert("categories", &vec![json!({"id": 1, "name": "politics"})]);

    let html = engine.render("posts/search.html", &ctx).unwrap();
    assert!(html.contains("value=\"budget\""));
    assert!(html.contains("<option value=\"news\" selected>"));
    assert!(html.contains("Enter a valid date"));
    assert!(html.contains("No posts yet."));
}

#[test]
fn test_override_directory_replaces_builtin() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("posts")).unwrap();
    fs::write(
        temp_dir.path().join("posts/detail.html"),
        "custom {{ post.title }}",
    )
    .unwrap();
    fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

    let engine = TemplateEngine::new(temp_dir.path()).unwrap();

    let mut ctx = TeraContext::new();
    ctx.insert("post", &sample_post());
    let html = engine.render("posts/detail.html", &ctx).unwrap();
    assert_eq!(html, "custom Budget &lt;passed&gt;");
    assert!(!engine.has_template("notes.txt"));
    // Other templates stay built-in
    assert!(engine.has_template("posts/list.html"));
}

#[test]
fn test_override_can_extend_builtin_base() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("about.html"),
        r#"{% extends "base.html" %}{% block content %}About us{% endblock content %}"#,
    )
    .unwrap();

    let engine = TemplateEngine::new(temp_dir.path()).unwrap();
    let html = engine.render("about.html", &base_context()).unwrap();
    assert!(html.contains("About us"));
    assert!(html.contains("<nav>"));
}

#[test]
fn test_missing_override_directory_is_fine() {
    let temp_dir = TempDir::new().unwrap();
    let engine = TemplateEngine::new(&temp_dir.path().join("nope")).unwrap();
    assert!(engine.has_template("base.html"));
}

#[test]
fn test_broken_override_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("base.html"), "{% block content %}").unwrap();

    let result = TemplateEngine::new(temp_dir.path());
    assert!(matches!(result, Err(ThemeError::TemplateError(_))));
}

#[test]
fn test_render_unknown_template() {
    let engine = TemplateEngine::builtin().unwrap();
    let result = engine.render("nope.html", &TeraContext::new());
    assert!(matches!(result, Err(ThemeError::NotFound(_))));
}
