//! Integration tests for the Widget REST Web API.
//!
//! These tests require the `web` feature to be enabled:
//! ```bash
//! cargo test --features web web_api
//! ```

#![cfg(feature = "web")]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use widget_rest::config::Config;
use widget_rest::web::{create_router, AppState};

mod fixtures;
use fixtures::{read_options, temp_config};

/// Creates a test AppState over a temporary site file and option store.
fn create_test_state() -> (AppState, TempDir) {
    let (config, temp_dir) = temp_config();
    let state = AppState::new(config).expect("Failed to create app state");
    (state, temp_dir)
}

/// Creates a test AppState with entries in the `[permissions]` table.
fn create_test_state_with_permissions(entries: &[(&str, toml::Value)]) -> (AppState, TempDir) {
    let (mut config, temp_dir) = temp_config();
    for (name, verdict) in entries {
        config
            .permissions
            .insert((*name).to_string(), verdict.clone());
    }
    let state = AppState::new(config).expect("Failed to create app state");
    (state, temp_dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

/// Helper to make a GET request and parse the JSON response.
async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

/// Helper to make a request with a JSON body.
async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    send(app, request).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send_json(app, "POST", uri, body).await
}

async fn put_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send_json(app, "PUT", uri, body).await
}

async fn delete_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Creates a widget and returns its id.
async fn create_widget(app: &Router, base: &str, sidebar: &str, position: i64) -> String {
    let (status, body) = post_json(
        app,
        "/api/widgets",
        json!({ "widget_base": base, "sidebar_id": sidebar, "sidebar_position": position }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body["id"].as_str().unwrap().to_string()
}

fn active_widgets(sidebar: &Value) -> Vec<&str> {
    sidebar["active_widgets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id.as_str().unwrap())
        .collect()
}

// ============================================================================
// Health and Schemas
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    let (status, body) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_schema_endpoints() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    let (status, sidebar) = get_json(&app, "/api/sidebars/schema").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sidebar["title"], "sidebar");
    assert!(sidebar["properties"]["active_widgets"].is_object());

    let (status, widget) = get_json(&app, "/api/widgets/schema").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(widget["title"], "widget");
    assert!(widget["properties"]["widget_output"].is_object());
}

#[tokio::test]
async fn test_schema_endpoints_ignore_permissions() {
    let (state, _temp_dir) =
        create_test_state_with_permissions(&[("get_sidebars", toml::Value::Boolean(false))]);
    let app = create_router(state);

    let (status, _) = get_json(&app, "/api/sidebars/schema").await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Sidebars
// ============================================================================

#[tokio::test]
async fn test_list_sidebars_empty_store() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    let (status, body) = get_json(&app, "/api/sidebars").await;

    assert_eq!(status, StatusCode::OK);
    let sidebars = body.as_array().unwrap();
    assert_eq!(sidebars.len(), 2);
    assert_eq!(sidebars[0]["id"], "sidebar-1");
    assert_eq!(sidebars[0]["name"], "Main Sidebar");
    assert_eq!(sidebars[0]["description"], "Beside the content");
    assert_eq!(sidebars[1]["id"], "footer");
    assert_eq!(sidebars[1]["before_widget"], "");
    for sidebar in sidebars {
        assert_eq!(sidebar["active_widgets"], json!([]));
    }
}

#[tokio::test]
async fn test_get_sidebar() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);
    let id = create_widget(&app, "search", "sidebar-1", 1).await;

    let (status, body) = get_json(&app, "/api/sidebars/sidebar-1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "sidebar-1");
    assert_eq!(active_widgets(&body), vec![id.as_str()]);
}

#[tokio::test]
async fn test_get_unknown_sidebar() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    let (status, body) = get_json(&app, "/api/sidebars/nonexistent").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_reference");
    assert_eq!(body["status"], 400);
}

// ============================================================================
// Widgets: reads
// ============================================================================

#[tokio::test]
async fn test_list_widgets_includes_templates() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    let (status, body) = get_json(&app, "/api/widgets").await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|widget| widget["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["text-1", "search-1", "recent-posts-1"]);

    let template = &body[0];
    assert_eq!(template["has_output"], false);
    assert_eq!(template["instance"], Value::Null);
    assert_eq!(template["in_sidebar"], Value::Null);
    assert_eq!(template["position"], Value::Null);
    assert_eq!(template["widget_output"], "");
}

#[tokio::test]
async fn test_get_widget_invalid_ids() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    for uri in [
        "/api/widgets/text-7",
        "/api/widgets/unknown-2",
        "/api/widgets/no_number",
    ] {
        let (status, body) = get_json(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["code"], "invalid_reference", "{uri}");
    }
}

#[tokio::test]
async fn test_list_widget_types() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    let (status, body) = get_json(&app, "/api/widget-types").await;

    assert_eq!(status, StatusCode::OK);
    let types = body.as_array().unwrap();
    assert_eq!(types.len(), 3);
    assert_eq!(types[0]["id_base"], "text");
    assert_eq!(types[0]["classname"], "widget_text");
    assert_eq!(
        types[0]["fields"],
        json!([
            { "name": "title", "kind": "text" },
            { "name": "text", "kind": "textarea" }
        ])
    );
    assert_eq!(
        types[2]["fields"],
        json!([
            { "name": "title", "kind": "text" },
            { "name": "number", "kind": "number" },
            { "name": "show_date", "kind": "checkbox" }
        ])
    );
}

// ============================================================================
// Widgets: create
// ============================================================================

#[tokio::test]
async fn test_create_widget() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    let (status, body) = post_json(
        &app,
        "/api/widgets",
        json!({ "widget_base": "text", "sidebar_id": "sidebar-1" }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], "text-2");
    assert_eq!(body["id_base"], "text");
    assert_eq!(body["instance_number"], 2);
    assert_eq!(body["in_sidebar"], "sidebar-1");
    assert_eq!(body["position"], 1);
    assert_eq!(body["has_output"], true);
    assert_eq!(body["instance"], json!({ "title": "", "text": "" }));
    assert_eq!(
        body["sidebar_params"]["before_widget"],
        r#"<li id="text-2" class="widget widget_text">"#
    );
    assert_eq!(
        body["widget_output"],
        "<li id=\"text-2\" class=\"widget widget_text\"><p></p></li>\n"
    );

    // The template item is gone once a real instance exists
    let (status, _) = get_json(&app, "/api/widgets/text-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_widget_position_is_clamped() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    let first = create_widget(&app, "search", "sidebar-1", 1).await;
    let second = create_widget(&app, "search", "sidebar-1", 99).await;
    let third = create_widget(&app, "search", "sidebar-1", -4).await;

    let (_, sidebar) = get_json(&app, "/api/sidebars/sidebar-1").await;
    assert_eq!(
        active_widgets(&sidebar),
        vec![third.as_str(), first.as_str(), second.as_str()]
    );
}

#[tokio::test]
async fn test_create_widget_invalid_references() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    let (status, body) = post_json(
        &app,
        "/api/widgets",
        json!({ "widget_base": "calendar", "sidebar_id": "sidebar-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_reference");

    let (status, body) = post_json(
        &app,
        "/api/widgets",
        json!({ "widget_base": "text", "sidebar_id": "sidebar-9" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_reference");

    // Nothing was written
    let (_, widgets) = get_json(&app, "/api/widgets").await;
    assert_eq!(widgets[0]["id"], "text-1");
    assert_eq!(widgets[0]["has_output"], false);
}

#[tokio::test]
async fn test_create_widget_malformed_body() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/widgets")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_request");

    let (status, body) = post_json(&app, "/api/widgets", json!({ "widget_base": "text" })).await;
    assert!(status.is_client_error());
    assert_eq!(body["code"], "invalid_request");
}

// ============================================================================
// Widgets: update
// ============================================================================

#[tokio::test]
async fn test_update_widget_settings() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);
    let id = create_widget(&app, "text", "sidebar-1", 1).await;

    let (status, body) = put_json(
        &app,
        &format!("/api/widgets/{id}"),
        json!({ "settings": { "title": "Hello", "text": "World", "color": "red" } }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instance"], json!({ "title": "Hello", "text": "World" }));
    assert_eq!(body["in_sidebar"], "sidebar-1");
    assert_eq!(
        body["widget_output"],
        "<li id=\"text-2\" class=\"widget widget_text\">\
         <h2 class=\"widgettitle\">Hello</h2>\n<p>World</p></li>\n"
    );
}

#[tokio::test]
async fn test_update_widget_moves_between_sidebars() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);
    let moved = create_widget(&app, "text", "sidebar-1", 1).await;
    let resident = create_widget(&app, "search", "footer", 1).await;

    let (status, body) = put_json(
        &app,
        &format!("/api/widgets/{moved}"),
        json!({ "sidebar_id": "footer", "sidebar_position": 2 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["in_sidebar"], "footer");
    assert_eq!(body["position"], 2);
    // Footer has no before_widget markup, so the default display arguments apply
    assert!(body["widget_output"]
        .as_str()
        .unwrap()
        .starts_with(r#"<section class="widget">"#));

    let (_, main) = get_json(&app, "/api/sidebars/sidebar-1").await;
    let (_, footer) = get_json(&app, "/api/sidebars/footer").await;
    assert!(active_widgets(&main).is_empty());
    assert_eq!(active_widgets(&footer), vec![resident.as_str(), moved.as_str()]);
}

#[tokio::test]
async fn test_update_widget_move_defaults_to_first_position() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);
    let resident = create_widget(&app, "search", "footer", 1).await;
    let moved = create_widget(&app, "text", "sidebar-1", 1).await;

    let (status, body) = put_json(
        &app,
        &format!("/api/widgets/{moved}"),
        json!({ "sidebar_id": "footer" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["position"], 1);
    let (_, footer) = get_json(&app, "/api/sidebars/footer").await;
    assert_eq!(active_widgets(&footer), vec![moved.as_str(), resident.as_str()]);
}

#[tokio::test]
async fn test_update_widget_repositions_within_sidebar() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);
    let a = create_widget(&app, "search", "sidebar-1", 1).await;
    let b = create_widget(&app, "search", "sidebar-1", 2).await;
    let c = create_widget(&app, "search", "sidebar-1", 3).await;

    let (status, body) = put_json(
        &app,
        &format!("/api/widgets/{c}"),
        json!({ "sidebar_position": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["position"], 1);
    let (_, sidebar) = get_json(&app, "/api/sidebars/sidebar-1").await;
    assert_eq!(
        active_widgets(&sidebar),
        vec![c.as_str(), a.as_str(), b.as_str()]
    );
}

#[tokio::test]
async fn test_update_widget_errors() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);
    let id = create_widget(&app, "text", "sidebar-1", 1).await;

    // Template of a type with no instances
    let (status, body) = put_json(&app, "/api/widgets/search-1", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    // Unknown destination sidebar
    let (status, body) = put_json(
        &app,
        &format!("/api/widgets/{id}"),
        json!({ "sidebar_id": "sidebar-9" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_reference");

    // Unknown widget
    let (status, body) = put_json(&app, "/api/widgets/text-40", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_reference");

    // Placement is untouched
    let (_, widget) = get_json(&app, &format!("/api/widgets/{id}")).await;
    assert_eq!(widget["in_sidebar"], "sidebar-1");
}

#[tokio::test]
async fn test_failed_update_persists_nothing() {
    let (config, temp_dir) = temp_config();
    let options = json!({
        "sidebars_widgets": { "sidebar-1": ["text-2"], "footer": ["text-2"] },
        "widget_text": { "2": { "title": "Before", "text": "" }, "_multiwidget": 1 }
    });
    std::fs::write(
        temp_dir.path().join("options.json"),
        serde_json::to_vec(&options).unwrap(),
    )
    .unwrap();
    let app = create_router(AppState::new(config).unwrap());

    let (status, body) = put_json(
        &app,
        "/api/widgets/text-2",
        json!({ "settings": { "title": "After" }, "sidebar_id": "footer" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "internal_inconsistency");
    assert_eq!(read_options(temp_dir.path()), options);
}

// ============================================================================
// Widgets: delete
// ============================================================================

#[tokio::test]
async fn test_delete_widget() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);
    let first = create_widget(&app, "text", "sidebar-1", 1).await;
    let second = create_widget(&app, "text", "sidebar-1", 2).await;

    let (status, body) = delete_json(&app, &format!("/api/widgets/{first}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    assert_eq!(body["previous"]["id"], first.as_str());
    assert_eq!(body["previous"]["in_sidebar"], "sidebar-1");

    let (_, sidebar) = get_json(&app, "/api/sidebars/sidebar-1").await;
    assert_eq!(active_widgets(&sidebar), vec![second.as_str()]);

    let (status, _) = get_json(&app, &format!("/api/widgets/{first}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Deleted numbers are never handed out again
    let third = create_widget(&app, "text", "sidebar-1", 1).await;
    assert_eq!(third, "text-4");
}

#[tokio::test]
async fn test_delete_template_widget_is_not_found() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    let (status, body) = delete_json(&app, "/api/widgets/recent-posts-1").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

// ============================================================================
// Permissions
// ============================================================================

#[tokio::test]
async fn test_forbidden_operation() {
    let (state, _temp_dir) =
        create_test_state_with_permissions(&[("create_widget", toml::Value::Boolean(false))]);
    let app = create_router(state);

    let (status, body) = post_json(
        &app,
        "/api/widgets",
        json!({ "widget_base": "text", "sidebar_id": "sidebar-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    // Update falls back to the create verdict
    let (status, _) = put_json(&app, "/api/widgets/text-1", json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Reads are still allowed
    let (status, _) = get_json(&app, "/api/widgets").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_non_boolean_permission_verdict() {
    let (state, _temp_dir) = create_test_state_with_permissions(&[(
        "get_widgets",
        toml::Value::String("maybe".to_string()),
    )]);
    let app = create_router(state);

    let (status, body) = get_json(&app, "/api/widgets").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_operation");

    // Widget types share the list permission
    let (status, _) = get_json(&app, "/api/widget-types").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// ETags
// ============================================================================

#[tokio::test]
async fn test_etag_not_modified() {
    let (state, _temp_dir) = create_test_state();
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/sidebars").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let etag = response.headers()[header::ETAG].clone();

    let cached = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/sidebars")
                .header(header::IF_NONE_MATCH, etag.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(cached.status(), StatusCode::NOT_MODIFIED);
    let body = cached.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());

    // A placement change invalidates the tag
    create_widget(&app, "text", "sidebar-1", 1).await;
    let changed = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/sidebars")
                .header(header::IF_NONE_MATCH, etag.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(changed.status(), StatusCode::OK);
    assert_ne!(changed.headers()[header::ETAG], etag);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_state_persists_across_restarts() {
    let (config, temp_dir) = temp_config();

    let app = create_router(AppState::new(config.clone()).unwrap());
    let id = create_widget(&app, "text", "footer", 1).await;
    put_json(
        &app,
        &format!("/api/widgets/{id}"),
        json!({ "settings": { "title": "Saved" } }),
    )
    .await;

    let options = read_options(temp_dir.path());
    assert_eq!(options["sidebars_widgets"]["footer"], json!([id.clone()]));
    assert_eq!(options["widget_text"]["2"]["title"], "Saved");

    // A fresh server over the same files sees the same state
    let restarted = create_router(AppState::new(config).unwrap());
    let (status, widget) = get_json(&restarted, &format!("/api/widgets/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(widget["in_sidebar"], "footer");
    assert_eq!(widget["instance"]["title"], "Saved");
}

#[tokio::test]
async fn test_builtin_site_without_site_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::new();
    config.paths.data_file = Some(temp_dir.path().join("options.json"));

    let app = create_router(AppState::new(config).unwrap());
    let (status, body) = get_json(&app, "/api/sidebars").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "sidebar-1");
}
