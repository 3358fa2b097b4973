//! Integration tests for skywatch-fl API endpoints
//!
//! Tests cover:
//! - Bearer authentication (missing, malformed, invalid, expired)
//! - List/add/remove/reorder favorites with dense display orders
//! - Catalog dedup across users and garbage collection
//! - Dual-naming request bodies and validation failures
//! - Favorites broadcast events after mutations
//! - Health endpoint (no auth required) and 404 fallback

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

use skywatch_common::api::auth::Claims;
use skywatch_common::config::ServiceConfig;
use skywatch_common::db::init::{connect_readonly, init_database};
use skywatch_fl::{build_router, AppState};

const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

struct TestApp {
    app: Router,
    state: AppState,
    /// Primary pool handle for direct assertions against the store
    db: SqlitePool,
    _dir: TempDir,
}

async fn setup() -> TestApp {
    setup_with_origin("*").await
}

async fn setup_with_origin(origin: &str) -> TestApp {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let db_path = dir.path().join("skywatch.db");

    let db = init_database(&db_path).await.expect("Should init database");
    let read_db = connect_readonly(&db_path)
        .await
        .expect("Should open read-only pool");

    let config = ServiceConfig {
        bind_host: "127.0.0.1".to_string(),
        port: 0,
        allowed_origin: origin.to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        enrichment_url: None,
    };

    let state = AppState::new(db.clone(), read_db, &config);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        db,
        _dir: dir,
    }
}

fn issue_token(user_id: &str, exp_offset_secs: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        user_id: user_id.to_string(),
        username: format!("{}-name", user_id),
        exp: now + exp_offset_secs,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Should encode token")
}

fn token_for(user_id: &str) -> String {
    issue_token(user_id, 3600)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    match body {
        Some(value) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    };
    (status, body)
}

fn city_body(name: &str, country: &str) -> Value {
    json!({
        "city_name": name,
        "country_code": country,
        "latitude": 38.72,
        "longitude": -9.14,
    })
}

async fn add_city(app: &Router, token: &str, name: &str, country: &str) -> Value {
    let (status, body) = send(
        app,
        request("POST", "/locations", Some(token), Some(city_body(name, country))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "add failed: {}", body);
    body
}

// =============================================================================
// Health and routing
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let t = setup().await;

    let (status, body) = send(&t.app, request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "skywatch-fl");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_unmatched_route_is_404() {
    let t = setup().await;
    let token = token_for("u1");

    let (status, body) = send(&t.app, request("GET", "/nope", Some(&token), None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not Found");
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_missing_token_rejected() {
    let t = setup().await;

    let (status, body) = send(&t.app, request("GET", "/locations", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized: Invalid Token");
}

#[tokio::test]
async fn test_malformed_header_rejected() {
    let t = setup().await;

    let req = Request::builder()
        .method("GET")
        .uri("/locations")
        .header("Authorization", "Token abc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&t.app, req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized: Invalid Token");
}

#[tokio::test]
async fn test_invalid_signature_rejected() {
    let t = setup().await;

    let forged = {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            user_id: "u1".to_string(),
            username: "u1-name".to_string(),
            exp: now + 3600,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"wrong-secret-wrong-secret-wrong-secret"),
        )
        .unwrap()
    };

    let (status, body) = send(&t.app, request("GET", "/locations", Some(&forged), None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized: Invalid Token");
}

#[tokio::test]
async fn test_expired_token_distinguished() {
    let t = setup().await;
    let expired = issue_token("u1", -3600);

    let (status, body) = send(&t.app, request("GET", "/locations", Some(&expired), None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token Expired");
}

// =============================================================================
// List / Add
// =============================================================================

#[tokio::test]
async fn test_empty_list() {
    let t = setup().await;
    let token = token_for("u1");

    let (status, body) = send(&t.app, request("GET", "/locations", Some(&token), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_first_add_gets_order_zero() {
    let t = setup().await;
    let token = token_for("u1");

    let created = add_city(&t.app, &token, "Lisbon", "PT").await;

    assert_eq!(created["display_order"], 0);
    assert_eq!(created["city_name"], "Lisbon");
    assert_eq!(created["country_code"], "PT");
    assert!(created["location_id"].is_number());
}

#[tokio::test]
async fn test_add_then_list_round_trip() {
    let t = setup().await;
    let token = token_for("u1");

    add_city(&t.app, &token, "Lisbon", "PT").await;
    add_city(&t.app, &token, "Oslo", "NO").await;
    let third = add_city(&t.app, &token, "Quito", "EC").await;
    assert_eq!(third["display_order"], 2);

    let (status, body) = send(&t.app, request("GET", "/locations", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 3);
    for (index, favorite) in list.iter().enumerate() {
        assert_eq!(favorite["display_order"], index as i64);
    }
    assert_eq!(list[2]["city_name"], "Quito");
}

#[tokio::test]
async fn test_add_accepts_camel_case_body() {
    let t = setup().await;
    let token = token_for("u1");

    let body = json!({
        "cityName": "Lisbon",
        "countryCode": "PT",
        "latitude": 38.72,
        "longitude": -9.14,
        "displayOrder": 4,
    });
    let (status, created) = send(
        &t.app,
        request("POST", "/locations", Some(&token), Some(body)),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["city_name"], "Lisbon");
    // Explicit display order is accepted verbatim
    assert_eq!(created["display_order"], 4);
}

#[tokio::test]
async fn test_add_malformed_body_rejected() {
    let t = setup().await;
    let token = token_for("u1");

    // latitude missing
    let body = json!({ "city_name": "Lisbon", "country_code": "PT" });
    let (status, _) = send(
        &t.app,
        request("POST", "/locations", Some(&token), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // blank city name
    let (status, _) = send(
        &t.app,
        request("POST", "/locations", Some(&token), Some(city_body("  ", "PT"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_catalog_deduplicated_across_users() {
    let t = setup().await;
    let token_a = token_for("u1");
    let token_b = token_for("u2");

    let a = add_city(&t.app, &token_a, "Lisbon", "PT").await;
    let b = add_city(&t.app, &token_b, "Lisbon", "PT").await;
    assert_eq!(a["location_id"], b["location_id"]);

    let catalog_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM locations WHERE name = 'Lisbon' AND country_code = 'PT'",
    )
    .fetch_one(&t.db)
    .await
    .unwrap();
    let favorite_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM user_favorite_locations")
            .fetch_one(&t.db)
            .await
            .unwrap();

    assert_eq!(catalog_rows, 1);
    assert_eq!(favorite_rows, 2);
}

// =============================================================================
// Get one
// =============================================================================

#[tokio::test]
async fn test_get_single_favorite() {
    let t = setup().await;
    let token = token_for("u1");

    let created = add_city(&t.app, &token, "Lisbon", "PT").await;
    let uri = format!("/locations/{}", created["location_id"]);

    let (status, body) = send(&t.app, request("GET", &uri, Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["city_name"], "Lisbon");

    let (status, _) = send(&t.app, request("GET", "/locations/9999", Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Remove
// =============================================================================

#[tokio::test]
async fn test_remove_compacts_and_collects() {
    let t = setup().await;
    let token = token_for("u1");

    let a = add_city(&t.app, &token, "Lisbon", "PT").await;
    let b = add_city(&t.app, &token, "Oslo", "NO").await;
    let c = add_city(&t.app, &token, "Quito", "EC").await;

    let uri = format!("/locations/{}", b["location_id"]);
    let (status, body) = send(&t.app, request("DELETE", &uri, Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Location deleted successfully");

    // Survivors compacted to dense orders in their old sequence
    let (_, list) = send(&t.app, request("GET", "/locations", Some(&token), None)).await;
    let list = list.as_array().unwrap().clone();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["location_id"], a["location_id"]);
    assert_eq!(list[0]["display_order"], 0);
    assert_eq!(list[1]["location_id"], c["location_id"]);
    assert_eq!(list[1]["display_order"], 1);

    // Nobody else referenced Oslo: catalog row is gone
    let catalog_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations WHERE name = 'Oslo'")
        .fetch_one(&t.db)
        .await
        .unwrap();
    assert_eq!(catalog_rows, 0);
}

#[tokio::test]
async fn test_remove_keeps_shared_location() {
    let t = setup().await;
    let token_a = token_for("u1");
    let token_b = token_for("u2");

    let shared = add_city(&t.app, &token_a, "Lisbon", "PT").await;
    add_city(&t.app, &token_b, "Lisbon", "PT").await;

    let uri = format!("/locations/{}", shared["location_id"]);
    let (status, _) = send(&t.app, request("DELETE", &uri, Some(&token_a), None)).await;
    assert_eq!(status, StatusCode::OK);

    let catalog_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM locations WHERE name = 'Lisbon'")
            .fetch_one(&t.db)
            .await
            .unwrap();
    assert_eq!(catalog_rows, 1);

    let (_, list_b) = send(&t.app, request("GET", "/locations", Some(&token_b), None)).await;
    assert_eq!(list_b.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_remove_absent_favorite_is_success() {
    let t = setup().await;
    let token = token_for("u1");

    add_city(&t.app, &token, "Lisbon", "PT").await;

    let (status, body) = send(
        &t.app,
        request("DELETE", "/locations/9999", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Location deleted successfully");

    let (_, list) = send(&t.app, request("GET", "/locations", Some(&token), None)).await;
    let list = list.as_array().unwrap().clone();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["display_order"], 0);
}

// =============================================================================
// Reorder
// =============================================================================

#[tokio::test]
async fn test_reorder_applies_array_index_order() {
    let t = setup().await;
    let token = token_for("u1");

    let a = add_city(&t.app, &token, "Lisbon", "PT").await;
    let c = add_city(&t.app, &token, "Quito", "EC").await;

    let body = json!({ "locationOrder": [c["location_id"], a["location_id"]] });
    let (status, response) = send(
        &t.app,
        request("PUT", "/locations/order", Some(&token), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Location order updated successfully");

    let (_, list) = send(&t.app, request("GET", "/locations", Some(&token), None)).await;
    let list = list.as_array().unwrap().clone();
    assert_eq!(list[0]["location_id"], c["location_id"]);
    assert_eq!(list[0]["display_order"], 0);
    assert_eq!(list[1]["location_id"], a["location_id"]);
    assert_eq!(list[1]["display_order"], 1);
}

#[tokio::test]
async fn test_reorder_rejects_non_sequence_body() {
    let t = setup().await;
    let token = token_for("u1");

    add_city(&t.app, &token, "Lisbon", "PT").await;

    let body = json!({ "locationOrder": "not-an-array" });
    let (status, _) = send(
        &t.app,
        request("PUT", "/locations/order", Some(&token), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = json!({ "somethingElse": [1, 2] });
    let (status, _) = send(
        &t.app,
        request("PUT", "/locations/order", Some(&token), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reorder_rejects_non_permutation() {
    let t = setup().await;
    let token = token_for("u1");

    let a = add_city(&t.app, &token, "Lisbon", "PT").await;
    add_city(&t.app, &token, "Oslo", "NO").await;

    let body = json!({ "locationOrder": [a["location_id"]] });
    let (status, _) = send(
        &t.app,
        request("PUT", "/locations/order", Some(&token), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Broadcast events
// =============================================================================

#[tokio::test]
async fn test_add_broadcasts_refreshed_list() {
    let t = setup().await;
    let token = token_for("u1");

    let mut rx = t.state.events.subscribe();

    add_city(&t.app, &token, "Lisbon", "PT").await;

    // The broadcast task runs detached; give it a bounded wait. A
    // LocationCreated event may arrive first for the new catalog row.
    let deadline = std::time::Duration::from_secs(5);
    loop {
        let event = tokio::time::timeout(deadline, rx.recv())
            .await
            .expect("Should receive broadcast before timeout")
            .expect("Event bus closed");

        if let skywatch_common::events::SkywatchEvent::FavoritesChanged {
            user_id,
            favorites,
            ..
        } = event
        {
            assert_eq!(user_id, "u1");
            assert_eq!(favorites.len(), 1);
            assert_eq!(favorites[0].city_name, "Lisbon");
            break;
        }
    }
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn test_cors_headers_on_configured_origin() {
    let t = setup_with_origin("https://app.skywatch.example").await;

    let req = Request::builder()
        .method("OPTIONS")
        .uri("/locations")
        .header("Origin", "https://app.skywatch.example")
        .header("Access-Control-Request-Method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let allow_origin = response
        .headers()
        .get("access-control-allow-origin")
        .expect("preflight missing allow-origin header");
    assert_eq!(allow_origin, "https://app.skywatch.example");
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-credentials")
            .map(|v| v.to_str().unwrap().to_string()),
        Some("true".to_string())
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    assert!(bytes.is_empty(), "preflight response must have no body");
}

#[tokio::test]
async fn test_cors_headers_present_on_errors() {
    let t = setup_with_origin("https://app.skywatch.example").await;

    // Unauthorized response still carries CORS headers
    let req = Request::builder()
        .method("GET")
        .uri("/locations")
        .header("Origin", "https://app.skywatch.example")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_some());
}
