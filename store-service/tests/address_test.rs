mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use store_service::startup::build_router;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn lookup(base_url: String, query: &str) -> (StatusCode, Value) {
    let mut config = common::test_config();
    config.geocoder.base_url = base_url;
    let (state, _) = common::test_state(config).await;

    let response = build_router(state)
        .oneshot(
            Request::get(format!("/api/v1/address{}", query))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn results_are_passed_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geocode"))
        .and(query_param("q", "Yonge Street"))
        .and(query_param("countrycode", "ca"))
        .and(query_param("key", "geo-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "formatted": "Yonge Street, Toronto, ON, Canada" }]
        })))
        .mount(&server)
        .await;

    let (status, body) = lookup(format!("{}/geocode", server.uri()), "?search=Yonge%20Street").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["formatted"], "Yonge Street, Toronto, ON, Canada");
}

#[tokio::test]
async fn upstream_failure_yields_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (status, body) = lookup(format!("{}/geocode", server.uri()), "?search=Toronto").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn blank_search_skips_the_lookup() {
    let server = MockServer::start().await;
    let (_, body) = lookup(format!("{}/geocode", server.uri()), "?search=%20").await;

    assert_eq!(body, json!([]));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
