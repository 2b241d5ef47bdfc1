#![allow(clippy::unwrap_used)]
// End-to-end refresh cycles against a mocked Umami server.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use umami_api::{ApiClient, Credentials, MetricType};
use umami_core::families::{
    FETCH_SUCCESS, LAST_FETCH_TIMESTAMP, METRIC_VALUE, WEBSITE_ACTIVE_VISITORS,
    WEBSITE_PAGEVIEWS, WEBSITE_VISITORS,
};
use umami_core::{CycleOutcome, CycleStatus, MemorySink, RefreshConfig, Refresher};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Refresher<ApiClient, MemorySink>) {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "t" })))
        .mount(&server)
        .await;

    let client = ApiClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        Credentials {
            username: "admin".into(),
            password: "umami".to_string().into(),
        },
    )
    .unwrap();

    let refresher = Refresher::new(
        client,
        Arc::new(MemorySink::new()),
        Arc::new(CycleStatus::new()),
        RefreshConfig {
            metric_types: vec![MetricType::Url],
            ..RefreshConfig::default()
        },
    );
    (server, refresher)
}

async fn mount_website(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/websites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "1", "name": "A", "domain": "a.com" }],
            "count": 1,
            "page": 1,
            "pageSize": 1000
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/websites/1/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pageviews": { "value": 10, "prev": 4 },
            "visitors": { "value": 6, "prev": 2 }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/websites/1/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "visitors": 3 })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/websites/1/metrics"))
        .and(query_param("type", "url"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "x": "", "y": 7 },
            { "x": "/pricing", "y": 2 }
        ])))
        .mount(server)
        .await;
}

const LABELS: [&str; 3] = ["1", "A", "a.com"];

// ── Cycle tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_cycle_publishes_website_gauges() {
    let (server, refresher) = setup().await;
    mount_website(&server).await;

    let outcome = refresher.run_cycle(&CancellationToken::new()).await;

    assert_eq!(
        outcome,
        CycleOutcome::Committed {
            websites: 1,
            failed_fetches: 0
        }
    );
    let sink = refresher.sink();
    assert_eq!(sink.get(WEBSITE_PAGEVIEWS, &LABELS), Some(10.0));
    assert_eq!(sink.get(WEBSITE_VISITORS, &LABELS), Some(6.0));
    assert_eq!(sink.get(WEBSITE_ACTIVE_VISITORS, &LABELS), Some(3.0));
    assert_eq!(
        sink.get(METRIC_VALUE, &["1", "A", "a.com", "url", "<empty>"]),
        Some(7.0)
    );
    assert_eq!(
        sink.get(METRIC_VALUE, &["1", "A", "a.com", "url", "/pricing"]),
        Some(2.0)
    );
    assert_eq!(sink.get(FETCH_SUCCESS, &[]), Some(1.0));
    assert!(sink.get(LAST_FETCH_TIMESTAMP, &[]).unwrap() > 0.0);

    let status = refresher.status();
    assert!(status.last_cycle_success());
    assert!(status.last_cycle_timestamp() > 0);
}

#[tokio::test]
async fn test_breakdown_failure_keeps_other_gauges() {
    let (server, refresher) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/websites/1/metrics"))
        .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
        .mount(&server)
        .await;
    mount_website(&server).await;

    let outcome = refresher.run_cycle(&CancellationToken::new()).await;

    assert_eq!(
        outcome,
        CycleOutcome::Committed {
            websites: 1,
            failed_fetches: 1
        }
    );
    let sink = refresher.sink();
    assert_eq!(sink.get(WEBSITE_PAGEVIEWS, &LABELS), Some(10.0));
    assert!(sink.family(METRIC_VALUE).is_empty());
    assert!(refresher.status().last_cycle_success());
}

#[tokio::test]
async fn test_listing_failure_fails_cycle() {
    let (server, refresher) = setup().await;
    mount_website(&server).await;
    refresher.run_cycle(&CancellationToken::new()).await;
    let committed_at = refresher.status().last_cycle_timestamp();

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "t" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/websites"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let outcome = refresher.run_cycle(&CancellationToken::new()).await;

    assert_eq!(outcome, CycleOutcome::ListingFailed);
    let status = refresher.status();
    assert!(!status.last_cycle_success());
    assert_eq!(status.last_cycle_timestamp(), committed_at);

    // Previous snapshot is still served.
    let sink = refresher.sink();
    assert_eq!(sink.get(FETCH_SUCCESS, &[]), Some(0.0));
    assert_eq!(sink.get(WEBSITE_PAGEVIEWS, &LABELS), Some(10.0));
}

#[tokio::test]
async fn test_listing_unreachable_fails_cycle() {
    let (server, refresher) = setup().await;
    drop(server);

    let outcome = refresher.run_cycle(&CancellationToken::new()).await;

    assert_eq!(outcome, CycleOutcome::ListingFailed);
    assert!(!refresher.status().last_cycle_success());
    assert_eq!(refresher.status().last_cycle_timestamp(), 0);
}
