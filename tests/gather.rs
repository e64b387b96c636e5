use std::sync::Arc;

use axum::extract::RawQuery;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use angie_api_input::{
    AngieApi, ApiVersion, Config, Error, FieldValue, Measurement, MetricsCollector, Resource,
};

// ─── Mock status API ─────────────────────────────────────────────

/// Serve `body` as JSON, but only for the `?pretty=off` query the client
/// is expected to send.
fn json_route(body: Value) -> axum::routing::MethodRouter {
    get(move |RawQuery(query): RawQuery| {
        let body = body.clone();
        async move {
            if query.as_deref() != Some("pretty=off") {
                return (StatusCode::BAD_REQUEST, "missing pretty=off").into_response();
            }
            Json(body).into_response()
        }
    })
}

fn legacy_server() -> Router {
    Router::new()
        .route("/status/processes", json_route(json!({ "respawned": 0 })))
        .route(
            "/status/connections",
            json_route(json!({ "accepted": 10, "dropped": 0, "active": 2, "idle": 1 })),
        )
        .route(
            "/status/http/upstreams",
            json_route(json!({
                "backend": {
                    "peers": {
                        "10.0.0.1:80": {
                            "server": "10.0.0.1:80", "backup": true, "weight": 1, "state": "up",
                            "selected": { "current": 0, "total": 1 },
                            "responses": { "200": 1 },
                            "data": { "sent": 1, "received": 2 },
                            "health": { "fails": 0, "unavailable": 0, "downtime": 0 }
                        },
                        "10.0.0.2:80": {
                            "server": "10.0.0.2:80", "backup": false, "weight": 1, "state": "up",
                            "selected": { "current": 0, "total": 0 },
                            "responses": {},
                            "data": { "sent": 0, "received": 0 },
                            "health": { "fails": 0, "unavailable": 0, "downtime": 0 }
                        }
                    },
                    "keepalive": 0
                }
            })),
        )
        .route(
            "/status/http/caches",
            json_route(json!({
                "static": {
                    "size": 0, "max_size": 1048576, "cold": false,
                    "hit": { "responses": 0, "bytes": 0 },
                    "stale": { "responses": 0, "bytes": 0 },
                    "updating": { "responses": 0, "bytes": 0 },
                    "miss": { "responses": 0, "bytes": 0, "responses_written": 0, "bytes_written": 0 },
                    "expired": { "responses": 0, "bytes": 0, "responses_written": 0, "bytes_written": 0 },
                    "bypass": { "responses": 0, "bytes": 0, "responses_written": 0, "bytes_written": 0 }
                }
            })),
        )
        .route(
            "/status/http/limit_reqs",
            json_route(json!({ "one": { "passed": 3, "delayed": 0, "rejected": 1,
                                        "delayed_dry_run": 0, "rejected_dry_run": 0 } })),
        )
        .route(
            "/status/slabs",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/status/http/location_zones",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html></html>") }),
        )
        .route(
            "/status/resolvers",
            get(|| async { ([(header::CONTENT_TYPE, "application/json")], "{\"zone\": ") }),
        )
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/status")
}

/// An address nothing listens on.
async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/status")
}

async fn gather(urls: Vec<String>, api_version: ApiVersion) -> (Vec<Measurement>, Vec<Error>) {
    let plugin = AngieApi::new(Config {
        urls,
        api_version,
        ..Config::default()
    });
    let collector = Arc::new(MetricsCollector::new());
    plugin.gather(collector.clone()).await.unwrap();
    let gathered = collector.drain();
    (gathered.measurements, gathered.errors)
}

fn named<'a>(ms: &'a [Measurement], name: &str) -> Vec<&'a Measurement> {
    ms.iter().filter(|m| m.name == name).collect()
}

// ─── Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn upstream_peers_are_tagged_per_peer() {
    let base = spawn(legacy_server()).await;
    let (ms, _) = gather(vec![base.clone()], ApiVersion::Legacy).await;

    let groups = named(&ms, "angie_api_http_upstreams");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].tags["upstream"], "backend");

    let peers = named(&ms, "angie_api_http_upstream_peers");
    assert_eq!(peers.len(), 2);
    for peer in peers {
        assert_eq!(peer.tags["upstream"], "backend");
        assert_eq!(peer.tags["source"], "127.0.0.1");
        let expected_backup = peer.tags["peer"] == "10.0.0.1:80";
        assert_eq!(peer.fields["backup"], FieldValue::Bool(expected_backup));
    }
}

#[tokio::test]
async fn one_resource_pass_shares_a_timestamp() {
    let base = spawn(legacy_server()).await;
    let (ms, _) = gather(vec![base], ApiVersion::Legacy).await;

    let upstream: Vec<_> = ms
        .iter()
        .filter(|m| m.name.starts_with("angie_api_http_upstream"))
        .collect();
    assert_eq!(upstream.len(), 3);
    assert!(upstream.iter().all(|m| m.time == upstream[0].time));
}

#[tokio::test]
async fn absent_cache_state_is_not_emitted() {
    let base = spawn(legacy_server()).await;
    let (ms, _) = gather(vec![base], ApiVersion::Legacy).await;

    let caches = named(&ms, "angie_api_http_caches");
    assert_eq!(caches.len(), 1);
    let cache = caches[0];
    assert_eq!(cache.tags["cache"], "static");
    assert!(!cache.has_field("revalidated_responses"));
    assert!(!cache.has_field("revalidated_bytes"));
    // zero is a real value, not an absent one
    assert_eq!(cache.int("hit_responses"), Some(0));
}

#[tokio::test]
async fn not_found_is_suppressed_and_other_failures_reported() {
    let base = spawn(legacy_server()).await;
    let (ms, errors) = gather(vec![base.clone()], ApiVersion::Legacy).await;

    assert!(!errors.iter().any(Error::is_not_found));
    assert_eq!(errors.len(), 3, "{errors:?}");

    let status = errors
        .iter()
        .find(|e| matches!(e, Error::UnexpectedStatus { .. }))
        .expect("500 reported");
    let msg = status.to_string();
    assert!(msg.contains(&format!("{base}/slabs")), "{msg}");
    assert!(msg.contains("500"), "{msg}");

    assert!(errors
        .iter()
        .any(|e| matches!(e, Error::UnexpectedContentType { content_type, .. } if content_type == "text/html")));
    assert!(errors.iter().any(|e| matches!(e, Error::Decode { .. })));

    // the rest of the resources still came through
    assert_eq!(named(&ms, "angie_api_processes").len(), 1);
    assert_eq!(named(&ms, "angie_api_connections").len(), 1);
    assert_eq!(named(&ms, "angie_api_http_limit_reqs").len(), 1);
    assert!(named(&ms, "angie_api_slabs_pages").is_empty());
}

#[tokio::test]
async fn unreachable_url_does_not_block_reachable_one() {
    let live = spawn(legacy_server()).await;
    let dead = dead_url().await;

    let (alone, _) = gather(vec![live.clone()], ApiVersion::Legacy).await;
    let (ms, errors) = gather(vec![live, dead.clone()], ApiVersion::Legacy).await;

    assert_eq!(ms.len(), alone.len());

    let transport: Vec<_> = errors
        .iter()
        .filter(|e| matches!(e, Error::Transport { url, .. } if url.starts_with(&dead)))
        .collect();
    assert_eq!(transport.len(), Resource::ALL.len());
}

#[tokio::test]
async fn invalid_url_is_reported_and_skipped() {
    let live = spawn(legacy_server()).await;
    let (ms, errors) = gather(vec!["::nope::".into(), live], ApiVersion::Legacy).await;

    assert!(errors.iter().any(|e| matches!(e, Error::InvalidUrl { .. })));
    assert!(!ms.is_empty());
}

#[tokio::test]
async fn current_schema_decodes_new_limiter_counters() {
    let router = Router::new().route(
        "/status/http/limit_reqs",
        json_route(json!({ "one": { "passed": 3, "skipped": 0, "delayed": 0, "rejected": 1, "exhausted": 2 } })),
    );
    let base = spawn(router).await;
    let (ms, errors) = gather(vec![base], ApiVersion::Current).await;

    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(ms.len(), 1);
    let limit = ms[0].clone();
    assert_eq!(limit.name, "angie_api_http_limit_reqs");
    assert_eq!(limit.tags["limit"], "one");
    // explicit port from the bound listener, never the scheme default
    assert_ne!(limit.tags["port"], "80");
    assert_eq!(limit.int("exhausted"), Some(2));
    assert!(!limit.has_field("rejected_dry_run"));
}
