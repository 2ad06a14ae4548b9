//! Fetcher tests against a local page server.

use std::net::SocketAddr;

use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use url::Url;

use super::{FetchSettings, MetadataFetcher, MetadataOutcome, UrlMetadata};
use crate::backend::MetadataSource;

const ARTICLE: &str = r#"<!doctype html>
<html>
<head>
  <title>Plain Title</title>
  <meta property="og:title" content="An Article">
  <meta property="og:description" content="About things">
  <meta property="og:image" content="/cover.png">
  <meta property="og:site_name" content="Pages">
  <link rel="icon" href="/favicon.ico">
</head>
<body><h1>Heading</h1></body>
</html>"#;

async fn serve_pages() -> SocketAddr {
    let router = Router::new()
        .route("/article", get(|| async { Html(ARTICLE) }))
        .route(
            "/forbidden",
            get(|| async { (StatusCode::FORBIDDEN, "go away") }),
        )
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "oops") }),
        )
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/image",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![0x89u8, b'P', b'N', b'G']) }),
        )
        .route(
            "/huge",
            get(|| async { Html(format!("<title>{}</title>", "x".repeat(4096))).into_response() }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    address
}

fn fetcher() -> MetadataFetcher {
    MetadataFetcher::new(&FetchSettings {
        max_html_bytes: 2048,
        retries: 0,
        ..FetchSettings::default()
    })
    .unwrap()
}

fn page(address: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{}{}", address, path)).unwrap()
}

#[tokio::test]
async fn extracts_social_preview_fields() {
    let address = serve_pages().await;
    let target = page(address, "/article");

    let MetadataOutcome::Extracted(metadata) = fetcher().fetch(&target).await else {
        panic!("expected extracted metadata");
    };
    assert_eq!(metadata.title.as_deref(), Some("An Article"));
    assert_eq!(metadata.description.as_deref(), Some("About things"));
    assert_eq!(metadata.site_name.as_deref(), Some("Pages"));
    let origin = format!("http://{}", address);
    assert_eq!(metadata.image, Some(format!("{}/cover.png", origin)));
    assert_eq!(metadata.favicon, Some(format!("{}/favicon.ico", origin)));
    assert_eq!(metadata.error, None);
}

#[tokio::test]
async fn forbidden_page_falls_back_to_hostname() {
    let address = serve_pages().await;
    let target = page(address, "/forbidden");

    let MetadataOutcome::Fallback(metadata) = fetcher().fetch(&target).await else {
        panic!("expected fallback metadata");
    };
    assert_eq!(metadata.title.as_deref(), Some("127.0.0.1"));
    assert_eq!(metadata.site_name.as_deref(), Some("127.0.0.1"));
    assert_eq!(metadata.description, None);
    assert_eq!(metadata.favicon, None);
    assert_eq!(
        metadata.error.as_deref(),
        Some("No metadata available (HTTP 403)")
    );
}

#[tokio::test]
async fn server_error_is_a_hard_failure_too() {
    let address = serve_pages().await;
    let outcome = fetcher().fetch(&page(address, "/broken")).await;
    assert!(matches!(outcome, MetadataOutcome::Fallback(_)));
}

#[tokio::test]
async fn other_statuses_fail() {
    let address = serve_pages().await;
    let outcome = fetcher().fetch(&page(address, "/missing")).await;
    let MetadataOutcome::Failed(message) = outcome.clone() else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert!(message.contains("404"));
    assert_eq!(outcome.into_metadata(), UrlMetadata::default());
}

#[tokio::test]
async fn unreachable_host_fails_without_panicking() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let outcome = fetcher().fetch(&page(address, "/")).await;
    assert!(matches!(outcome, MetadataOutcome::Failed(_)));
}

#[tokio::test]
async fn non_html_and_oversized_bodies_use_hostname() {
    let address = serve_pages().await;

    for path in ["/image", "/huge"] {
        let MetadataOutcome::Extracted(metadata) = fetcher().fetch(&page(address, path)).await
        else {
            panic!("expected extracted metadata for {}", path);
        };
        assert_eq!(metadata.title.as_deref(), Some("127.0.0.1"), "{}", path);
        assert_eq!(metadata.favicon, None);
    }
}

#[tokio::test]
async fn metadata_source_ignores_invalid_addresses() {
    let metadata = fetcher().fetch_metadata("not a url").await;
    assert_eq!(metadata, UrlMetadata::default());
}

#[test]
fn fallback_wire_shape() {
    let target = Url::parse("https://blocked.example.com/x").unwrap();
    let value = serde_json::to_value(UrlMetadata::fallback(&target, reqwest::StatusCode::FORBIDDEN)).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "title": "blocked.example.com",
            "description": null,
            "image": null,
            "favicon": null,
            "siteName": "blocked.example.com",
            "error": "No metadata available (HTTP 403)",
        })
    );
}
