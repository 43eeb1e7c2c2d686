//! Subscription fetching against a mock feed.

mod common;

use std::time::Duration;

use engine_supervisor::endpoint::{BatchError, Protocol};
use engine_supervisor::subscription::{FetchError, SubscriptionSource};

use common::*;

fn source(feed: &MockFeed) -> SubscriptionSource {
    SubscriptionSource::new(feed.url(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_fetch_decodes_mixed_batch() {
    let feed = MockFeed::start(
        200,
        subscription_blob(&[
            ss_descriptor("203.0.113.1", "A"),
            "trojan://unsupported".to_string(),
            vmess_descriptor("203.0.113.2", "B"),
        ]),
    )
    .await;

    let endpoints = source(&feed).fetch().await.unwrap();
    let tags: Vec<_> = endpoints.iter().map(|e| e.tag()).collect();
    assert_eq!(tags, vec!["A", "B"]);
    assert!(matches!(endpoints[0].protocol(), Protocol::Shadowsocks(_)));
    assert!(matches!(endpoints[1].protocol(), Protocol::VMess(_)));
    assert!(endpoints.iter().all(|e| e.check_port().is_none()));
}

#[tokio::test]
async fn test_fetch_rejects_error_status() {
    let feed = MockFeed::start(503, "maintenance".to_string()).await;
    let err = source(&feed).fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Status(status) if status.as_u16() == 503));
}

#[tokio::test]
async fn test_fetch_rejects_undecodable_blob() {
    let feed = MockFeed::start(200, "%%% not base64 %%%".to_string()).await;
    let err = source(&feed).fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Batch(BatchError::Blob(_))));
}

#[tokio::test]
async fn test_fetch_rejects_empty_batch() {
    let feed = MockFeed::start(200, subscription_blob(&[])).await;
    let err = source(&feed).fetch().await.unwrap_err();
    assert!(matches!(err, FetchError::Batch(BatchError::NoEndpoints)));
}

#[tokio::test]
async fn test_fetch_unreachable_feed() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = url::Url::parse(&format!("http://{}/sub", addr)).unwrap();
    let err = SubscriptionSource::new(url, Duration::from_secs(2))
        .unwrap()
        .fetch()
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Http(_)));
}
