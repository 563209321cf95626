//! Integration tests for the stats provider against a mock stats service.

use pypi_downloads_lib::http::Throttler;
use pypi_downloads_lib::stats::{DownloadCounts, Provider, StatsOutcome, StatsSource};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> (Provider, std::sync::Arc<Throttler>) {
    let throttler = Throttler::new(4);
    let provider = Provider::new(reqwest::Client::new(), Some(&server.uri()), std::sync::Arc::clone(&throttler));
    (provider, throttler)
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri does not support sockets")]
async fn test_fetch_stats_valid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/packages/requests/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"data": {"last_day": 10, "last_month": 300, "last_week": 70}, "package": "requests", "type": "recent_downloads"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (provider, _) = provider(&server);
    let outcome = provider.fetch_stats("requests").await.unwrap();
    assert_eq!(outcome, StatsOutcome::Valid(DownloadCounts::new(10, 70, 300)));
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri does not support sockets")]
async fn test_fetch_stats_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/packages/missing/recent"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (provider, _) = provider(&server);
    assert_eq!(provider.fetch_stats("missing").await.unwrap(), StatsOutcome::NotFound);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri does not support sockets")]
async fn test_fetch_stats_null_body_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/packages/quiet/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let (provider, _) = provider(&server);
    assert_eq!(provider.fetch_stats("quiet").await.unwrap(), StatsOutcome::NotFound);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri does not support sockets")]
async fn test_fetch_stats_negative_counts_fail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/packages/odd/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data": {"last_day": -1, "last_week": 0, "last_month": 0}}"#))
        .mount(&server)
        .await;

    let (provider, _) = provider(&server);
    let _ = provider.fetch_stats("odd").await.unwrap_err();
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri does not support sockets")]
async fn test_fetch_stats_rate_limited_pauses_throttler() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/packages/busy/recent"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(4)
        .mount(&server)
        .await;

    let (provider, throttler) = provider(&server);
    let _ = provider.fetch_stats("busy").await.unwrap_err();

    // A zero-length pause lifts on its own.
    let permit = tokio::time::timeout(core::time::Duration::from_secs(5), throttler.acquire()).await;
    assert!(permit.is_ok());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri does not support sockets")]
async fn test_fetch_stats_server_error_is_retried_then_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/packages/broken/recent"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let (provider, _) = provider(&server);
    let _ = provider.fetch_stats("broken").await.unwrap_err();
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri does not support sockets")]
async fn test_fetch_stats_recovers_after_transient_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/packages/flaky/recent"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/packages/flaky/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data": {"last_day": 1, "last_week": 2, "last_month": 3}}"#))
        .mount(&server)
        .await;

    let (provider, _) = provider(&server);
    assert_eq!(
        provider.fetch_stats("flaky").await.unwrap(),
        StatsOutcome::Valid(DownloadCounts::new(1, 2, 3))
    );
}
