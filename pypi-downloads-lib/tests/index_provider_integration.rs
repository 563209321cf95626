//! Integration tests for the index provider against a mock simple index.

use pypi_downloads_lib::index::{IndexSource, Provider};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><meta name="pypi:repository-version" content="1.1"><title>Simple index</title></head>
  <body>
    <a href="/simple/requests/">requests</a>
    <a href="/simple/numpy/">numpy</a>
    <a href="/simple/requests/">requests</a>
    <a href="/simple/blank/">  </a>
    <a href="zope-interface/">zope.interface</a>
  </body>
</html>"#;

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri does not support sockets")]
async fn test_fetch_index_lists_unique_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INDEX_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Provider::new(reqwest::Client::new(), Some(&format!("{}/simple/", server.uri())));
    let entries = provider.fetch_index().await.unwrap();

    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["numpy", "requests", "zope.interface"]);

    assert_eq!(entries[0].url, format!("{}/simple/numpy/", server.uri()));
    assert_eq!(entries[2].url, format!("{}/simple/zope-interface/", server.uri()));
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri does not support sockets")]
async fn test_fetch_index_empty_listing_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    let provider = Provider::new(reqwest::Client::new(), Some(&format!("{}/simple/", server.uri())));
    let _ = provider.fetch_index().await.unwrap_err();
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri does not support sockets")]
async fn test_fetch_index_client_error_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Provider::new(reqwest::Client::new(), Some(&format!("{}/simple/", server.uri())));
    let _ = provider.fetch_index().await.unwrap_err();
}
