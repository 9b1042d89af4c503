mod common;

use std::time::Duration;

use relaunch_core::{ReleaseResolver, ReleaseStrategy, ResolveError, Version, http_client};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver(server: &MockServer) -> ReleaseResolver {
    let client = http_client(Duration::from_secs(5)).expect("client should build");
    ReleaseResolver::new(client, "owner", "app").with_api_base(server.uri())
}

#[tokio::test]
async fn latest_release_maps_assets_and_sends_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/app/releases/latest"))
        .and(header("authorization", "Bearer secret-token"))
        .and(header("accept", "application/vnd.github+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::release_json(
            "v1.2.0",
            &server.uri(),
            &["relaunch", "relaunch-updater"],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let release = resolver(&server)
        .with_token(Some("secret-token".to_string()))
        .resolve_latest(ReleaseStrategy::LatestRelease)
        .await
        .expect("latest release should resolve");

    assert_eq!(release.tag, "v1.2.0");
    assert_eq!(release.version, Version::parse("1.2.0").expect("valid version"));
    assert_eq!(release.assets.len(), 2);
    let asset = release.asset("relaunch").expect("main asset should be listed");
    assert_eq!(asset.download_url, format!("{}/download/relaunch", server.uri()));
    assert_eq!(
        release.source_archive_url,
        format!("{}/repos/owner/app/zipball/v1.2.0", server.uri())
    );
}

#[tokio::test]
async fn anonymous_requests_carry_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/app/releases/latest"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::release_json("v0.1.0", &server.uri(), &[])),
        )
        .expect(1)
        .mount(&server)
        .await;

    resolver(&server)
        .with_token(None)
        .latest_release()
        .await
        .expect("anonymous request should succeed");

    let requests = server
        .received_requests()
        .await
        .expect("request recording should be enabled");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn tags_pick_highest_numeric_version() {
    let server = MockServer::start().await;
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/repos/owner/app/tags"))
        .and(query_param("per_page", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            common::tag_json("v1.9.0", &uri),
            common::tag_json("latest", &uri),
            common::tag_json("v1.10.0", &uri),
            common::tag_json("v1.2.3", &uri),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let release = resolver(&server)
        .resolve_latest(ReleaseStrategy::Tags)
        .await
        .expect("tags should resolve");

    assert_eq!(release.tag, "v1.10.0");
    assert!(release.assets.is_empty());
    assert_eq!(
        release.source_archive_url,
        format!("{uri}/repos/owner/app/zipball/v1.10.0")
    );
}

#[tokio::test]
async fn tags_without_zipball_url_fall_back_to_api_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/app/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "name": "v2.0.0", "commit": { "sha": "abc" } }
        ])))
        .mount(&server)
        .await;

    let release = resolver(&server)
        .latest_tag()
        .await
        .expect("tag should resolve");

    assert_eq!(
        release.source_archive_url,
        format!("{}/repos/owner/app/zipball/v2.0.0", server.uri())
    );
}

#[tokio::test]
async fn zero_tags_is_an_empty_repository() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/app/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = resolver(&server).resolve_latest(ReleaseStrategy::Tags).await;

    assert!(matches!(
        result,
        Err(ResolveError::EmptyRepository { ref owner, ref repo }) if owner == "owner" && repo == "app"
    ));
}

#[tokio::test]
async fn only_unparseable_tags_is_an_invalid_version() {
    let server = MockServer::start().await;
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/repos/owner/app/tags"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([common::tag_json("nightly", &uri)])),
        )
        .mount(&server)
        .await;

    let result = resolver(&server).latest_tag().await;
    assert!(matches!(result, Err(ResolveError::InvalidVersion { ref tag, .. }) if tag == "nightly"));
}

#[tokio::test]
async fn missing_release_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/app/releases/latest"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let result = resolver(&server).latest_release().await;
    assert!(matches!(result, Err(ResolveError::NotFound { .. })));
}

#[tokio::test]
async fn rate_limit_surfaces_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/app/releases/latest"))
        .respond_with(
            ResponseTemplate::new(403).set_body_string("API rate limit exceeded for 127.0.0.1"),
        )
        .mount(&server)
        .await;

    let error = resolver(&server)
        .latest_release()
        .await
        .expect_err("rate limited request should fail");

    assert!(error.is_network());
    assert!(error.to_string().contains("403"));
    assert!(error.to_string().contains("rate limit"));
}

#[tokio::test]
async fn slow_api_hits_the_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/app/releases/latest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::release_json("v9.0.0", &server.uri(), &[]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let error = resolver(&server)
        .with_timeout(Duration::from_millis(200))
        .latest_release()
        .await
        .expect_err("request should time out");

    assert!(matches!(error, ResolveError::Network { .. }));
}

#[tokio::test]
async fn unparseable_release_tag_is_an_invalid_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/app/releases/latest"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::release_json("latest", &server.uri(), &[])),
        )
        .mount(&server)
        .await;

    let result = resolver(&server).latest_release().await;
    assert!(matches!(result, Err(ResolveError::InvalidVersion { .. })));
}
