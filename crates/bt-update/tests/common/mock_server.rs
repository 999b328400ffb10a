//! Mock GitHub server helpers
//!
//! Mounts wiremock endpoints shaped like the GitHub REST API and release
//! download URLs for the `braintrustdata/bt` repository.

#![allow(dead_code)]

use bt_core::types::{HostingConfig, NetworkConfig};
use bt_update::GitHubReleases;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REPO_PATH: &str = "/repos/braintrustdata/bt";

/// Client pointed at a mock server for both API and downloads
pub fn github_client(server: &MockServer, token_env: &str) -> GitHubReleases {
    let hosting = HostingConfig {
        api_url: server.uri(),
        download_url: server.uri(),
        token_env: token_env.to_string(),
        ..HostingConfig::default()
    };
    GitHubReleases::new(&hosting, &NetworkConfig::default()).unwrap()
}

/// Release JSON as returned by the API
pub fn release_json(tag: &str, prerelease: bool) -> serde_json::Value {
    json!({
        "tag_name": tag,
        "name": tag,
        "prerelease": prerelease,
        "draft": false,
        "published_at": "2026-01-15T10:00:00Z",
        "assets": []
    })
}

/// One page of the release list
pub async fn mock_release_page(server: &MockServer, page: u32, releases: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path(format!("{}/releases", REPO_PATH)))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(releases))
        .mount(server)
        .await;
}

/// A lightweight tag ref pointing straight at a commit
pub async fn mock_commit_ref(server: &MockServer, tag: &str, sha: &str) {
    mock_ref(server, tag, sha, "commit").await;
}

/// A tag ref pointing at an annotated tag object
pub async fn mock_annotated_ref(server: &MockServer, tag: &str, tag_sha: &str) {
    mock_ref(server, tag, tag_sha, "tag").await;
}

async fn mock_ref(server: &MockServer, tag: &str, sha: &str, kind: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{}/git/ref/tags/{}", REPO_PATH, tag)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ref": format!("refs/tags/{}", tag),
            "object": { "sha": sha, "type": kind }
        })))
        .mount(server)
        .await;
}

/// An annotated tag object pointing at another object
pub async fn mock_tag_object(server: &MockServer, tag_sha: &str, target_sha: &str, kind: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{}/git/tags/{}", REPO_PATH, tag_sha)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": tag_sha,
            "tag": "canary",
            "object": { "sha": target_sha, "type": kind }
        })))
        .mount(server)
        .await;
}

/// A release download URL serving fixed bytes
pub async fn mock_asset(server: &MockServer, tag: &str, name: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/braintrustdata/bt/releases/download/{}/{}", tag, name)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}
