//! Artifact download and verification tests

mod common;

use bt_core::retry::RecordingSleeper;
use bt_core::types::{ChecksumAlgorithm, RetryPolicy};
use bt_update::{
    ArtifactLocator, FetchError, Fetcher, HostError, PlatformTarget, ReleaseIdentifier,
};
use common::*;
use std::sync::Arc;

fn fetcher(source: FakeSource) -> (Arc<FakeSource>, Arc<RecordingSleeper>, Fetcher) {
    let source = Arc::new(source);
    let sleeper = Arc::new(RecordingSleeper::new());
    let fetcher = Fetcher::new(
        source.clone(),
        RetryPolicy::default(),
        ChecksumAlgorithm::Sha256,
    )
    .with_sleeper(sleeper.clone());
    (source, sleeper, fetcher)
}

fn descriptor() -> bt_update::ArtifactDescriptor {
    let release = ReleaseIdentifier::from_tag(LATEST_TAG);
    ArtifactLocator::default()
        .locate(&release, &PlatformTarget::new(TEST_OS, TEST_ARCH))
        .unwrap()
}

#[tokio::test]
async fn test_fetch_verified_downloads_archive_and_checksum() {
    let (source, _, fetcher) = fetcher(stable_source());

    let artifact = fetcher.fetch_verified(&descriptor()).await.unwrap();
    assert_eq!(artifact.release().as_str(), LATEST_TAG);
    assert_eq!(artifact.bytes(), release_archive(NEW_BINARY).as_slice());
    assert_eq!(source.download_count(), 2);

    let calls = source.calls();
    assert!(calls.contains(&format!("download:{}/{}", LATEST_TAG, ARCHIVE_NAME)));
    assert!(calls.contains(&format!("download:{}/{}", LATEST_TAG, CHECKSUM_NAME)));
}

#[tokio::test]
async fn test_checksum_mismatch_is_integrity_error() {
    let archive = release_archive(NEW_BINARY);
    let wrong = checksum_file(b"something else", ARCHIVE_NAME);
    let source = FakeSource::new()
        .with_release(LATEST_TAG)
        .with_object(LATEST_TAG, ARCHIVE_NAME, archive)
        .with_object(LATEST_TAG, CHECKSUM_NAME, wrong);
    let (_, _, fetcher) = fetcher(source);

    let err = fetcher.fetch_verified(&descriptor()).await.unwrap_err();
    assert!(err.is_integrity());
    match err {
        FetchError::Integrity {
            object,
            expected,
            actual,
        } => {
            assert_eq!(object, ARCHIVE_NAME);
            assert_ne!(expected, actual);
        }
        other => panic!("expected Integrity, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_checksum_file() {
    let source = FakeSource::new()
        .with_object(LATEST_TAG, ARCHIVE_NAME, release_archive(NEW_BINARY))
        .with_object(LATEST_TAG, CHECKSUM_NAME, "not-a-digest  bt.tar.gz\n");
    let (_, _, fetcher) = fetcher(source);

    let err = fetcher.fetch_verified(&descriptor()).await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedChecksum { .. }));
}

#[tokio::test]
async fn test_missing_artifact_is_not_found() {
    let source = FakeSource::new().with_release(LATEST_TAG);
    let (_, sleeper, fetcher) = fetcher(source);

    let err = fetcher.fetch_verified(&descriptor()).await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound { .. }));
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_transient_download_failure_is_retried() {
    let source = with_artifact(
        FakeSource::new().failing_downloads(vec![HostError::transient("connection reset")]),
        LATEST_TAG,
        NEW_BINARY,
    );
    let (source, sleeper, fetcher) = fetcher(source);

    fetcher.fetch_verified(&descriptor()).await.unwrap();
    assert_eq!(source.download_count(), 3);
    assert_eq!(sleeper.delays().len(), 1);
}

#[tokio::test]
async fn test_persistent_network_failure_exhausts_retries() {
    let failures = (0..6).map(|_| HostError::transient("timed out")).collect();
    let source = with_artifact(
        FakeSource::new().failing_downloads(failures),
        LATEST_TAG,
        NEW_BINARY,
    );
    let (_, sleeper, fetcher) = fetcher(source);

    let err = fetcher.fetch_verified(&descriptor()).await.unwrap_err();
    assert!(matches!(err, FetchError::Network { .. }));
    assert!(!sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_download_rate_limit_names_token_variable() {
    let source = with_artifact(
        FakeSource::new().failing_downloads(vec![
            HostError::RateLimited {
                token_env: "GITHUB_TOKEN".to_string(),
            },
            HostError::RateLimited {
                token_env: "GITHUB_TOKEN".to_string(),
            },
        ]),
        LATEST_TAG,
        NEW_BINARY,
    );
    let (_, _, fetcher) = fetcher(source);

    let err = fetcher.fetch_verified(&descriptor()).await.unwrap_err();
    assert!(matches!(err, FetchError::RateLimited { .. }));
    assert!(err.to_string().contains("GITHUB_TOKEN"));
}
