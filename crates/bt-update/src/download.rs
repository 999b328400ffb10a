//! Artifact download with retry and checksum verification
//!
//! Archives and their `.sha256` siblings are downloaded concurrently, each
//! under the configured `download` retry policy. Bytes only leave this module
//! wrapped in a `VerifiedArtifact`, which can only be built from a matching
//! digest.

use bt_core::retry::{Sleeper, TokioSleeper};
use bt_core::types::{ChecksumAlgorithm, RetryPolicy};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

use crate::channel::ReleaseIdentifier;
use crate::error::FetchError;
use crate::platform::{ArchiveFormat, ArtifactDescriptor};
use crate::releases::{with_retry, ReleaseSource};

/// Archive bytes whose digest matched the published checksum
#[derive(Debug, Clone)]
pub struct VerifiedArtifact {
    descriptor: ArtifactDescriptor,
    bytes: Bytes,
    digest: String,
}

impl VerifiedArtifact {
    pub fn descriptor(&self) -> &ArtifactDescriptor {
        &self.descriptor
    }

    pub fn release(&self) -> &ReleaseIdentifier {
        &self.descriptor.release
    }

    pub fn format(&self) -> ArchiveFormat {
        self.descriptor.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex digest
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Downloads release objects
pub struct Fetcher {
    source: Arc<dyn ReleaseSource>,
    policy: RetryPolicy,
    algorithm: ChecksumAlgorithm,
    sleeper: Arc<dyn Sleeper>,
}

impl Fetcher {
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        policy: RetryPolicy,
        algorithm: ChecksumAlgorithm,
    ) -> Self {
        Self {
            source,
            policy,
            algorithm,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the backoff sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Download one object attached to a release
    pub async fn fetch(
        &self,
        object_name: &str,
        release: &ReleaseIdentifier,
    ) -> Result<Bytes, FetchError> {
        let bytes = with_retry("download", &self.policy, &self.sleeper, || {
            self.source.download(release.as_str(), object_name)
        })
        .await
        .map_err(|e| FetchError::from_host(e, object_name, release.as_str()))?;

        debug!("Downloaded {} ({} bytes)", object_name, bytes.len());
        Ok(bytes)
    }

    /// Download a checksum object and return the expected digest
    pub async fn fetch_checksum(
        &self,
        object_name: &str,
        release: &ReleaseIdentifier,
    ) -> Result<String, FetchError> {
        let bytes = self.fetch(object_name, release).await?;
        let text = String::from_utf8_lossy(&bytes);
        parse_checksum(&text, self.algorithm).map_err(|reason| FetchError::MalformedChecksum {
            object: object_name.to_string(),
            reason,
        })
    }

    /// Download the archive and its checksum together
    pub async fn fetch_pair(
        &self,
        descriptor: &ArtifactDescriptor,
    ) -> Result<(Bytes, String), FetchError> {
        info!(
            "Downloading {} from release {}",
            descriptor.archive_name, descriptor.release
        );
        tokio::try_join!(
            self.fetch(&descriptor.archive_name, &descriptor.release),
            self.fetch_checksum(&descriptor.checksum_name, &descriptor.release),
        )
    }

    /// Check downloaded bytes against the expected digest
    pub fn verify(
        &self,
        descriptor: &ArtifactDescriptor,
        bytes: Bytes,
        expected: &str,
    ) -> Result<VerifiedArtifact, FetchError> {
        let actual = sha256_hex(&bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(FetchError::Integrity {
                object: descriptor.archive_name.clone(),
                expected: expected.to_lowercase(),
                actual,
            });
        }

        info!("Checksum verified for {}", descriptor.archive_name);
        Ok(VerifiedArtifact {
            descriptor: descriptor.clone(),
            bytes,
            digest: actual,
        })
    }

    /// Download the archive and checksum, then verify
    pub async fn fetch_verified(
        &self,
        descriptor: &ArtifactDescriptor,
    ) -> Result<VerifiedArtifact, FetchError> {
        let (bytes, expected) = self.fetch_pair(descriptor).await?;
        self.verify(descriptor, bytes, &expected)
    }
}

/// Extract the digest from a `sha256sum`-style checksum file
///
/// The first whitespace-separated token is the digest; anything after it
/// (usually the file name) is ignored.
pub fn parse_checksum(text: &str, algorithm: ChecksumAlgorithm) -> Result<String, String> {
    let token = text
        .split_whitespace()
        .next()
        .ok_or_else(|| "file is empty".to_string())?;

    if token.len() != algorithm.hex_len() {
        return Err(format!(
            "expected {} hex characters, found {}",
            algorithm.hex_len(),
            token.len()
        ));
    }
    if !token.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("digest is not hexadecimal".to_string());
    }

    Ok(token.to_lowercase())
}

/// Lowercase hex SHA256 of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
