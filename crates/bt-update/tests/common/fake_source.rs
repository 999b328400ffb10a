//! In-memory release source
//!
//! Holds releases, tag aliases and downloadable objects, counts every call
//! and can be scripted to fail.

#![allow(dead_code)]

use async_trait::async_trait;
use bt_update::{HostError, Release, ReleaseSource};
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct FakeSource {
    releases: Vec<Release>,
    aliases: HashMap<String, String>,
    objects: HashMap<(String, String), Bytes>,
    list_failures: Mutex<VecDeque<HostError>>,
    download_failures: Mutex<VecDeque<HostError>>,
    download_delay: Option<Duration>,
    downloads: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a regular release
    pub fn with_release(self, tag: &str) -> Self {
        self.push_release(tag, false, false)
    }

    /// Publish a release flagged as prerelease (all canaries are)
    pub fn with_prerelease(self, tag: &str) -> Self {
        self.push_release(tag, true, false)
    }

    pub fn with_draft(self, tag: &str) -> Self {
        self.push_release(tag, false, true)
    }

    /// Point a tag alias at a commit
    pub fn with_alias(mut self, alias: &str, commit: &str) -> Self {
        self.aliases.insert(alias.to_string(), commit.to_string());
        self
    }

    /// Attach a downloadable object to a release
    pub fn with_object(mut self, tag: &str, name: &str, bytes: impl Into<Bytes>) -> Self {
        self.objects
            .insert((tag.to_string(), name.to_string()), bytes.into());
        self
    }

    /// Fail the next listing calls with these errors, in order
    pub fn failing_list(self, errors: Vec<HostError>) -> Self {
        if let Ok(mut queue) = self.list_failures.lock() {
            queue.extend(errors);
        }
        self
    }

    /// Fail the next download calls with these errors, in order
    pub fn failing_downloads(self, errors: Vec<HostError>) -> Self {
        if let Ok(mut queue) = self.download_failures.lock() {
            queue.extend(errors);
        }
        self
    }

    /// Make every download take this long
    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    /// Number of download calls, including failed ones
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Every call made, as `method:argument`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push_release(mut self, tag: &str, prerelease: bool, draft: bool) -> Self {
        self.releases.push(Release {
            tag_name: tag.to_string(),
            name: Some(tag.to_string()),
            prerelease,
            draft,
            published_at: None,
        });
        self
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ReleaseSource for FakeSource {
    async fn list_releases(&self) -> Result<Vec<Release>, HostError> {
        self.record("list_releases".to_string());
        let scripted = self.list_failures.lock().unwrap().pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }
        Ok(self.releases.iter().rev().cloned().collect())
    }

    async fn get_release(&self, tag: &str) -> Result<Release, HostError> {
        self.record(format!("get_release:{}", tag));
        self.releases
            .iter()
            .find(|r| r.tag_name == tag)
            .cloned()
            .ok_or_else(|| HostError::not_found(format!("release {}", tag)))
    }

    async fn resolve_tag(&self, tag: &str) -> Result<String, HostError> {
        self.record(format!("resolve_tag:{}", tag));
        self.aliases
            .get(tag)
            .cloned()
            .ok_or_else(|| HostError::not_found(format!("tag {}", tag)))
    }

    async fn download(&self, tag: &str, name: &str) -> Result<Bytes, HostError> {
        self.record(format!("download:{}/{}", tag, name));
        self.downloads.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.download_failures.lock().unwrap().pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }

        self.objects
            .get(&(tag.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| HostError::not_found(format!("{} in {}", name, tag)))
    }
}
