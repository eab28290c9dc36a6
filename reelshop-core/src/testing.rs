//! Test doubles for the media pipeline.
//!
//! Compiled into the library so integration tests and downstream crates can
//! drive the cache and scheduler without a network.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reelshop_model::{MediaItem, MediaKind};

use crate::error::MediaError;
use crate::media::{MediaFetcher, MediaPayload};

#[derive(Debug, Default)]
struct Script {
    calls: Vec<String>,
    failing: HashSet<String>,
    latency: HashMap<String, Duration>,
    default_latency: Duration,
    expected_calls: Option<usize>,
}

/// Fetcher that records every call and answers from a script.
///
/// Successful fetches return the URL bytes as the payload. Latency is
/// simulated with `tokio::time::sleep`, so paused-clock tests stay
/// deterministic.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFetcher {
    script: Arc<Mutex<Script>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latency applied to every URL without its own override.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.script.lock().default_latency = latency;
        self
    }

    pub fn set_latency(&self, url: &str, latency: Duration) {
        self.script.lock().latency.insert(url.to_string(), latency);
    }

    /// Make every fetch of `url` fail until [`recover`](Self::recover).
    pub fn fail(&self, url: &str) {
        self.script.lock().failing.insert(url.to_string());
    }

    pub fn recover(&self, url: &str) {
        self.script.lock().failing.remove(url);
    }

    pub fn expect_calls(self, count: usize) -> Self {
        self.script.lock().expected_calls = Some(count);
        self
    }

    /// URLs in the order their fetches started.
    pub fn calls(&self) -> Vec<String> {
        self.script.lock().calls.clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|called| called.as_str() == url)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.script.lock().calls.len()
    }

    pub fn verify(&self) -> Result<(), String> {
        let script = self.script.lock();
        if let Some(expected) = script.expected_calls
            && script.calls.len() != expected
        {
            return Err(format!(
                "Expected {} fetches, got {}: {:?}",
                expected,
                script.calls.len(),
                script.calls
            ));
        }
        Ok(())
    }

    pub fn reset(&self) {
        self.script.lock().calls.clear();
    }
}

#[async_trait]
impl MediaFetcher for ScriptedFetcher {
    async fn fetch(&self, item: &MediaItem) -> Result<MediaPayload, MediaError> {
        let url = item.url().to_string();
        let (latency, fails) = {
            let mut script = self.script.lock();
            script.calls.push(url.clone());
            let latency = script
                .latency
                .get(&url)
                .copied()
                .unwrap_or(script.default_latency);
            (latency, script.failing.contains(&url))
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if fails {
            return Err(MediaError::Network(format!("scripted failure for {url}")));
        }

        let kind = item.kind();
        Ok(MediaPayload {
            bytes: Bytes::from(url.clone().into_bytes()),
            url,
            kind,
            content_type: None,
            dimensions: (kind == MediaKind::Image).then_some((1, 1)),
            partial: kind == MediaKind::Video,
            fetched_at: Instant::now(),
        })
    }
}
