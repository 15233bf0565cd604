use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::WebhookConfig;
use crate::types::{Snapshot, Status};
use super::SnapshotSink;

/// Posts anomaly snapshots to an HTTP endpoint. Normal ticks are not sent;
/// repeats of the same label set are suppressed within the dedup window and
/// the overall send rate is capped.
pub struct WebhookSink {
    url: String,
    headers: HashMap<String, String>,
    client: reqwest::Client,
    gate: NotificationGate,
}

impl WebhookSink {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        Ok(Self {
            url: config.url.clone(),
            headers: config.headers.clone(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?,
            gate: NotificationGate::new(
                Duration::from_secs(config.dedup_window_secs),
                config.rate_limit_per_minute,
            ),
        })
    }
}

#[async_trait]
impl SnapshotSink for WebhookSink {
    fn name(&self) -> &str { "webhook" }

    async fn publish(&mut self, snapshot: &Snapshot) -> Result<()> {
        if !self.gate.admit(snapshot, Instant::now()) {
            return Ok(());
        }

        let labels: Vec<&str> = snapshot.labels.iter().map(|l| l.as_str()).collect();
        let payload = json!({
            "machine_id": &snapshot.machine.machine_id,
            "location": &snapshot.machine.location,
            "tick": snapshot.tick,
            "status": snapshot.status.to_string(),
            "labels": labels,
            "reading": &snapshot.reading,
            "flags": &snapshot.flags,
            "probabilities": &snapshot.probabilities,
            "timestamp": snapshot.reading.timestamp.to_rfc3339(),
        });

        let mut req = self.client.post(&self.url).json(&payload);
        for (k, v) in &self.headers {
            req = req.header(k, v);
        }

        req.send().await?.error_for_status()?;
        Ok(())
    }
}

/// Deduplication and rate limiting for outbound notifications
struct NotificationGate {
    dedup_window: Duration,
    last_sent: HashMap<String, Instant>,
    rate_limiter: RateLimiter,
}

impl NotificationGate {
    fn new(dedup_window: Duration, per_minute: u32) -> Self {
        Self {
            dedup_window,
            last_sent: HashMap::new(),
            rate_limiter: RateLimiter::new(per_minute),
        }
    }

    fn admit(&mut self, snapshot: &Snapshot, now: Instant) -> bool {
        if snapshot.status == Status::Normal {
            return false;
        }

        let key = snapshot
            .labels
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join("|");

        if let Some(last) = self.last_sent.get(&key) {
            if now.duration_since(*last) < self.dedup_window {
                tracing::debug!(labels = %key, "Notification deduplicated");
                return false;
            }
        }

        if !self.rate_limiter.try_acquire(now) {
            tracing::warn!(labels = %key, "Notification rate limited");
            return false;
        }

        self.last_sent.insert(key, now);
        true
    }
}

struct RateLimiter {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64,
    last_refill: Option<Instant>,
}

impl RateLimiter {
    fn new(per_minute: u32) -> Self {
        Self {
            tokens: per_minute as f64,
            max_tokens: per_minute as f64,
            refill_rate: per_minute as f64 / 60.0,
            last_refill: None,
        }
    }

    fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_refill {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        }
        self.last_refill = Some(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
