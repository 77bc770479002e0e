//! Dedup window — recently delivered message ids with a fixed TTL.
//!
//! Gateways redeliver webhooks on timeouts, so each message id is remembered
//! for `ttl` after first sight. Expired ids are swept lazily on every
//! registration and periodically by [`DedupSweeper`], so the map stays
//! bounded even when traffic stops.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::subsystems::runtime::{Component, ComponentFuture};

#[derive(Debug)]
pub struct DedupWindow {
    ttl: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl DedupWindow {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, seen: Mutex::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        // Entries are plain timestamps; a poisoned map is still consistent.
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record `id` and return `true` if it was not seen within the TTL.
    /// A duplicate does not extend the original expiry.
    pub fn register(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut seen = self.lock();
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);
        if seen.contains_key(id) {
            return false;
        }
        seen.insert(id.to_string(), now);
        true
    }

    /// Drop expired ids; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut seen = self.lock();
        let before = seen.len();
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);
        before - seen.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodic cleanup task for a shared [`DedupWindow`].
pub struct DedupSweeper {
    id: String,
    window: Arc<DedupWindow>,
}

impl DedupSweeper {
    pub fn new(id: impl Into<String>, window: Arc<DedupWindow>) -> Self {
        Self { id: id.into(), window }
    }
}

impl Component for DedupSweeper {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(async move {
            let mut tick = tokio::time::interval(self.window.ttl());
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        info!(component = %self.id, "dedup sweeper stopping");
                        return Ok(());
                    }
                    _ = tick.tick() => {
                        let removed = self.window.sweep();
                        if removed > 0 {
                            debug!(component = %self.id, removed, remaining = self.window.len(), "dedup sweep");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn duplicate_within_ttl_is_rejected() {
        let w = DedupWindow::new(Duration::from_secs(60));
        assert!(w.register("msg-1"));
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!w.register("msg-1"));
        assert!(w.register("msg-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn id_is_new_again_after_ttl() {
        let w = DedupWindow::new(Duration::from_secs(60));
        assert!(w.register("msg-1"));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(w.register("msg-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_does_not_extend_expiry() {
        let w = DedupWindow::new(Duration::from_secs(60));
        assert!(w.register("msg-1"));
        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(!w.register("msg-1"));
        tokio::time::advance(Duration::from_secs(21)).await;
        assert!(w.register("msg-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_expired() {
        let w = DedupWindow::new(Duration::from_secs(60));
        w.register("old");
        tokio::time::advance(Duration::from_secs(30)).await;
        w.register("young");
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(w.sweep(), 1);
        assert_eq!(w.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_empties_window_and_stops_on_shutdown() {
        let w = Arc::new(DedupWindow::new(Duration::from_secs(60)));
        w.register("a");
        w.register("b");

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Box::new(DedupSweeper::new("dedup", w.clone())).run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(121)).await;
        assert!(w.is_empty());

        shutdown.cancel();
        assert!(task.await.unwrap().is_ok());
    }
}
