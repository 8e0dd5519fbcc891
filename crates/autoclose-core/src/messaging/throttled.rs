use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{domain::ChannelId, messaging::port::ThreadNotifier, ports::Thread, Result};

const MAX_TRACKED_LIMITERS: usize = 1024;

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* two notifications (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between notifications into the same thread.
    pub per_channel_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_channel_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// ThreadNotifier decorator that rate-limits outbound notifications.
///
/// A sweep that crosses a warning window for many threads at once would
/// otherwise fire a burst of sends and trip the messenger's flood limits.
pub struct ThrottledNotifier {
    inner: Arc<dyn ThreadNotifier>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_channel: Mutex<HashMap<ChannelId, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledNotifier {
    pub fn new(inner: Arc<dyn ThreadNotifier>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_channel: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for(&self, channel_id: &ChannelId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_channel.lock().await;
        if map.len() >= MAX_TRACKED_LIMITERS {
            // Idle limiters carry no state worth keeping.
            let now = Instant::now();
            map.retain(|_, lim| lim.try_lock().map(|l| l.next > now).unwrap_or(true));
        }
        map.entry(channel_id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_channel_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle(&self, channel_id: &ChannelId) {
        let global_wait = { self.global.lock().await.reserve() };
        let channel_wait = {
            let lim = self.limiter_for(channel_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(channel_wait);
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl ThreadNotifier for ThrottledNotifier {
    async fn post_system_message(&self, thread: &Thread, text: &str) -> Result<()> {
        self.throttle(&thread.channel_id).await;
        self.inner.post_system_message(thread, text).await
    }
}
