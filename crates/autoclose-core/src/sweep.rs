//! Periodic sweep over tracked entries: warnings, stage advancement and
//! closure hand-off.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::AutoCloseConfig,
    domain::{ChannelId, Entry, Stage, StageEvent},
    formatting::format_close_timestamp,
    lifecycle::Lifecycle,
    messaging::port::{post_notice, ThreadNotifier},
    ports::{CloseScheduler, ScheduledClose, ThreadDirectory},
};

/// Name recorded as the actor of every scheduled close.
pub const CLOSE_ACTOR_NAME: &str = "AutoClose";

/// What one sweep pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub closed: usize,
    pub warned_long: usize,
    pub warned_short: usize,
    pub removed_stale: usize,
    pub skipped_stopped: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn is_quiet(&self) -> bool {
        self.closed + self.warned_long + self.warned_short + self.removed_stale + self.failed == 0
    }
}

/// Action an entry needs at a given instant. First match wins, so an entry
/// moves at most one step per pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Due {
    Close,
    Warn(StageEvent),
}

fn due_at(entry: &Entry, cfg: &AutoCloseConfig, now: DateTime<Utc>) -> Option<Due> {
    if now >= entry.close_at {
        return Some(Due::Close);
    }

    let can = |event| entry.stage.transition(event).is_some();
    if entry.close_at <= now + cfg.short_warning_window() && can(StageEvent::WarnShortDue) {
        return Some(Due::Warn(StageEvent::WarnShortDue));
    }
    if entry.close_at <= now + cfg.long_warning_window() && can(StageEvent::WarnLongDue) {
        return Some(Due::Warn(StageEvent::WarnLongDue));
    }
    None
}

#[derive(Clone)]
pub struct SweepEngine {
    inner: Arc<SweepInner>,
}

struct SweepInner {
    lifecycle: Lifecycle,
    threads: Arc<dyn ThreadDirectory>,
    notifier: Arc<dyn ThreadNotifier>,
    closer: Arc<dyn CloseScheduler>,
    actor_id: String,
    task: Mutex<Option<SweepTask>>,
}

struct SweepTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweepEngine {
    pub fn new(
        lifecycle: Lifecycle,
        threads: Arc<dyn ThreadDirectory>,
        notifier: Arc<dyn ThreadNotifier>,
        closer: Arc<dyn CloseScheduler>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(SweepInner {
                lifecycle,
                threads,
                notifier,
                closer,
                actor_id: actor_id.into(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Spawn the sweep loop: one pass right away, then one per sweep interval.
    ///
    /// Returns `false` if the loop is already running.
    pub async fn start(&self) -> bool {
        let mut task = self.inner.task.lock().await;
        if task.is_some() {
            return false;
        }

        let cfg = self.inner.lifecycle.config();
        let period = cfg.sweep_interval;
        info!(
            "Threads close after {}h with warnings at {}h and {}m; sweeping every {}s",
            cfg.close_hours,
            cfg.warn_hours,
            cfg.warn_minutes,
            period.as_secs()
        );

        let cancel = CancellationToken::new();
        let tok = cancel.clone();
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                  _ = tok.cancelled() => break,
                  _ = tick.tick() => {
                    let report = engine.sweep_at(Utc::now()).await;
                    if !report.is_quiet() {
                      debug!(?report, "Sweep finished");
                    }
                  }
                }
            }
        });

        *task = Some(SweepTask { cancel, handle });
        true
    }

    /// Cancel the sweep loop and wait for it to exit.
    pub async fn stop(&self) {
        let task = self.inner.task.lock().await.take();
        let Some(task) = task else {
            return;
        };
        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            if !e.is_cancelled() {
                error!("Sweep task ended abnormally: {e}");
            }
        }
    }

    /// One pass over every entry, in store order.
    ///
    /// The channel list is snapshotted up front and each entry is handled
    /// under the lifecycle lock, so activity can land between entries but
    /// never in the middle of one.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let channels: Vec<ChannelId> = self
            .inner
            .lifecycle
            .snapshot()
            .await
            .into_iter()
            .map(|e| e.channel_id)
            .collect();

        let mut report = SweepReport::default();
        for channel_id in channels {
            self.process(&channel_id, now, &mut report).await;
        }
        report
    }

    async fn process(&self, channel_id: &ChannelId, now: DateTime<Utc>, report: &mut SweepReport) {
        let inner = &self.inner;
        let mut entries = inner.lifecycle.lock().await;

        let Some(entry) = entries.find(channel_id) else {
            return;
        };
        if entry.stage == Stage::Stopped {
            report.skipped_stopped += 1;
            return;
        }

        let thread = match inner.threads.find_open_thread_by_channel_id(channel_id).await {
            Ok(Some(thread)) => thread,
            Ok(None) => {
                info!("Thread for channel {channel_id} is gone, dropping entry");
                entries.remove(channel_id);
                report.removed_stale += 1;
                return;
            }
            Err(e) => {
                warn!("Thread lookup for channel {channel_id} failed, dropping entry: {e}");
                entries.remove(channel_id);
                report.removed_stale += 1;
                return;
            }
        };

        let cfg = inner.lifecycle.config();
        match due_at(&entry, cfg, now) {
            None => {}
            Some(Due::Close) => {
                let close = ScheduledClose {
                    thread_id: thread.id.clone(),
                    close_at: format_close_timestamp(entry.close_at),
                    actor_id: inner.actor_id.clone(),
                    actor_name: CLOSE_ACTOR_NAME.to_string(),
                };
                match inner.closer.schedule_close(close).await {
                    Ok(()) => {
                        info!("Scheduled close of thread {} (channel {channel_id})", thread.id);
                        entries.remove(channel_id);
                        report.closed += 1;
                    }
                    Err(e) => {
                        // Entry stays; the next pass retries.
                        error!("Failed to schedule close of thread {}: {e}", thread.id);
                        report.failed += 1;
                    }
                }
            }
            Some(Due::Warn(event)) => {
                let Some(next) = entry.stage.transition(event) else {
                    return;
                };
                let text = match event {
                    StageEvent::WarnShortDue => {
                        report.warned_short += 1;
                        format!("This thread will close in {} minutes", cfg.warn_minutes)
                    }
                    _ => {
                        report.warned_long += 1;
                        format!("This thread will close in {} hours", cfg.warn_hours)
                    }
                };
                post_notice(inner.notifier.as_ref(), &thread, &text).await;
                entries.upsert(channel_id, next, None, false, now).await;
            }
        }
    }
}
