//! Entry lifecycle manager: the only write path into the entry store.
//!
//! Every mutation persists the full entry list before returning. A failed
//! write is logged and the in-memory list stays authoritative for the rest of
//! the process lifetime.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::{
    config::AutoCloseConfig,
    domain::{ChannelId, Entry, Stage, StageEvent},
    messaging::port::{post_notice, ThreadNotifier},
    ports::ThreadDirectory,
    store::EntryStore,
    Result,
};

/// Soft cap on tracked entries. Open threads bound the list in practice; past
/// this we only warn, since a ticket system that never reports closures would
/// otherwise grow the file silently.
pub const MAX_TRACKED_ENTRIES: usize = 10_000;

pub const RESET_NOTICE: &str = "Reset AutoClose for this thread";

#[derive(Clone)]
pub struct Lifecycle {
    inner: Arc<LifecycleInner>,
}

struct LifecycleInner {
    cfg: AutoCloseConfig,
    store: Arc<dyn EntryStore>,
    threads: Arc<dyn ThreadDirectory>,
    notifier: Arc<dyn ThreadNotifier>,
    entries: Mutex<Vec<Entry>>,
}

impl Lifecycle {
    /// Load persisted entries from `store` and build the manager.
    ///
    /// Fails only when the persisted state cannot be read or parsed.
    pub fn load(
        cfg: AutoCloseConfig,
        store: Arc<dyn EntryStore>,
        threads: Arc<dyn ThreadDirectory>,
        notifier: Arc<dyn ThreadNotifier>,
    ) -> Result<Self> {
        let loaded = store.load()?;
        let total = loaded.len();
        let entries = dedup_by_channel(loaded);
        if entries.len() < total {
            warn!(
                "Dropped {} duplicate entries from persisted state",
                total - entries.len()
            );
        }
        info!("Loaded {} tracked thread(s)", entries.len());

        Ok(Self {
            inner: Arc::new(LifecycleInner {
                cfg,
                store,
                threads,
                notifier,
                entries: Mutex::new(entries),
            }),
        })
    }

    pub fn config(&self) -> &AutoCloseConfig {
        &self.inner.cfg
    }

    /// Exclusive access for a multi-step unit of work.
    pub async fn lock(&self) -> EntriesGuard<'_> {
        EntriesGuard {
            inner: self.inner.as_ref(),
            entries: self.inner.entries.lock().await,
        }
    }

    pub async fn upsert(
        &self,
        channel_id: &ChannelId,
        stage: Stage,
        close_at: Option<DateTime<Utc>>,
        notify_on_reset: bool,
        now: DateTime<Utc>,
    ) -> Entry {
        self.lock()
            .await
            .upsert(channel_id, stage, close_at, notify_on_reset, now)
            .await
    }

    pub async fn restart(&self, channel_id: &ChannelId, now: DateTime<Utc>) -> Entry {
        self.lock().await.restart(channel_id, now)
    }

    pub async fn remove(&self, channel_id: &ChannelId) -> usize {
        self.lock().await.remove(channel_id)
    }

    pub async fn find(&self, channel_id: &ChannelId) -> Option<Entry> {
        self.lock().await.find(channel_id)
    }

    pub async fn snapshot(&self) -> Vec<Entry> {
        self.inner.entries.lock().await.clone()
    }
}

/// Locked view of the entry list.
pub struct EntriesGuard<'a> {
    inner: &'a LifecycleInner,
    entries: MutexGuard<'a, Vec<Entry>>,
}

impl EntriesGuard<'_> {
    pub fn find(&self, channel_id: &ChannelId) -> Option<Entry> {
        self.entries
            .iter()
            .find(|e| &e.channel_id == channel_id)
            .cloned()
    }

    /// Update or create the entry for `channel_id`.
    ///
    /// - Stopped entries are left untouched; only [`restart`](Self::restart)
    ///   reactivates them.
    /// - `close_at: None` keeps the current deadline of an existing entry and
    ///   means "now + close window" for a new one.
    /// - With `notify_on_reset`, a reset that interrupts a running warning
    ///   sequence (previous stage not Active) posts the reset notice first.
    pub async fn upsert(
        &mut self,
        channel_id: &ChannelId,
        stage: Stage,
        close_at: Option<DateTime<Utc>>,
        notify_on_reset: bool,
        now: DateTime<Utc>,
    ) -> Entry {
        let Some(idx) = self.position(channel_id) else {
            let entry = Entry {
                channel_id: channel_id.clone(),
                stage,
                close_at: close_at.unwrap_or(now + self.inner.cfg.close_window()),
            };
            self.push(entry.clone());
            self.persist();
            return entry;
        };

        let previous = self.entries[idx].stage;
        if previous == Stage::Stopped {
            self.persist();
            return self.entries[idx].clone();
        }

        if notify_on_reset && previous != Stage::Active {
            self.post_reset_notice(channel_id).await;
        }

        let entry = &mut self.entries[idx];
        entry.stage = stage;
        if let Some(at) = close_at {
            entry.close_at = at;
        }
        let out = entry.clone();
        self.persist();
        out
    }

    /// Force the entry back to Active with a fresh deadline, even when
    /// stopped. Creates the entry if missing.
    pub fn restart(&mut self, channel_id: &ChannelId, now: DateTime<Utc>) -> Entry {
        let close_at = now + self.inner.cfg.close_window();
        let out = match self.position(channel_id) {
            Some(idx) => {
                let entry = &mut self.entries[idx];
                entry.stage = entry
                    .stage
                    .transition(StageEvent::Start)
                    .unwrap_or(Stage::Active);
                entry.close_at = close_at;
                entry.clone()
            }
            None => {
                let entry = Entry {
                    channel_id: channel_id.clone(),
                    stage: Stage::Active,
                    close_at,
                };
                self.push(entry.clone());
                entry
            }
        };
        self.persist();
        out
    }

    /// Remove every entry for `channel_id`. Returns how many were removed.
    pub fn remove(&mut self, channel_id: &ChannelId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| &e.channel_id != channel_id);
        let removed = before - self.entries.len();
        self.persist();
        removed
    }

    fn position(&self, channel_id: &ChannelId) -> Option<usize> {
        self.entries.iter().position(|e| &e.channel_id == channel_id)
    }

    fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
        if self.entries.len() > MAX_TRACKED_ENTRIES {
            warn!(
                "Tracking {} threads (soft limit {MAX_TRACKED_ENTRIES}); is the ticket system reporting closures?",
                self.entries.len()
            );
        }
    }

    async fn post_reset_notice(&self, channel_id: &ChannelId) {
        match self
            .inner
            .threads
            .find_open_thread_by_channel_id(channel_id)
            .await
        {
            Ok(Some(thread)) => {
                post_notice(self.inner.notifier.as_ref(), &thread, RESET_NOTICE).await;
            }
            Ok(None) => {}
            Err(e) => warn!("Thread lookup for channel {channel_id} failed: {e}"),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.inner.store.save_all(&self.entries) {
            error!(
                "Failed to persist {} tracked thread(s), continuing in memory only: {e}",
                self.entries.len()
            );
        }
    }
}

fn dedup_by_channel(entries: Vec<Entry>) -> Vec<Entry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.channel_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{t0, Harness};
    use chrono::Duration;

    fn ch(id: &str) -> ChannelId {
        ChannelId::new(id)
    }

    #[tokio::test]
    async fn find_after_upsert_returns_written_fields() {
        let h = Harness::new(AutoCloseConfig::default());
        let now = t0();

        let created = h
            .lifecycle
            .upsert(&ch("1"), Stage::Active, None, false, now)
            .await;
        assert_eq!(created.close_at, now + Duration::hours(24));
        assert_eq!(h.lifecycle.find(&ch("1")).await, Some(created.clone()));

        let later = now + Duration::hours(3);
        let updated = h
            .lifecycle
            .upsert(&ch("1"), Stage::WarnLong, Some(later), false, now)
            .await;
        assert_eq!(updated.stage, Stage::WarnLong);
        assert_eq!(updated.close_at, later);
        assert_eq!(h.lifecycle.find(&ch("1")).await, Some(updated));
        assert_eq!(h.store.saved().len(), 1);
    }

    #[tokio::test]
    async fn oversized_close_hours_use_default_deadline() {
        let cfg = AutoCloseConfig::from_lookup(|key| {
            (key == "AUTOCLOSE_CLOSE_HOURS").then(|| "10000000000".to_string())
        });
        let h = Harness::new(cfg);
        let now = t0();

        let created = h
            .lifecycle
            .upsert(&ch("1"), Stage::Active, None, false, now)
            .await;
        assert_eq!(created.close_at, now + Duration::hours(24));

        let restarted = h.lifecycle.restart(&ch("1"), now + Duration::hours(1)).await;
        assert_eq!(restarted.close_at, now + Duration::hours(25));
    }

    #[tokio::test]
    async fn upsert_without_deadline_keeps_existing_one() {
        let h = Harness::new(AutoCloseConfig::default());
        let now = t0();
        let created = h
            .lifecycle
            .upsert(&ch("1"), Stage::Active, None, false, now)
            .await;

        let advanced = h
            .lifecycle
            .upsert(&ch("1"), Stage::WarnShort, None, false, now + Duration::hours(20))
            .await;
        assert_eq!(advanced.close_at, created.close_at);
        assert_eq!(advanced.stage, Stage::WarnShort);
    }

    #[tokio::test]
    async fn upsert_on_stopped_entry_is_a_noop() {
        let h = Harness::new(AutoCloseConfig::default());
        h.threads.open("1");
        let now = t0();
        let stopped = h
            .lifecycle
            .upsert(&ch("1"), Stage::Stopped, None, false, now)
            .await;

        let after = h
            .lifecycle
            .upsert(
                &ch("1"),
                Stage::Active,
                Some(now + Duration::hours(48)),
                true,
                now + Duration::hours(1),
            )
            .await;

        assert_eq!(after, stopped);
        assert_eq!(h.lifecycle.find(&ch("1")).await, Some(stopped.clone()));
        assert_eq!(h.store.saved(), vec![stopped]);
        assert!(h.notifier.posts().is_empty());
    }

    #[tokio::test]
    async fn repeated_upsert_is_idempotent() {
        let h = Harness::new(AutoCloseConfig::default());
        let now = t0();
        h.lifecycle
            .upsert(&ch("1"), Stage::Active, None, false, now)
            .await;

        h.lifecycle
            .upsert(&ch("1"), Stage::WarnLong, None, false, now)
            .await;
        let first = h.store.saved();
        h.lifecycle
            .upsert(&ch("1"), Stage::WarnLong, None, false, now)
            .await;
        assert_eq!(h.store.saved(), first);
    }

    #[tokio::test]
    async fn reset_of_active_entry_is_silent() {
        let h = Harness::new(AutoCloseConfig::default());
        h.threads.open("1");
        let now = t0();
        h.lifecycle
            .upsert(&ch("1"), Stage::Active, None, false, now)
            .await;

        let reset = h
            .lifecycle
            .upsert(
                &ch("1"),
                Stage::Active,
                Some(now + Duration::hours(25)),
                true,
                now + Duration::hours(1),
            )
            .await;

        assert_eq!(reset.close_at, now + Duration::hours(25));
        assert!(h.notifier.posts().is_empty());
    }

    #[tokio::test]
    async fn reset_during_warning_posts_one_notice() {
        for stage in [Stage::WarnLong, Stage::WarnShort] {
            let h = Harness::new(AutoCloseConfig::default());
            h.threads.open("1");
            let now = t0();
            h.lifecycle.upsert(&ch("1"), stage, None, false, now).await;

            let reset = h
                .lifecycle
                .upsert(&ch("1"), Stage::Active, Some(now + Duration::hours(24)), true, now)
                .await;

            assert_eq!(reset.stage, Stage::Active);
            let posts = h.notifier.posts_for("1");
            assert_eq!(posts.len(), 1, "stage {stage:?}");
            assert!(posts[0].ends_with(RESET_NOTICE));
        }
    }

    #[tokio::test]
    async fn restart_reactivates_stopped_entry() {
        let h = Harness::new(AutoCloseConfig::default());
        let now = t0();
        h.lifecycle
            .upsert(&ch("1"), Stage::Stopped, None, false, now)
            .await;

        let later = now + Duration::hours(30);
        let restarted = h.lifecycle.restart(&ch("1"), later).await;
        assert_eq!(restarted.stage, Stage::Active);
        assert_eq!(restarted.close_at, later + Duration::hours(24));

        let fresh = h.lifecycle.restart(&ch("2"), later).await;
        assert_eq!(fresh.stage, Stage::Active);
        assert_eq!(h.store.saved().len(), 2);
    }

    #[tokio::test]
    async fn duplicates_collapse_at_load_and_remove_clears_all() {
        let now = t0();
        let dup = |stage| Entry {
            channel_id: ch("1"),
            stage,
            close_at: now,
        };
        let h = Harness::with_entries(
            AutoCloseConfig::default(),
            vec![dup(Stage::WarnLong), dup(Stage::Active), dup(Stage::Stopped)],
        );

        let entries = h.lifecycle.snapshot().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].stage, Stage::WarnLong);

        assert_eq!(h.lifecycle.remove(&ch("1")).await, 1);
        assert_eq!(h.lifecycle.remove(&ch("1")).await, 0);
        assert!(h.store.saved().is_empty());
    }

    #[tokio::test]
    async fn failed_persist_keeps_memory_state() {
        let h = Harness::new(AutoCloseConfig::default());
        h.store.fail_saves(true);
        let now = t0();

        let entry = h
            .lifecycle
            .upsert(&ch("1"), Stage::Active, None, false, now)
            .await;
        assert_eq!(h.lifecycle.find(&ch("1")).await, Some(entry));
        assert!(h.store.saved().is_empty());
    }
}
