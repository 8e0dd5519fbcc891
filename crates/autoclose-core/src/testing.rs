//! In-memory fakes for the ports, shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::{
    config::AutoCloseConfig,
    domain::{ChannelId, Entry, ThreadId},
    errors::Error,
    lifecycle::Lifecycle,
    messaging::port::ThreadNotifier,
    ports::{CloseScheduler, ScheduledClose, Thread, ThreadDirectory},
    store::EntryStore,
    Result,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()
}

#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Vec<Entry>>,
    fail: AtomicBool,
}

impl MemoryStore {
    pub fn with_entries(entries: Vec<Entry>) -> Self {
        Self {
            saved: Mutex::new(entries),
            fail: AtomicBool::new(false),
        }
    }

    pub fn saved(&self) -> Vec<Entry> {
        self.saved.lock().unwrap().clone()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl EntryStore for MemoryStore {
    fn load(&self) -> Result<Vec<Entry>> {
        Ok(self.saved())
    }

    fn save_all(&self, entries: &[Entry]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("disk full")));
        }
        *self.saved.lock().unwrap() = entries.to_vec();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeThreads {
    open: Mutex<HashMap<ChannelId, Thread>>,
    failing: Mutex<HashSet<ChannelId>>,
}

impl FakeThreads {
    pub fn open(&self, channel: &str) -> Thread {
        let thread = Thread {
            id: ThreadId(format!("thread-{channel}")),
            channel_id: ChannelId::new(channel),
        };
        self.open
            .lock()
            .unwrap()
            .insert(thread.channel_id.clone(), thread.clone());
        thread
    }

    pub fn fail_lookup(&self, channel: &str) {
        self.failing.lock().unwrap().insert(ChannelId::new(channel));
    }
}

#[async_trait]
impl ThreadDirectory for FakeThreads {
    async fn find_open_thread_by_channel_id(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Option<Thread>> {
        if self.failing.lock().unwrap().contains(channel_id) {
            return Err(Error::External("ticket database unavailable".to_string()));
        }
        Ok(self.open.lock().unwrap().get(channel_id).cloned())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    posts: Mutex<Vec<(ChannelId, String)>>,
    fail: AtomicBool,
}

impl FakeNotifier {
    pub fn posts(&self) -> Vec<(ChannelId, String)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn posts_for(&self, channel: &str) -> Vec<String> {
        self.posts()
            .into_iter()
            .filter(|(c, _)| c.as_str() == channel)
            .map(|(_, text)| text)
            .collect()
    }

    pub fn clear(&self) {
        self.posts.lock().unwrap().clear();
    }

    pub fn fail_posts(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ThreadNotifier for FakeNotifier {
    async fn post_system_message(&self, thread: &Thread, text: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::External("flood wait".to_string()));
        }
        self.posts
            .lock()
            .unwrap()
            .push((thread.channel_id.clone(), text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCloser {
    closes: Mutex<Vec<ScheduledClose>>,
    fail: AtomicBool,
}

impl FakeCloser {
    pub fn closes(&self) -> Vec<ScheduledClose> {
        self.closes.lock().unwrap().clone()
    }

    pub fn fail_closes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CloseScheduler for FakeCloser {
    async fn schedule_close(&self, close: ScheduledClose) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::External("ticket database unavailable".to_string()));
        }
        self.closes.lock().unwrap().push(close);
        Ok(())
    }
}

/// A lifecycle manager wired to fakes.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub threads: Arc<FakeThreads>,
    pub notifier: Arc<FakeNotifier>,
    pub closer: Arc<FakeCloser>,
    pub lifecycle: Lifecycle,
}

impl Harness {
    pub fn new(cfg: AutoCloseConfig) -> Self {
        Self::with_entries(cfg, Vec::new())
    }

    pub fn with_entries(cfg: AutoCloseConfig, entries: Vec<Entry>) -> Self {
        let store = Arc::new(MemoryStore::with_entries(entries));
        let threads = Arc::new(FakeThreads::default());
        let notifier = Arc::new(FakeNotifier::default());
        let closer = Arc::new(FakeCloser::default());
        let lifecycle = Lifecycle::load(cfg, store.clone(), threads.clone(), notifier.clone())
            .expect("memory store always loads");
        Self {
            store,
            threads,
            notifier,
            closer,
            lifecycle,
        }
    }
}
