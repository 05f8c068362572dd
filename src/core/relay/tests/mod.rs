mod cycle;
mod throttle;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::relay::{Dispatcher, Identified, ReportSource};
use crate::core::state::{StateStore, SyncState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Item(pub u64);

impl Identified for Item {
    fn report_id(&self) -> u64 {
        self.0
    }
}

pub(super) fn ids(items: &[Item]) -> Vec<u64> {
    items.iter().map(|i| i.0).collect()
}

pub(super) fn items(ids: &[u64]) -> Vec<Item> {
    ids.iter().copied().map(Item).collect()
}

/// Source returning a fixed batch, or an error when `fail` is set.
pub(super) struct FixedSource {
    pub batch: Vec<Item>,
    pub fail: bool,
    pub requested_limit: Mutex<Option<usize>>,
}

impl FixedSource {
    pub fn new(ids: &[u64]) -> Self {
        Self {
            batch: items(ids),
            fail: false,
            requested_limit: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            batch: Vec::new(),
            fail: true,
            requested_limit: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ReportSource<Item> for FixedSource {
    async fn fetch(&self, limit: usize) -> Result<Vec<Item>> {
        *self.requested_limit.lock().unwrap() = Some(limit);
        if self.fail {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.batch.clone())
    }
}

/// Records every attempt; fails for ids listed in `failing`.
#[derive(Default)]
pub(super) struct RecordingDispatcher {
    pub failing: HashSet<u64>,
    pub attempts: Mutex<Vec<u64>>,
}

impl RecordingDispatcher {
    pub fn failing_on(ids: &[u64]) -> Self {
        Self {
            failing: ids.iter().copied().collect(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<u64> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher<Item> for RecordingDispatcher {
    async fn send(&self, item: &Item) -> bool {
        self.attempts.lock().unwrap().push(item.0);
        !self.failing.contains(&item.0)
    }
}

/// In-memory store counting writes.
#[derive(Default)]
pub(super) struct MemoryStore {
    pub state: Mutex<Option<SyncState>>,
    pub saves: AtomicUsize,
}

impl MemoryStore {
    pub fn with(last_seen_id: u64, total_sent: u64) -> Self {
        Self {
            state: Mutex::new(Some(SyncState {
                last_seen_id,
                total_sent,
                last_check: None,
            })),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn current(&self) -> SyncState {
        self.state.lock().unwrap().clone().unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> SyncState {
        self.current()
    }

    async fn save(&self, state: &SyncState) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.state.lock().unwrap() = Some(state.clone());
        Ok(())
    }
}
