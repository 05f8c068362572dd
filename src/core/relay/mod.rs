//! Incremental sync: one fetch → diff → throttle → dispatch → persist cycle.
//!
//! The cycle is a single tick meant to be re-run by an external scheduler. It
//! tracks a monotonic watermark (the highest report id seen) across runs and
//! delivers each report at most once: a failed delivery is skipped for good
//! once the watermark moves past it.

mod diff;
mod throttle;

pub use diff::{BatchDiff, advance_watermark, compute_new};
pub use throttle::throttle;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::core::config::RelayConfig;
use crate::core::state::{StateStore, SyncState};

/// Anything carrying a report identifier the sync core can order by.
pub trait Identified {
    fn report_id(&self) -> u64;
}

#[async_trait]
pub trait ReportSource<T>: Send + Sync {
    /// Up to `limit` of the most recent reports, in no particular order.
    async fn fetch(&self, limit: usize) -> Result<Vec<T>>;
}

#[async_trait]
pub trait Dispatcher<T>: Send + Sync {
    /// Delivers one notification. `true` only when delivery is confirmed.
    async fn send(&self, item: &T) -> bool;
}

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub fetch_limit: usize,
    pub first_run_limit: usize,
    /// Pause between consecutive dispatch attempts.
    pub dispatch_delay: Duration,
    /// Backstop for one whole `send`. Dispatchers bound their own network
    /// calls; this must outlast all of them together.
    pub dispatch_timeout: Duration,
    /// `false` for dry runs: the cycle runs but nothing is written back.
    pub persist: bool,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            fetch_limit: 30,
            first_run_limit: 3,
            dispatch_delay: Duration::from_millis(1500),
            dispatch_timeout: Duration::from_secs(95),
            persist: true,
        }
    }
}

impl From<&RelayConfig> for CycleSettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            fetch_limit: config.fetch_limit,
            first_run_limit: config.first_run_limit,
            dispatch_delay: config.dispatch_delay,
            dispatch_timeout: config.dispatch_budget(),
            persist: !config.dry_run,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub attempted: usize,
    /// Reports dropped by the first-run cap.
    pub skipped: usize,
    pub watermark: u64,
    pub total_sent: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The source errored or returned nothing; state left untouched.
    FetchFailed,
    NoNewReports { fetched: usize, watermark: u64 },
    Dispatched(DispatchSummary),
}

pub struct RunController<'a, T> {
    source: &'a dyn ReportSource<T>,
    dispatcher: &'a dyn Dispatcher<T>,
    store: &'a dyn StateStore,
    settings: CycleSettings,
}

impl<'a, T> RunController<'a, T>
where
    T: Identified + Send + Sync,
{
    pub fn new(
        source: &'a dyn ReportSource<T>,
        dispatcher: &'a dyn Dispatcher<T>,
        store: &'a dyn StateStore,
        settings: CycleSettings,
    ) -> Self {
        Self {
            source,
            dispatcher,
            store,
            settings,
        }
    }

    /// Runs one full cycle. Only a failure to persist the final state is
    /// returned as an error; everything else degrades into the outcome.
    pub async fn run_once(&self) -> Result<CycleOutcome> {
        let mut state = self.store.load().await;
        let is_first_run = state.is_first_run();
        if is_first_run {
            info!("[sync] First run detected");
        } else {
            info!("[sync] Last seen id: {}", state.last_seen_id);
        }

        let batch = match self.source.fetch(self.settings.fetch_limit).await {
            Ok(batch) if !batch.is_empty() => batch,
            Ok(_) => {
                warn!("[sync] Source returned no reports, leaving state untouched");
                return Ok(CycleOutcome::FetchFailed);
            }
            Err(e) => {
                error!("[sync] Fetch failed, leaving state untouched: {:#}", e);
                return Ok(CycleOutcome::FetchFailed);
            }
        };
        let fetched = batch.len();

        let BatchDiff { new_items, max_id } = compute_new(batch, state.last_seen_id);
        let watermark = advance_watermark(state.last_seen_id, max_id);

        if new_items.is_empty() {
            info!("[sync] No new reports among {} fetched", fetched);
            state.last_seen_id = watermark;
            state.last_check = Some(Utc::now());
            self.persist(&state).await?;
            return Ok(CycleOutcome::NoNewReports { fetched, watermark });
        }

        info!("[sync] {} new report(s) found", new_items.len());
        let found = new_items.len();
        let to_send = throttle(new_items, is_first_run, self.settings.first_run_limit);
        let skipped = found - to_send.len();

        let sent = self.dispatch_all(&to_send).await;

        state.last_seen_id = watermark;
        state.total_sent += sent as u64;
        state.last_check = Some(Utc::now());
        self.persist(&state).await?;

        Ok(CycleOutcome::Dispatched(DispatchSummary {
            sent,
            attempted: to_send.len(),
            skipped,
            watermark,
            total_sent: state.total_sent,
        }))
    }

    async fn dispatch_all(&self, items: &[T]) -> usize {
        let mut sent = 0;
        for (idx, item) in items.iter().enumerate() {
            let id = item.report_id();
            info!("[sync] Dispatching report #{} ({}/{})", id, idx + 1, items.len());

            let delivered =
                match tokio::time::timeout(self.settings.dispatch_timeout, self.dispatcher.send(item))
                    .await
                {
                    Ok(delivered) => delivered,
                    Err(_) => {
                        warn!(
                            "[sync] Dispatch of report #{} timed out after {:?}",
                            id, self.settings.dispatch_timeout
                        );
                        false
                    }
                };

            if delivered {
                sent += 1;
            } else {
                warn!("[sync] Report #{} was not delivered, moving on", id);
            }

            if idx + 1 < items.len() && !self.settings.dispatch_delay.is_zero() {
                tokio::time::sleep(self.settings.dispatch_delay).await;
            }
        }
        sent
    }

    async fn persist(&self, state: &SyncState) -> Result<()> {
        if !self.settings.persist {
            info!(
                "[sync] Dry run: would save last_seen_id={}, total_sent={}",
                state.last_seen_id, state.total_sent
            );
            return Ok(());
        }
        self.store.save(state).await
    }
}

#[cfg(test)]
mod tests;
