use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::core::config::RelayConfig;
use crate::core::relay::{CycleOutcome, CycleSettings, Dispatcher, RunController};
use crate::core::report::Report;
use crate::core::report::format::{DIVIDER, MessageFormatter};
use crate::core::state::{JsonStateStore, RunLock};
use crate::interfaces::iceout::{IceoutClient, MediaDownloader};
use crate::interfaces::telegram::TelegramDispatcher;

/// Stands in for Telegram on `--dry-run`: prints what would be posted.
struct PreviewDispatcher {
    formatter: MessageFormatter,
}

#[async_trait]
impl Dispatcher<Report> for PreviewDispatcher {
    async fn send(&self, report: &Report) -> bool {
        println!("{}\n{}", self.formatter.format(report), DIVIDER);
        if let Some(url) = report.photo_url() {
            println!("(photo: {})\n", url);
        }
        true
    }
}

/// One fetch → dispatch → persist cycle, as configured.
pub async fn run_cycle(config: &RelayConfig) -> Result<()> {
    // Credentials are checked before anything touches the network or the state.
    let credentials = if config.dry_run {
        None
    } else {
        Some(config.telegram()?)
    };

    let _lock = if config.use_lock {
        match RunLock::acquire(config.lock_path())? {
            Some(lock) => {
                debug!("[relay] Holding run lock {}", lock.path().display());
                Some(lock)
            }
            None => {
                warn!(
                    "[relay] Another run holds {}, skipping this tick",
                    config.lock_path().display()
                );
                return Ok(());
            }
        }
    } else {
        None
    };

    info!("[relay] Starting sync cycle");
    let store = JsonStateStore::new(&config.state_file);
    let source = IceoutClient::new(&config.site_url, config.fetch_timeout)?;
    let formatter = MessageFormatter::new(&config.report_url_template, config.source_label());
    let settings = CycleSettings::from(config);

    let outcome = match credentials {
        Some(credentials) => {
            let media = MediaDownloader::new(config.media_timeout)?;
            let dispatcher =
                TelegramDispatcher::new(&credentials, formatter, media, config.dispatch_timeout)?;
            RunController::<Report>::new(&source, &dispatcher, &store, settings)
                .run_once()
                .await?
        }
        None => {
            info!("[relay] Dry run: messages are printed, nothing is sent or saved");
            let dispatcher = PreviewDispatcher { formatter };
            RunController::<Report>::new(&source, &dispatcher, &store, settings)
                .run_once()
                .await?
        }
    };

    log_summary(&outcome);
    Ok(())
}

fn log_summary(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::FetchFailed => {
            info!("[relay] No reports fetched, will retry on the next tick");
        }
        CycleOutcome::NoNewReports { fetched, watermark } => {
            info!(
                "[relay] Nothing new in {} reports, last seen id {}",
                fetched, watermark
            );
        }
        CycleOutcome::Dispatched(summary) => {
            info!(
                "[relay] Summary: {}/{} reports sent, {} skipped by first-run cap",
                summary.sent, summary.attempted, summary.skipped
            );
            info!(
                "[relay] Total sent: {}, last seen id: {}",
                summary.total_sent, summary.watermark
            );
        }
    }
}
