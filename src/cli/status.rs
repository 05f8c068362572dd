use anyhow::Result;

use crate::core::config::RelayConfig;
use crate::core::state::{JsonStateStore, RunLock, StateStore};
use crate::core::terminal::{GuideSection, print_info, print_success, print_warn};

pub async fn show_status(config: &RelayConfig) -> Result<()> {
    let store = JsonStateStore::new(&config.state_file);
    let exists = store.path().exists();
    let state = store.load().await;

    let last_seen = if state.is_first_run() {
        "none yet (next run is a first run)".to_string()
    } else {
        format!("#{}", state.last_seen_id)
    };
    let last_check = state
        .last_check
        .map(|t| t.format("%d %b %Y, %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    GuideSection::new("Sync State")
        .status("State file", &store.path().display().to_string())
        .status("Last seen", &last_seen)
        .status("Total sent", &state.total_sent.to_string())
        .status("Last check", &last_check)
        .print();

    if !exists {
        print_info("No state file yet; it is created after the first successful fetch.");
    }
    if RunLock::is_held(config.lock_path()) {
        print_warn(&format!(
            "A run is in progress (lock held at {})",
            config.lock_path().display()
        ));
    }
    Ok(())
}

pub async fn reset_state(config: &RelayConfig) -> Result<()> {
    let store = JsonStateStore::new(&config.state_file);
    if store.clear().await? {
        print_success(&format!("Removed {}", store.path().display()));
    } else {
        print_info("Nothing to reset; no state file found.");
    }
    Ok(())
}
