use tracing::info;

use super::Identified;

/// Caps the first run to the `cap` most recent reports.
///
/// `new_items` must be ascending by identifier, so the tail holds the newest.
/// Dropped reports are logged and never delivered. Outside a first run, or
/// within the cap, the input comes back unchanged.
pub fn throttle<T: Identified>(mut new_items: Vec<T>, is_first_run: bool, cap: usize) -> Vec<T> {
    if !is_first_run || new_items.len() <= cap {
        return new_items;
    }

    let skipped: Vec<T> = new_items.drain(..new_items.len() - cap).collect();
    if let Some(skip_max) = skipped.iter().map(Identified::report_id).max() {
        info!(
            "[sync] First run: delivering only the latest {} report(s), skipped {} older (id <= {})",
            cap,
            skipped.len(),
            skip_max
        );
    }
    new_items
}
