use super::Identified;

/// Result of diffing one fetched batch against the stored watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDiff<T> {
    /// Reports strictly above the watermark, oldest first.
    pub new_items: Vec<T>,
    /// Highest identifier in the whole batch, `None` for an empty batch.
    pub max_id: Option<u64>,
}

/// Sorts `batch` ascending by identifier and keeps the reports newer than
/// `last_seen_id`. `max_id` covers the entire batch, already-seen reports included.
pub fn compute_new<T: Identified>(mut batch: Vec<T>, last_seen_id: u64) -> BatchDiff<T> {
    batch.sort_by_key(Identified::report_id);
    let max_id = batch.last().map(Identified::report_id);
    let new_items = batch
        .into_iter()
        .filter(|item| item.report_id() > last_seen_id)
        .collect();
    BatchDiff { new_items, max_id }
}

/// The watermark after a cycle that observed `max_id`. Never moves backwards.
pub fn advance_watermark(last_seen_id: u64, max_id: Option<u64>) -> u64 {
    max_id.map_or(last_seen_id, |max| max.max(last_seen_id))
}
