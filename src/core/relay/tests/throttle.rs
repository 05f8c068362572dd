//! Tests for the first-run cap.

use super::{ids, items};
use crate::core::relay::throttle;

#[test]
fn first_run_keeps_most_recent_within_cap() {
    let out = throttle(items(&[10, 11, 12, 13, 14]), true, 3);
    assert_eq!(ids(&out), vec![12, 13, 14]);
}

#[test]
fn steady_state_is_never_trimmed() {
    let out = throttle(items(&[10, 11, 12, 13, 14]), false, 3);
    assert_eq!(ids(&out), vec![10, 11, 12, 13, 14]);
}

#[test]
fn first_run_within_cap_is_unchanged() {
    assert_eq!(ids(&throttle(items(&[1, 2, 3]), true, 3)), vec![1, 2, 3]);
    assert_eq!(ids(&throttle(items(&[1]), true, 3)), vec![1]);
    assert!(throttle(items(&[]), true, 3).is_empty());
}

#[test]
fn zero_cap_drops_everything_on_first_run() {
    assert!(throttle(items(&[1, 2]), true, 0).is_empty());
}
