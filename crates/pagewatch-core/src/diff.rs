//! Change detection
//!
//! Reports the items of a fresh observation that were not present in the
//! previous snapshot, by exact fingerprint equality.

use std::collections::HashSet;

use crate::fingerprint::{fingerprint, Fingerprint};
use crate::models::Item;

/// Return the items of `current` whose fingerprint does not appear in `previous`
///
/// Order of `current` is preserved. Duplicates within `current` are not
/// collapsed: each occurrence is compared against `previous` on its own.
pub fn diff(previous: &[Item], current: &[Item]) -> Vec<Item> {
    let seen: HashSet<Fingerprint> = previous.iter().map(fingerprint).collect();

    current
        .iter()
        .filter(|item| !seen.contains(&fingerprint(item)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q1() -> Item {
        Item::new("Q1 results", "https://acme.com/q1", "2024-01-10")
    }

    fn ceo() -> Item {
        Item::new("New CEO", "https://acme.com/ceo", "2024-02-01")
    }

    #[test]
    fn test_diff_reports_only_new_items() {
        let previous = vec![q1()];
        let current = vec![q1(), ceo()];
        assert_eq!(diff(&previous, &current), vec![ceo()]);
    }

    #[test]
    fn test_diff_of_snapshot_with_itself_is_empty() {
        let snapshot = vec![q1(), ceo(), Item::undated("About", "https://acme.com/about")];
        assert!(diff(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn test_first_run_reports_everything_in_order() {
        let current = vec![ceo(), q1()];
        assert_eq!(diff(&[], &current), current);
    }

    #[test]
    fn test_empty_current_is_empty_result() {
        assert!(diff(&[q1()], &[]).is_empty());
    }

    #[test]
    fn test_duplicates_in_current_are_all_reported() {
        let current = vec![ceo(), q1(), ceo()];
        assert_eq!(diff(&[q1()], &current), vec![ceo(), ceo()]);
    }

    #[test]
    fn test_near_duplicate_is_new() {
        let mut moved = q1();
        moved.link = "https://acme.com/investors/q1".to_string();
        assert_eq!(diff(&[q1()], &[moved.clone()]), vec![moved]);
    }

    #[test]
    fn test_removed_items_are_not_reported() {
        assert!(diff(&[q1(), ceo()], &[ceo()]).is_empty());
    }
}
