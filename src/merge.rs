//! Reconciling a stored snapshot with a fresh fetch.
//!
//! The merge window is always anchored to the latest fetch: entries keep the
//! fresh fetch's order and fields, pick up any summary already generated for
//! their link, and anything the feed no longer lists is dropped.

use std::collections::{HashMap, HashSet};

use crate::source::FeedEntry;

/// Result of [`merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Entries to persist, in fresh-fetch order, at most `max_items` long.
    pub merged: Vec<FeedEntry>,
    /// Entries whose link was not in the previous snapshot.
    pub needs_summary: Vec<FeedEntry>,
}

/// Merge `fresh` entries over `previous` ones.
///
/// * Entries without a link are skipped; they cannot be matched later.
/// * A link repeated within `fresh` keeps its first occurrence.
/// * A fresh entry without a summary inherits the previous one for its link.
/// * Only entries that survive truncation are reported in `needs_summary`.
pub fn merge(previous: &[FeedEntry], fresh: &[FeedEntry], max_items: usize) -> MergeOutcome {
    let known: HashMap<&str, &FeedEntry> = previous
        .iter()
        .filter_map(|entry| entry.identity().map(|link| (link, entry)))
        .collect();

    let mut seen = HashSet::new();
    let mut outcome = MergeOutcome::default();

    for entry in fresh {
        if outcome.merged.len() >= max_items {
            break;
        }
        let Some(link) = entry.identity() else {
            continue;
        };
        if !seen.insert(link) {
            continue;
        }

        let mut record = entry.clone();
        record.link = link.to_string();

        match known.get(link) {
            Some(prior) => {
                if !record.has_summary() && prior.has_summary() {
                    record.summary = prior.summary.clone();
                }
            }
            None => outcome.needs_summary.push(record.clone()),
        }

        outcome.merged.push(record);
    }

    outcome
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(link: &str) -> FeedEntry {
        FeedEntry {
            link: link.to_string(),
            title: format!("Title {link}"),
            ..FeedEntry::default()
        }
    }

    fn summarized(link: &str, summary: &str) -> FeedEntry {
        FeedEntry {
            summary: Some(summary.to_string()),
            ..entry(link)
        }
    }

    fn links(entries: &[FeedEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.link.as_str()).collect()
    }

    #[test]
    fn keeps_prior_summary_and_flags_new_links() {
        let previous = vec![summarized("a", "S")];
        let fresh = vec![entry("a"), entry("b")];

        let out = merge(&previous, &fresh, 10);

        assert_eq!(links(&out.merged), ["a", "b"]);
        assert_eq!(out.merged[0].summary.as_deref(), Some("S"));
        assert_eq!(out.merged[1].summary, None);
        assert_eq!(links(&out.needs_summary), ["b"]);
    }

    #[test]
    fn truncates_to_max_items_in_fresh_order() {
        let out = merge(&[], &[entry("x"), entry("y")], 1);
        assert_eq!(links(&out.merged), ["x"]);
        assert_eq!(links(&out.needs_summary), ["x"], "truncated entries are not summarized");
    }

    #[test]
    fn drops_entries_without_link() {
        let out = merge(&[], &[entry(""), entry("a"), entry("  ")], 10);
        assert_eq!(links(&out.merged), ["a"]);
        assert_eq!(links(&out.needs_summary), ["a"]);
    }

    #[test]
    fn linkless_entries_do_not_count_toward_truncation() {
        let out = merge(&[], &[entry(""), entry("a"), entry("b")], 2);
        assert_eq!(links(&out.merged), ["a", "b"]);
    }

    #[test]
    fn merging_with_itself_is_idempotent() {
        let snapshot = vec![summarized("a", "S1"), summarized("b", "S2"), entry("c")];
        let out = merge(&snapshot, &snapshot, 10);

        assert_eq!(out.merged, snapshot);
        assert!(out.needs_summary.is_empty());
    }

    #[test]
    fn fresh_fields_win_but_summary_survives() {
        let previous = vec![summarized("a", "S")];
        let mut updated = entry("a");
        updated.title = "Edited headline".into();

        let out = merge(&previous, &[updated], 10);
        assert_eq!(out.merged[0].title, "Edited headline");
        assert_eq!(out.merged[0].summary.as_deref(), Some("S"));
    }

    #[test]
    fn empty_fresh_summary_does_not_erase_prior() {
        let previous = vec![summarized("a", "S")];
        let out = merge(&previous, &[summarized("a", "")], 10);
        assert_eq!(out.merged[0].summary.as_deref(), Some("S"));
    }

    #[test]
    fn previous_only_entries_are_dropped() {
        let previous = vec![summarized("old", "S"), summarized("a", "T")];
        let out = merge(&previous, &[entry("a")], 10);
        assert_eq!(links(&out.merged), ["a"]);
    }

    #[test]
    fn duplicate_links_keep_first_occurrence() {
        let mut second = entry("a");
        second.title = "second".into();
        let out = merge(&[], &[entry("a"), entry("b"), second], 10);

        assert_eq!(links(&out.merged), ["a", "b"]);
        assert_eq!(out.merged[0].title, "Title a");
        assert_eq!(links(&out.needs_summary), ["a", "b"]);
    }

    #[test]
    fn output_is_unique_and_bounded() {
        let fresh: Vec<FeedEntry> = ["a", "b", "a", "", "c", "b", "d", "e"]
            .iter()
            .map(|l| entry(l))
            .collect();

        for max in 0..8 {
            let out = merge(&[], &fresh, max);
            let unique: HashSet<_> = out.merged.iter().map(|e| &e.link).collect();
            assert_eq!(unique.len(), out.merged.len());
            assert_eq!(out.merged.len(), max.min(5));
        }
    }

    #[test]
    fn link_whitespace_is_normalised() {
        let previous = vec![summarized("a", "S")];
        let out = merge(&previous, &[entry(" a ")], 10);
        assert_eq!(out.merged[0].link, "a");
        assert_eq!(out.merged[0].summary.as_deref(), Some("S"));
        assert!(out.needs_summary.is_empty());
    }
}
