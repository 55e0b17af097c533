// src/dedup.rs
// Feed de-duplication against prior work. The live-link set itself comes
// from `Store::feed_origin_links` (drafts ∪ published, provenance `feed`);
// this module owns the selection rule on top of it.

use std::collections::HashSet;

use crate::error::PipelineError;
use crate::fetch::feed::CandidateItem;
use crate::store::Store;

/// Snapshot of the live-link set, computed once per run before any
/// generation starts.
pub async fn live_feed_links(store: &dyn Store) -> Result<HashSet<String>, PipelineError> {
    store.feed_origin_links().await
}

/// First entry, in feed order, whose origin link is not already known.
/// Entries without a link cannot be deduplicated and count as unseen.
/// `None` means the whole feed head has been processed before.
pub fn first_unseen<'a>(
    items: &'a [CandidateItem],
    seen: &HashSet<String>,
) -> Option<&'a CandidateItem> {
    items
        .iter()
        .find(|item| item.link.as_ref().map_or(true, |l| !seen.contains(l)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(link: Option<&str>) -> CandidateItem {
        CandidateItem {
            title: "t".into(),
            link: link.map(String::from),
            description: String::new(),
            published_at: None,
        }
    }

    #[test]
    fn picks_first_unknown_in_feed_order() {
        let items = vec![
            item(Some("https://e.com/1")),
            item(Some("https://e.com/2")),
            item(Some("https://e.com/3")),
        ];
        let seen: HashSet<String> =
            ["https://e.com/1", "https://e.com/3"].iter().map(|s| s.to_string()).collect();
        let picked = first_unseen(&items, &seen).unwrap();
        assert_eq!(picked.link.as_deref(), Some("https://e.com/2"));
    }

    #[test]
    fn exhausted_feed_yields_none() {
        let items = vec![item(Some("https://e.com/1"))];
        let seen: HashSet<String> = ["https://e.com/1".to_string()].into_iter().collect();
        assert!(first_unseen(&items, &seen).is_none());
        assert!(first_unseen(&[], &seen).is_none());
    }

    #[test]
    fn linkless_entries_are_always_unseen() {
        let items = vec![item(None)];
        let seen = HashSet::new();
        assert!(first_unseen(&items, &seen).is_some());
    }
}
