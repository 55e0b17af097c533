// tests/feed_fixtures.rs
// Tolerant feed parsing against realistic RSS and Atom fixtures.

use newsforge::fetch::feed::parse_feed;

const RSS: &str = include_str!("fixtures/sample_rss.xml");
const ATOM: &str = include_str!("fixtures/sample_atom.xml");

#[test]
fn rss_fixture_yields_all_items_in_feed_order() {
    let items = parse_feed(RSS).unwrap();
    assert_eq!(items.len(), 3);

    assert_eq!(items[0].title, "City council approves transit expansion");
    assert_eq!(
        items[0].link.as_deref(),
        Some("https://news.example.com/transit-expansion")
    );
    // CDATA-wrapped HTML descriptions come back as plain text.
    assert_eq!(items[0].description, "The council voted 7-2 to fund the new line.");
    assert!(items[0].published_at.is_some());

    assert_eq!(items[1].description, "Funding will go toward hiring & expansion.");
    assert_eq!(
        items[2].link.as_deref(),
        Some("https://news.example.com/museum-reopens")
    );
}

#[test]
fn atom_fixture_prefers_alternate_links_and_reads_both_date_shapes() {
    let items = parse_feed(ATOM).unwrap();
    assert_eq!(items.len(), 2);

    assert_eq!(
        items[0].link.as_deref(),
        Some("https://digest.example.com/harbor-cleanup")
    );
    assert_eq!(items[0].description, "Crews expect to finish dredging by March.");
    assert!(items[0].published_at.is_some());

    // Second entry has no summary; content is used, and `updated` supplies
    // the timestamp.
    assert_eq!(items[1].link.as_deref(), Some("https://digest.example.com/rare-maps"));
    assert_eq!(
        items[1].description,
        "High-resolution scans are now available online."
    );
    assert!(items[1].published_at.is_some());
}

#[test]
fn garbage_input_is_an_error_not_a_panic() {
    // A non-XML payload parses to zero entries or errors; either way the
    // caller records a failed/skipped attempt and moves on.
    let result = parse_feed("<html><body>not a feed</body>");
    match result {
        Ok(items) => assert!(items.is_empty()),
        Err(_) => {}
    }
}
