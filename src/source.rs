// src/source.rs
// Source catalog and run scheduler.
//
// A Source is one configured origin of content. The kind-specific payload is
// an internally tagged union so the scheduler and generator can dispatch with
// a plain match instead of virtual methods.

use chrono::{DateTime, Utc, Weekday};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Provenance kind carried by drafts, published articles and ledger entries.
/// `Url` only appears on ad-hoc generations; it is never a catalog source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Feed,
    Theme,
    Topic,
    Url,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::Theme => "theme",
            SourceKind::Topic => "topic",
            SourceKind::Url => "url",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourcePayload {
    Feed {
        feed_url: String,
    },
    Theme {
        /// Day of week this theme runs on, e.g. "friday".
        theme_day: String,
        theme_description: String,
    },
    Topic {
        topic_prompt: String,
    },
}

impl SourcePayload {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourcePayload::Feed { .. } => SourceKind::Feed,
            SourcePayload::Theme { .. } => SourceKind::Theme,
            SourcePayload::Topic { .. } => SourceKind::Topic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub payload: SourcePayload,
    /// Classification tag applied to drafts when the model doesn't pick one.
    pub default_tag: String,
    pub active: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// Day-of-week names accepted in theme configuration. Full names and
/// three-letter abbreviations, case-insensitive.
pub fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.trim().to_ascii_lowercase().as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Assemble this run's candidate sources in processing order: every feed
/// first (each worth at most one draft), then themes scheduled for `today`,
/// then exactly one randomly chosen topic. The daily ceiling is applied by
/// the run loop as drafts actually land, so a candidate that fails or
/// dedups to nothing never consumes a budget slot.
pub fn select_work<R: Rng + ?Sized>(
    sources: &[Source],
    today: Weekday,
    rng: &mut R,
) -> Vec<Source> {
    let mut work = Vec::new();

    for s in sources.iter().filter(|s| s.active) {
        if matches!(s.payload, SourcePayload::Feed { .. }) {
            work.push(s.clone());
        }
    }

    for s in sources.iter().filter(|s| s.active) {
        if let SourcePayload::Theme { ref theme_day, .. } = s.payload {
            if parse_weekday(theme_day) == Some(today) {
                work.push(s.clone());
            }
        }
    }

    let topics: Vec<&Source> = sources
        .iter()
        .filter(|s| s.active && matches!(s.payload, SourcePayload::Topic { .. }))
        .collect();
    if !topics.is_empty() {
        let pick = topics[rng.random_range(0..topics.len())];
        work.push(pick.clone());
    }

    work
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn feed(id: i64, active: bool) -> Source {
        Source {
            id,
            name: format!("feed-{id}"),
            payload: SourcePayload::Feed {
                feed_url: format!("https://example.com/{id}.xml"),
            },
            default_tag: "news".into(),
            active,
            last_fetched_at: None,
        }
    }

    fn theme(id: i64, day: &str) -> Source {
        Source {
            id,
            name: format!("theme-{id}"),
            payload: SourcePayload::Theme {
                theme_day: day.into(),
                theme_description: "weekly roundup".into(),
            },
            default_tag: "news".into(),
            active: true,
            last_fetched_at: None,
        }
    }

    fn topic(id: i64) -> Source {
        Source {
            id,
            name: format!("topic-{id}"),
            payload: SourcePayload::Topic {
                topic_prompt: "emerging tech".into(),
            },
            default_tag: "tech".into(),
            active: true,
            last_fetched_at: None,
        }
    }

    #[test]
    fn weekday_names_parse_loosely() {
        assert_eq!(parse_weekday("Friday"), Some(Weekday::Fri));
        assert_eq!(parse_weekday(" mon "), Some(Weekday::Mon));
        assert_eq!(parse_weekday("someday"), None);
    }

    #[test]
    fn order_is_feeds_then_themes_then_one_topic() {
        let sources = vec![topic(5), theme(3, "monday"), feed(1, true), feed(2, true), topic(6)];
        let mut rng = StdRng::seed_from_u64(7);
        let work = select_work(&sources, Weekday::Mon, &mut rng);
        let ids: Vec<i64> = work.iter().map(|s| s.id).collect();
        assert_eq!(&ids[..3], &[1, 2, 3]);
        assert_eq!(work.len(), 4);
        assert!(matches!(work[3].payload, SourcePayload::Topic { .. }));
    }

    #[test]
    fn at_most_one_topic_is_planned() {
        let sources = vec![topic(1), topic(2), topic(3)];
        let mut rng = StdRng::seed_from_u64(1);
        let work = select_work(&sources, Weekday::Wed, &mut rng);
        assert_eq!(work.len(), 1);
        assert!(matches!(work[0].payload, SourcePayload::Topic { .. }));
    }

    #[test]
    fn inactive_and_off_day_themes_are_skipped() {
        let sources = vec![feed(1, false), theme(2, "friday")];
        let mut rng = StdRng::seed_from_u64(1);
        let work = select_work(&sources, Weekday::Mon, &mut rng);
        // No feeds, no matching theme; only the (nonexistent) topic slot left.
        assert!(work.is_empty());
    }
}
