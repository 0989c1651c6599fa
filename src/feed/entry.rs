use chrono::{DateTime, Utc};
use feed_rs::model::Entry;

/// A feed entry reduced to the fields the pipeline consumes. Built once at
/// the parsing boundary so downstream code never probes the raw entry.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub title: String,
    pub url: String,
    /// Raw summary/description HTML as the feed carried it
    pub summary_html: Option<String>,
    pub author: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl ParsedEntry {
    /// Returns `None` for entries with nothing to identify them by; those
    /// are skipped without aborting the rest of the batch.
    pub fn from_entry(entry: Entry) -> Option<Self> {
        let url = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .unwrap_or_default();
        if url.is_empty() && entry.id.is_empty() {
            return None;
        }

        let title = entry
            .title
            .map(|t| t.content)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "No title".to_string());

        // Ordered date candidates; feeds that fail to parse either field
        // simply leave the article undated.
        let published = entry.published.or(entry.updated);

        let author = entry
            .authors
            .first()
            .map(|a| a.name.clone())
            .filter(|name| !name.is_empty());

        Some(Self {
            title,
            url,
            summary_html: entry.summary.map(|s| s.content),
            author,
            published,
        })
    }
}
