use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A cached news article. `id` is derived from the (source, url, title)
/// triple, so refetching a feed upserts existing rows instead of
/// duplicating them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub source_id: String,
    pub title: String,
    pub url: String,
    /// HTML-stripped feed summary, at most 500 characters
    pub summary: String,
    /// Full extracted text, populated lazily
    pub content: Option<String>,
    pub author: Option<String>,
    /// Absent when the feed carries no usable date
    pub published: Option<DateTime<Utc>>,
    /// Time of the last successful network fetch
    pub fetched_at: DateTime<Utc>,
    pub is_read: bool,
}

impl Article {
    /// Deterministic identity for a feed entry: the same
    /// (source, url, title) triple always maps to the same id.
    pub fn compute_id(source_id: &str, url: &str, title: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_id.as_bytes());
        hasher.update(b":");
        hasher.update(url.as_bytes());
        hasher.update(b":");
        hasher.update(title.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }

    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Relative age of the publication date for display, empty for
    /// undated articles.
    pub fn display_date(&self) -> String {
        let Some(published) = self.published else {
            return String::new();
        };
        let delta = Utc::now().signed_duration_since(published);

        if delta.num_days() == 0 {
            let hours = delta.num_hours();
            if hours == 0 {
                let minutes = delta.num_minutes();
                if minutes > 0 {
                    return format!("{minutes}m ago");
                }
                return "just now".to_string();
            }
            format!("{hours}h ago")
        } else if delta.num_days() == 1 {
            "yesterday".to_string()
        } else if delta.num_days() < 7 {
            format!("{}d ago", delta.num_days())
        } else {
            published.format("%b %d").to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic() {
        let a = Article::compute_id("nhk", "https://example.com/1", "Headline");
        let b = Article::compute_id("nhk", "https://example.com/1", "Headline");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn display_date_is_empty_for_undated_articles() {
        let article = Article {
            id: "abc".to_string(),
            source_id: "src".to_string(),
            title: "t".to_string(),
            url: String::new(),
            summary: String::new(),
            content: None,
            author: None,
            published: None,
            fetched_at: Utc::now(),
            is_read: false,
        };
        assert_eq!(article.display_date(), "");

        let recent = Article {
            published: Some(Utc::now() - chrono::Duration::hours(2)),
            ..article
        };
        assert_eq!(recent.display_date(), "2h ago");
    }

    #[test]
    fn id_changes_with_any_part_of_the_triple() {
        let base = Article::compute_id("nhk", "https://example.com/1", "Headline");
        assert_ne!(base, Article::compute_id("yna", "https://example.com/1", "Headline"));
        assert_ne!(base, Article::compute_id("nhk", "https://example.com/2", "Headline"));
        assert_ne!(base, Article::compute_id("nhk", "https://example.com/1", "Other"));
    }
}
