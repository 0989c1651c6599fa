use serde::{Deserialize, Serialize};

/// A configured news source. The catalog is loaded once at startup and is
/// immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    /// Country or topic grouping used by presentation layers
    pub category: String,
    /// Homepage URL
    pub url: String,
    /// RSS/Atom feed URL
    pub feed_url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}
