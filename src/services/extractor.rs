use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use tokio::sync::Semaphore;
use url::Url;

use crate::db::ArticleStore;
use crate::error::Result;
use crate::models::Article;

/// Upper bound on simultaneously running extraction pipelines.
const MAX_CONCURRENT_EXTRACTIONS: usize = 5;

/// Extracted text shorter than this is treated as a block page or
/// navigation shell, not an article body.
const MIN_CONTENT_CHARS: usize = 200;

const TEXT_WIDTH: usize = 80;

pub type ProgressFn = Arc<dyn Fn(&Article) + Send + Sync>;

/// On-demand full-text extraction. Network and extraction failures degrade
/// to the article summary; only storage failures propagate.
#[derive(Clone)]
pub struct ContentExtractor {
    client: Client,
    store: ArticleStore,
    gate: Arc<Semaphore>,
}

impl ContentExtractor {
    pub fn new(client: Client, store: ArticleStore) -> Self {
        Self {
            client,
            store,
            gate: Arc::new(Semaphore::new(MAX_CONCURRENT_EXTRACTIONS)),
        }
    }

    /// Extract the full text for one article.
    ///
    /// Already-extracted content is returned without I/O unless
    /// `force_refresh` is set. Failed extractions return the summary and
    /// persist nothing, so a later call retries from scratch.
    pub async fn extract_article(&self, article: &Article, force_refresh: bool) -> Result<String> {
        if !force_refresh {
            if article.has_content() {
                return Ok(article.content.clone().unwrap_or_default());
            }
            // A prior or concurrent extraction may have written content
            // since this Article value was loaded.
            if let Some(cached) = self.store.get(&article.id).await? {
                if cached.has_content() {
                    return Ok(cached.content.unwrap_or_default());
                }
            }
        }

        if article.url.is_empty() || Url::parse(&article.url).is_err() {
            return Ok(article.summary.clone());
        }

        let content = match self.fetch_and_extract(&article.url).await {
            Ok(Some(content)) => content,
            Ok(None) => return Ok(article.summary.clone()),
            Err(e) => {
                tracing::debug!("Extraction failed for {}: {}", article.url, e);
                return Ok(article.summary.clone());
            }
        };

        self.store.set_content(&article.id, &content).await?;
        Ok(content)
    }

    async fn fetch_and_extract(&self, url: &str) -> Result<Option<String>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            tracing::debug!("Failed to fetch {}: {}", url, response.status());
            return Ok(None);
        }

        let html = response.text().await?;

        // html2text walks the whole document; keep it off the I/O threads.
        let content = tokio::task::spawn_blocking(move || extract_readable(&html))
            .await
            .map_err(|e| anyhow::anyhow!("extraction task failed: {e}"))?;

        Ok(content)
    }

    /// Extract several articles, at most five pipelines at a time; later
    /// requests wait for a permit in FIFO order. `on_progress` fires exactly
    /// once per article whether it extracted or fell back to its summary.
    pub async fn extract_multiple(
        &self,
        articles: &[Article],
        on_progress: Option<ProgressFn>,
    ) -> Result<HashMap<String, String>> {
        let outcomes = stream::iter(articles)
            .map(|article| {
                let on_progress = on_progress.clone();
                async move {
                    let _permit = self.gate.acquire().await.expect("extraction gate closed");
                    let outcome = self.extract_article(article, false).await;
                    if let Some(callback) = &on_progress {
                        callback(article);
                    }
                    outcome.map(|content| (article.id.clone(), content))
                }
            })
            .buffer_unordered(articles.len().max(1))
            .collect::<Vec<_>>()
            .await;

        let mut contents = HashMap::new();
        for outcome in outcomes {
            let (id, content) = outcome?;
            contents.insert(id, content);
        }
        Ok(contents)
    }
}

/// Readable-text conversion via html2text, with whitespace cleanup.
fn extract_readable(html: &str) -> Option<String> {
    let text = match html2text::from_read(html.as_bytes(), TEXT_WIDTH) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            return None;
        }
    };

    let cleaned: String = text
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.len() > MIN_CONTENT_CHARS {
        Some(cleaned)
    } else {
        tracing::debug!("Extracted content too short ({} chars)", cleaned.len());
        None
    }
}
