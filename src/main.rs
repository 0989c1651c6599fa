use std::collections::HashMap;
use std::time::Duration;

use newswire::config::Config;
use newswire::db::ArticleStore;
use newswire::error::{AppError, Result};
use newswire::feed::FeedFetcher;
use newswire::http;
use newswire::models::{Article, Source};
use newswire::services::ContentExtractor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let config = Config::load()?;
    let store = ArticleStore::new(&config.db_path, config.expiry_hours).await?;
    let timeout = Duration::from_secs(config.fetch_timeout_secs);

    if args.iter().any(|a| a == "--cleanup") {
        let removed = store.cleanup_expired().await?;
        println!("Removed {removed} expired articles");
        return Ok(());
    }

    if let Some(id) = flag_value(&args, "--read") {
        store.mark_read(&id).await?;
        return Ok(());
    }

    let force_refresh = args.iter().any(|a| a == "--force");

    // --show <id>: print one article's full text, extracting it on demand
    if let Some(id) = flag_value(&args, "--show") {
        let article = store
            .get(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.clone()))?;
        let extractor = ContentExtractor::new(http::page_client(timeout), store.clone());
        let text = extractor.extract_article(&article, force_refresh).await?;
        println!("{}\n", article.title);
        println!("{text}");
        return Ok(());
    }

    // Default: refresh every source and print headlines
    let sources = config.enabled_sources();
    if sources.is_empty() {
        eprintln!("No news sources configured.");
        eprintln!("Add [[sources]] entries to {:?}", Config::config_path());
        std::process::exit(1);
    }

    let fetcher = FeedFetcher::new(http::feed_client(timeout), store.clone());
    eprintln!("Fetching {} news feeds...", sources.len());
    let results = fetcher.fetch_all_sources(&sources, force_refresh).await;

    print_headlines(&sources, results, headline_limit(&args));
    Ok(())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn headline_limit(args: &[String]) -> usize {
    flag_value(args, "--limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(20)
}

fn print_headlines(sources: &[Source], results: HashMap<String, Vec<Article>>, limit: usize) {
    let source_names: HashMap<&str, &str> = sources
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect();

    let mut articles: Vec<Article> = results.into_values().flatten().collect();
    articles.sort_by_key(|a| std::cmp::Reverse(a.published.unwrap_or(a.fetched_at)));

    let mut current_source: Option<&str> = None;
    for article in articles.iter().take(limit) {
        let name = source_names
            .get(article.source_id.as_str())
            .copied()
            .unwrap_or("Unknown");
        if current_source != Some(name) {
            if current_source.is_some() {
                println!();
            }
            println!("[{name}]");
            current_source = Some(name);
        }

        let title: String = article.title.chars().take(70).collect();
        let date = article.display_date();
        if date.is_empty() {
            println!("  {}  {}", article.id, title);
        } else {
            println!("  {}  {} ({})", article.id, title, date);
        }
    }

    println!();
    println!("Showing {} of {} articles", articles.len().min(limit), articles.len());
}
