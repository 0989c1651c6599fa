use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::Article;

use super::schema::SCHEMA;

/// Rows fetched within this window satisfy [`ArticleStore::is_fresh`] and
/// let a fetch skip the network. Fixed, independent of the expiry window.
const FRESHNESS_WINDOW_HOURS: i64 = 1;

pub const DEFAULT_EXPIRY_HOURS: i64 = 24;

/// The upsert keeps previously extracted content when the incoming row has
/// none, and never clears is_read.
const UPSERT_SQL: &str = r#"INSERT INTO articles
       (id, source_id, title, url, summary, content, author, published, fetched_at, is_read)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
       ON CONFLICT(id) DO UPDATE SET
           source_id = excluded.source_id,
           title = excluded.title,
           url = excluded.url,
           summary = excluded.summary,
           content = CASE
               WHEN excluded.content IS NOT NULL AND excluded.content <> ''
               THEN excluded.content
               ELSE articles.content
           END,
           author = excluded.author,
           published = excluded.published,
           fetched_at = excluded.fetched_at,
           is_read = MAX(articles.is_read, excluded.is_read)"#;

const SELECT_COLUMNS: &str =
    "id, source_id, title, url, summary, content, author, published, fetched_at, is_read";

/// Persistent keyed cache of articles with freshness, expiry and retention
/// queries. Cloning shares the same background connection.
#[derive(Clone)]
pub struct ArticleStore {
    conn: Connection,
    expiry_hours: i64,
}

impl ArticleStore {
    pub async fn new(db_path: &str, expiry_hours: i64) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, expiry_hours })
    }

    pub async fn upsert(&self, article: Article) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    UPSERT_SQL,
                    params![
                        article.id,
                        article.source_id,
                        article.title,
                        article.url,
                        article.summary,
                        article.content,
                        article.author,
                        article.published.map(|dt| dt.to_rfc3339()),
                        article.fetched_at.to_rfc3339(),
                        article.is_read,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Upserts the whole batch in one transaction; either every row commits
    /// or none do.
    pub async fn upsert_many(&self, articles: Vec<Article>) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(UPSERT_SQL)?;
                    for article in &articles {
                        stmt.execute(params![
                            article.id,
                            article.source_id,
                            article.title,
                            article.url,
                            article.summary,
                            article.content,
                            article.author,
                            article.published.map(|dt| dt.to_rfc3339()),
                            article.fetched_at.to_rfc3339(),
                            article.is_read,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Article>> {
        let id = id.to_string();
        let article = self
            .conn
            .call(move |conn| {
                let sql = format!("SELECT {SELECT_COLUMNS} FROM articles WHERE id = ?1");
                let mut stmt = conn.prepare(&sql)?;
                let article = stmt
                    .query_row(params![id], |row| Ok(article_from_row(row)))
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    /// Articles for one source, newest published first, dateless rows last.
    /// Without `include_expired`, only rows fetched within the expiry window.
    pub async fn list_by_source(
        &self,
        source_id: &str,
        limit: i64,
        include_expired: bool,
    ) -> Result<Vec<Article>> {
        let source_id = source_id.to_string();
        let cutoff = self.expiry_cutoff();
        let articles = self
            .conn
            .call(move |conn| {
                let sql = if include_expired {
                    format!(
                        "SELECT {SELECT_COLUMNS} FROM articles
                         WHERE source_id = ?1
                         ORDER BY published DESC NULLS LAST, fetched_at DESC
                         LIMIT ?2"
                    )
                } else {
                    format!(
                        "SELECT {SELECT_COLUMNS} FROM articles
                         WHERE source_id = ?1 AND fetched_at > ?3
                         ORDER BY published DESC NULLS LAST, fetched_at DESC
                         LIMIT ?2"
                    )
                };
                let mut stmt = conn.prepare(&sql)?;
                let articles = if include_expired {
                    stmt.query_map(params![source_id, limit], |row| Ok(article_from_row(row)))?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                } else {
                    stmt.query_map(params![source_id, limit, cutoff], |row| {
                        Ok(article_from_row(row))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?
                };
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn list_all(&self, limit: i64, include_expired: bool) -> Result<Vec<Article>> {
        let cutoff = self.expiry_cutoff();
        let articles = self
            .conn
            .call(move |conn| {
                let sql = if include_expired {
                    format!(
                        "SELECT {SELECT_COLUMNS} FROM articles
                         ORDER BY published DESC NULLS LAST, fetched_at DESC
                         LIMIT ?1"
                    )
                } else {
                    format!(
                        "SELECT {SELECT_COLUMNS} FROM articles
                         WHERE fetched_at > ?2
                         ORDER BY published DESC NULLS LAST, fetched_at DESC
                         LIMIT ?1"
                    )
                };
                let mut stmt = conn.prepare(&sql)?;
                let articles = if include_expired {
                    stmt.query_map(params![limit], |row| Ok(article_from_row(row)))?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                } else {
                    stmt.query_map(params![limit, cutoff], |row| Ok(article_from_row(row)))?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                };
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// True iff the source has at least one row fetched within the last hour.
    pub async fn is_fresh(&self, source_id: &str) -> Result<bool> {
        let source_id = source_id.to_string();
        let cutoff = (Utc::now() - Duration::hours(FRESHNESS_WINDOW_HOURS)).to_rfc3339();
        let fresh = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM articles WHERE source_id = ?1 AND fetched_at > ?2",
                    params![source_id, cutoff],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(fresh)
    }

    /// Marking is monotonic; there is no unread transition.
    pub async fn mark_read(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("UPDATE articles SET is_read = 1 WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn set_content(&self, id: &str, content: &str) -> Result<()> {
        let id = id.to_string();
        let content = content.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE articles SET content = ?1 WHERE id = ?2",
                    params![content, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Deletes rows older than twice the expiry window and returns how many
    /// were removed.
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let cutoff = (Utc::now() - Duration::hours(self.expiry_hours * 2)).to_rfc3339();
        let removed = self
            .conn
            .call(move |conn| {
                let removed =
                    conn.execute("DELETE FROM articles WHERE fetched_at < ?1", params![cutoff])?;
                Ok(removed)
            })
            .await?;
        Ok(removed)
    }

    fn expiry_cutoff(&self) -> String {
        (Utc::now() - Duration::hours(self.expiry_hours)).to_rfc3339()
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn article_from_row(row: &Row) -> Article {
    Article {
        id: row.get(0).unwrap(),
        source_id: row.get(1).unwrap(),
        title: row.get(2).unwrap(),
        url: row.get(3).unwrap(),
        summary: row.get(4).unwrap(),
        content: row.get(5).unwrap(),
        author: row.get(6).unwrap(),
        published: row
            .get::<_, Option<String>>(7)
            .unwrap()
            .and_then(|s| parse_datetime(&s)),
        fetched_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        is_read: row.get::<_, i64>(9).unwrap() != 0,
    }
}
