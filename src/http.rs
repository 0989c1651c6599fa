//! HTTP client construction. Clients are built once in the composition
//! root and handed to the components that need them.

use std::time::Duration;

use reqwest::Client;

const FEED_USER_AGENT: &str = "newswire/1.0 (terminal news reader)";

/// Some origins serve bots a block page; article fetches identify as a
/// regular browser.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Client for feed polling. Redirects are followed (reqwest default,
/// limited to 10 hops).
pub fn feed_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(FEED_USER_AGENT)
        .build()
        .expect("Failed to create HTTP client")
}

/// Client for fetching article pages during extraction.
pub fn page_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(BROWSER_USER_AGENT)
        .build()
        .expect("Failed to create HTTP client")
}
