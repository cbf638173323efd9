//! Page fetching
//!
//! Downloads target pages with a browser-like client.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::header::ACCEPT_LANGUAGE;
use reqwest::Client;
use tracing::debug;

/// Fetch timeout in seconds
const FETCH_TIMEOUT: u64 = 30;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Marker of an anti-bot interstitial served with a 200
const CHALLENGE_MARKER: &str = "Just a moment";

/// HTTP client shared by every fetch in a run
pub fn client() -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT))
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

/// Fetch a page's HTML
pub async fn fetch_html(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
        .send()
        .await
        .with_context(|| format!("Failed to fetch {}. Please check URL address", url))?;

    let status = response.status();
    debug!("GET {} -> {}", url, status);
    if !status.is_success() {
        bail!("{}", status_message(status.as_u16()));
    }

    let html = response
        .text()
        .await
        .with_context(|| format!("Failed to read response body from {}", url))?;
    if html.contains(CHALLENGE_MARKER) {
        bail!("{}", status_message(403));
    }
    Ok(html)
}

/// User-facing explanation of a failed status
pub fn status_message(status: u16) -> String {
    match status {
        404 => "Status code 404. Website does not exist.".to_string(),
        403 => "Status code 403. Forbidden (bot detected).".to_string(),
        other => format!("Status code {}. Please check manually.", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_messages() {
        assert!(status_message(404).contains("does not exist"));
        assert!(status_message(403).contains("bot detected"));
        assert_eq!(
            status_message(500),
            "Status code 500. Please check manually."
        );
    }

    #[test]
    fn test_client_builds() {
        assert!(client().is_ok());
    }
}
