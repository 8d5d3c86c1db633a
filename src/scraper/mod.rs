pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use self::http_client::HttpClient;

pub use self::parsers::{AreaLocator, EntryParser};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable page source: the live wiki or a saved copy.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self) -> Result<String>;

    fn describe(&self) -> String;
}

// ── Wiki over HTTP ────────────────────────────────────────────────────────────

pub struct WikiScraper {
    client: HttpClient,
    page_url: String,
}

impl WikiScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            page_url: config.page_url.clone(),
        })
    }
}

#[async_trait]
impl PageSource for WikiScraper {
    async fn fetch_page(&self) -> Result<String> {
        info!("Fetching {}", self.page_url);
        let html = self
            .client
            .get_text(&self.page_url)
            .await
            .with_context(|| format!("Failed to fetch {}", self.page_url))?;
        info!("Fetched {} bytes", html.len());
        Ok(html)
    }

    fn describe(&self) -> String {
        self.page_url.clone()
    }
}

// ── Saved page on disk ────────────────────────────────────────────────────────

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PageSource for FileSource {
    async fn fetch_page(&self) -> Result<String> {
        info!("Reading {:?}", self.path);
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {:?}", self.path))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_wiki_scraper_fetches_configured_url() {
        let server = MockServer::start_async().await;
        let page = server
            .mock_async(|when, then| {
                when.method(GET).path("/wiki");
                then.status(200).body("<h3>School</h3>");
            })
            .await;

        let config = ScraperConfig {
            page_url: server.url("/wiki"),
            ..ScraperConfig::default()
        };
        let scraper = WikiScraper::new(&config).unwrap();
        assert_eq!(scraper.fetch_page().await.unwrap(), "<h3>School</h3>");
        page.assert_async().await;
    }

    #[tokio::test]
    async fn test_file_source_reads_saved_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<h3>Health</h3>").unwrap();

        let source = FileSource::new(&path);
        assert_eq!(source.fetch_page().await.unwrap(), "<h3>Health</h3>");
        assert!(source.describe().ends_with("page.html"));
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_fatal() {
        let source = FileSource::new("/nonexistent/psychjobs/page.html");
        assert!(source.fetch_page().await.is_err());
    }
}
