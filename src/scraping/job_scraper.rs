// src/scraping/job_scraper.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use super::TextSource;
use crate::core::config_manager::ScraperConfig;
use crate::utils::collapse_whitespace;

const DESCRIPTION_SELECTOR: &str = "main#job-ad-detail-content";

/// Fetches job pages from the career portal.
pub struct PortalScraper {
    client: Client,
    retries: u32,
}

impl PortalScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            retries: config.retries.max(1),
        })
    }

    async fn fetch_html(&self, uri: &str) -> Result<String> {
        let mut last_error = None;

        for attempt in 1..=self.retries {
            match self.client.get(uri).send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .text()
                        .await
                        .context("Failed to read response body");
                }
                Ok(response) => {
                    warn!(
                        "Attempt {}/{} for {} returned HTTP {}",
                        attempt,
                        self.retries,
                        uri,
                        response.status()
                    );
                    last_error = Some(anyhow::anyhow!("HTTP error: {}", response.status()));
                }
                Err(e) => {
                    warn!("Attempt {}/{} for {} failed: {}", attempt, self.retries, uri, e);
                    last_error = Some(anyhow::Error::new(e).context("Failed to fetch job post"));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("No attempt made"))
            .context(format!("Giving up on {} after {} attempts", uri, self.retries)))
    }

    /// Whitespace-normalized text of the job description element, or an
    /// empty string when the page has none.
    pub fn extract_description(html: &str) -> String {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse(DESCRIPTION_SELECTOR) else {
            return String::new();
        };

        document
            .select(&selector)
            .next()
            .map(|element| collapse_whitespace(&element.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextSource for PortalScraper {
    async fn fetch_text(&self, uri: &str) -> Result<String> {
        info!("Fetching job post: {}", uri);
        let html = self.fetch_html(uri).await?;
        let description = Self::extract_description(&html);
        debug!("Extracted {} characters from {}", description.len(), uri);
        Ok(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_description() {
        let html = r#"
            <html><body>
              <header>Career portal</header>
              <main id="job-ad-detail-content">
                <h1>Student   Assistant</h1>
                <p>Help us build
                   tools.</p>
              </main>
            </body></html>"#;
        assert_eq!(
            PortalScraper::extract_description(html),
            "Student Assistant Help us build tools."
        );
    }

    #[test]
    fn test_missing_description_is_empty() {
        let html = "<html><body><main id=\"other\">Nothing here</main></body></html>";
        assert_eq!(PortalScraper::extract_description(html), "");
    }

    #[test]
    fn test_scraper_builds_from_config() {
        let config = ScraperConfig {
            retries: 0,
            ..ScraperConfig::default()
        };
        let scraper = PortalScraper::new(&config).unwrap();
        assert_eq!(scraper.retries, 1);
    }
}
