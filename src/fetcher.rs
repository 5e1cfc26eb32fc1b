use regex::Regex;
use scraper::{Html, Selector};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::fetch_error::FetchError;
use crate::importers::downloader::browser_client;
use crate::models::{RateSnapshot, Rates};
use crate::store::{write_json, PersistenceError};
use crate::utils::{parse_locale_number, utc_timestamp};

/// Error text stored in the snapshot when the landing page cannot be fetched
pub const UNAVAILABLE_MESSAGE: &str = "BCV no disponible";

// Currency label followed by the rate inside the "centrado" container:
// <span> USD</span></div><div class="col-sm-6 col-xs-6 centrado"><strong> 36,52130000 </strong>
const RATE_PATTERN: &str =
    r"(?is)<span>\s*([A-Z]{3})\s*</span>\s*</div>\s*<div[^>]*centrado[^>]*>\s*<strong>\s*([\d.,]+)";
const VALUE_DATE_PATTERN: &str =
    r#"(?i)<span[^>]*class=["']date-display-single["'][^>]*>([^<]+)</span>"#;

/// Scrapes the point-in-time official rates from the BCV landing page
#[derive(Clone)]
pub struct RateFetcher {
    client: reqwest::Client,
    url: String,
    rate_pattern: Regex,
    value_date_pattern: Regex,
}

impl RateFetcher {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        Self::with_url(
            config.landing_page_url(),
            config.page_timeout,
            config.accept_invalid_certs,
        )
    }

    pub fn with_url(
        url: impl Into<String>,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: browser_client(timeout, accept_invalid_certs)?,
            url: url.into(),
            rate_pattern: Regex::new(RATE_PATTERN)?,
            value_date_pattern: Regex::new(VALUE_DATE_PATTERN)?,
        })
    }

    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch_html(&self) -> Result<String, FetchError> {
        debug!("Sending HTTP request to BCV landing page");
        let response = self.client.get(&self.url).send().await?;
        debug!("Received HTTP response with status: {}", response.status());

        let html = response.error_for_status()?.text().await?;
        debug!("Retrieved HTML content, size: {} bytes", html.len());
        Ok(html)
    }

    /// Fetch and parse. Network failures produce an unavailable snapshot rather than an error.
    pub async fn fetch_snapshot(&self) -> RateSnapshot {
        match self.fetch_html().await {
            Ok(html) => self.parse_html(&html),
            Err(e) => {
                error!("Failed to fetch BCV landing page: {e}");
                RateSnapshot::unavailable(UNAVAILABLE_MESSAGE, utc_timestamp())
            }
        }
    }

    /// Fetch a snapshot and replace the file at `output` with it
    pub async fn refresh(&self, output: &Path) -> Result<RateSnapshot, PersistenceError> {
        let snapshot = self.fetch_snapshot().await;
        write_json(output, &snapshot)?;
        info!(
            success = snapshot.is_success(),
            "Rate snapshot written to {}",
            output.display()
        );
        Ok(snapshot)
    }

    /// Build a snapshot from landing-page markup; unmatched fields stay `None`
    pub fn parse_html(&self, html: &str) -> RateSnapshot {
        let rates = Rates {
            usd: self.extract_rate(html, "USD"),
            eur: self.extract_rate(html, "EUR"),
        };
        if rates.usd.is_none() {
            warn!("USD rate not found in landing page");
        }
        let value_date = self.extract_value_date(html);
        RateSnapshot::available(rates, value_date, utc_timestamp())
    }

    pub fn extract_rate(&self, html: &str, code: &str) -> Option<f64> {
        self.rate_pattern
            .captures_iter(html)
            .find(|caps| caps[1].eq_ignore_ascii_case(code))
            .and_then(|caps| parse_locale_number(&caps[2]))
    }

    pub fn extract_value_date(&self, html: &str) -> Option<String> {
        if let Some(caps) = self.value_date_pattern.captures(html) {
            return non_blank(&caps[1]);
        }

        // class attribute with more than one class, or different attribute quoting
        let document = Html::parse_document(html);
        let selector = Selector::parse("span.date-display-single").ok()?;
        document
            .select(&selector)
            .map(|element| element.text().collect::<String>())
            .find_map(|text| non_blank(&text))
    }
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
