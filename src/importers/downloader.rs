use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::fetch_error::FetchError;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "es-VE,es;q=0.9";

/// Build an HTTP client that looks like a desktop browser to the BCV servers
///
/// The BCV certificate chain does not validate against the default roots,
/// so `accept_invalid_certs` is normally true.
pub fn browser_client(timeout: Duration, accept_invalid_certs: bool) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE),
    );

    let client = Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Classified result of one spreadsheet download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(Vec<u8>),
    NotFound,
    /// Body smaller than the configured floor, usually an error page served with 200
    TooSmall { size: usize },
    ConnectionError { message: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

/// Downloads quarterly statistics spreadsheets from the BCV site
#[derive(Clone)]
pub struct BcvDownloader {
    client: Client,
    min_bytes: usize,
}

impl BcvDownloader {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        Self::with_settings(
            config.download_timeout,
            config.min_spreadsheet_bytes,
            config.accept_invalid_certs,
        )
    }

    pub fn with_settings(
        timeout: Duration,
        min_bytes: usize,
        accept_invalid_certs: bool,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: browser_client(timeout, accept_invalid_certs)?,
            min_bytes,
        })
    }

    /// Download and classify, folding connection-level failures into the outcome
    pub async fn download(&self, url: &str) -> FetchOutcome {
        match self.try_download(url).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Download of {url} failed: {e}");
                FetchOutcome::ConnectionError {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Download and classify; connection-level failures are returned as `Err`
    /// so callers can decide whether to retry them.
    ///
    /// Never returns `FetchOutcome::ConnectionError`.
    #[instrument(skip(self))]
    pub async fn try_download(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        info!("Downloading spreadsheet: {url}");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!("Received HTTP response with status: {status}");

        if status == StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes from {url}", bytes.len());

        if bytes.len() < self.min_bytes {
            warn!(
                "Response from {url} is only {} bytes (floor {}), treating as error page",
                bytes.len(),
                self.min_bytes
            );
            return Ok(FetchOutcome::TooSmall { size: bytes.len() });
        }

        Ok(FetchOutcome::Success(bytes.to_vec()))
    }
}
