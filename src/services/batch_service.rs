use backon::{ExponentialBuilder, Retryable};
use chrono::{Datelike, NaiveDate};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, MAX_YEARS_BACK};
use crate::fetch_error::FetchError;
use crate::importers::downloader::{BcvDownloader, FetchOutcome};
use crate::importers::excel_importer::{DecodeError, SpreadsheetDecoder};
use crate::models::{RunResult, RunSummary};
use crate::period::{PeriodKey, PeriodResolver, Quarter};
use crate::services::normalizer::RowNormalizer;
use crate::store::{write_json, JsonStore, PersistenceError};
use crate::utils::utc_timestamp;

/// Why a single period could not be stored. Recorded in the run summary, never
/// propagated past the period.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("File not found (404): {url}")]
    NotFound { url: String },

    #[error("Response too small ({size} bytes), likely an error page: {url}")]
    TooSmall { size: usize, url: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Decoder task failed: {0}")]
    Task(String),
}

/// Which periods a run attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidatePolicy {
    /// Past years attempted before the current one
    pub years_back: u32,
}

impl CandidatePolicy {
    pub fn new(years_back: u32) -> Self {
        Self { years_back }
    }

    /// Candidate periods as of `today`, oldest first
    ///
    /// Past years contribute all four quarters. The current year contributes
    /// quarters up to and including ceil(month / 3). `years_back` is capped at
    /// [`MAX_YEARS_BACK`].
    pub fn candidates(&self, today: NaiveDate) -> Vec<PeriodKey> {
        let current_year = today.year();
        let current_quarter = today.month().div_ceil(3);
        let years_back = self.years_back.min(MAX_YEARS_BACK) as i32;
        let first_year = current_year - years_back;

        (first_year..=current_year)
            .flat_map(|year| {
                Quarter::ALL
                    .into_iter()
                    .filter(move |q| year < current_year || q.index() <= current_quarter)
                    .map(move |q| PeriodKey::new(year, q))
            })
            .collect()
    }
}

/// Drives every candidate period through resolve, download, decode, normalize
/// and persist, then writes the run summary.
pub struct BatchService {
    resolver: PeriodResolver,
    downloader: BcvDownloader,
    decoder: SpreadsheetDecoder,
    normalizer: RowNormalizer,
    store: JsonStore,
    policy: CandidatePolicy,
    politeness_delay: Duration,
    fetch_retries: usize,
}

impl BatchService {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        Ok(Self {
            resolver: PeriodResolver::new(&config.bcv_base_url, &config.spreadsheet_path),
            downloader: BcvDownloader::new(config)?,
            decoder: SpreadsheetDecoder::from_config(config),
            normalizer: RowNormalizer::new(),
            store: JsonStore::new(&config.data_dir),
            policy: CandidatePolicy::new(config.years_back),
            politeness_delay: config.politeness_delay,
            fetch_retries: config.fetch_retries,
        })
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    pub fn candidates(&self, today: NaiveDate) -> Vec<PeriodKey> {
        self.policy.candidates(today)
    }

    /// Run over the given periods, reporting each outcome to `on_result` as it lands
    ///
    /// Only a failure to write the summary itself is returned as an error.
    pub async fn run<F>(
        &self,
        periods: &[PeriodKey],
        mut on_result: F,
    ) -> Result<(RunSummary, PathBuf), PersistenceError>
    where
        F: FnMut(&RunResult),
    {
        let start_time = Instant::now();
        info!("Starting batch run over {} periods", periods.len());

        let mut results = Vec::with_capacity(periods.len());
        for (i, key) in periods.iter().enumerate() {
            if i > 0 && !self.politeness_delay.is_zero() {
                tokio::time::sleep(self.politeness_delay).await;
            }

            let result = match self.process_period(*key).await {
                Ok(path) => RunResult::succeeded(*key, path.display().to_string()),
                Err(e) => {
                    warn!(period = %key, error = %e, "Period failed");
                    RunResult::failed(*key, e.to_string())
                }
            };
            on_result(&result);
            results.push(result);
        }

        let summary = RunSummary::from_results(utc_timestamp(), results);
        let path = self.store.run_summary_path();
        write_json(&path, &summary)?;

        info!(
            succeeded = summary.success_count,
            failed = summary.failure_count,
            duration_secs = %format!("{:.2}", start_time.elapsed().as_secs_f64()),
            "Batch run finished, summary written to {}",
            path.display()
        );
        Ok((summary, path))
    }

    /// Fetch, decode, normalize and persist one period
    #[instrument(skip(self), fields(period = %key))]
    pub async fn process_period(&self, key: PeriodKey) -> Result<PathBuf, PipelineError> {
        let url = self.resolver.resolve(key);

        let bytes = match self.download_with_retry(&url).await {
            FetchOutcome::Success(bytes) => bytes,
            FetchOutcome::NotFound => return Err(PipelineError::NotFound { url }),
            FetchOutcome::TooSmall { size } => return Err(PipelineError::TooSmall { size, url }),
            FetchOutcome::ConnectionError { message } => {
                return Err(PipelineError::Connection { message })
            }
        };

        let decoder = self.decoder;
        let table = tokio::task::spawn_blocking(move || decoder.decode(&bytes))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;

        let document = self.normalizer.normalize(key, &url, table);
        let path = self.store.save_period(&document)?;

        info!(
            "Stored {} records for {key} at {}",
            document.metadata.record_count,
            path.display()
        );
        Ok(path)
    }

    /// Download, retrying connection-level failures with exponential backoff
    async fn download_with_retry(&self, url: &str) -> FetchOutcome {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.politeness_delay)
            .with_max_times(self.fetch_retries);

        let result = (|| self.downloader.try_download(url))
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .notify(|err: &FetchError, delay: Duration| {
                debug!("Retrying {url} in {delay:?} after error: {err}");
            })
            .await;

        result.unwrap_or_else(|e| FetchOutcome::ConnectionError {
            message: e.to_string(),
        })
    }
}
