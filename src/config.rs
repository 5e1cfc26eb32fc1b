use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Largest accepted `YEARS_BACK`
pub const MAX_YEARS_BACK: u32 = 50;

/// Order in which the two spreadsheet readers are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderOrder {
    /// Legacy binary (.xls) reader first, then the XML-zip (.xlsx) reader
    #[default]
    LegacyFirst,
    ModernFirst,
}

impl FromStr for DecoderOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy-first" | "xls" => Ok(DecoderOrder::LegacyFirst),
            "modern-first" | "xlsx" => Ok(DecoderOrder::ModernFirst),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding per-period documents, the run summary and the index
    pub data_dir: PathBuf,
    /// File the landing-page rate snapshot is written to
    pub rates_output: PathBuf,
    pub bcv_base_url: String,
    pub spreadsheet_path: String,
    /// Past years attempted in addition to the current one
    pub years_back: u32,
    pub page_timeout: Duration,
    pub download_timeout: Duration,
    pub politeness_delay: Duration,
    pub min_spreadsheet_bytes: usize,
    pub decoder_order: DecoderOrder,
    /// Row (0-based, within the used range) holding the column labels
    pub header_row: usize,
    pub fetch_retries: usize,
    pub accept_invalid_certs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("datos"),
            rates_output: PathBuf::from("bcv_data.json"),
            bcv_base_url: "https://www.bcv.org.ve".to_string(),
            spreadsheet_path: "sites/default/files/EstadisticasGeneral".to_string(),
            years_back: 4,
            page_timeout: Duration::from_secs(10),
            download_timeout: Duration::from_secs(30),
            politeness_delay: Duration::from_millis(1000),
            min_spreadsheet_bytes: 1024,
            decoder_order: DecoderOrder::LegacyFirst,
            header_row: 0,
            fetch_retries: 2,
            accept_invalid_certs: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        Ok(Config {
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            rates_output: env::var("RATES_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or(defaults.rates_output),
            bcv_base_url: env::var("BCV_BASE_URL").unwrap_or(defaults.bcv_base_url),
            spreadsheet_path: env::var("BCV_SPREADSHEET_PATH")
                .unwrap_or(defaults.spreadsheet_path),
            years_back: parse_years_back(defaults.years_back)?,
            page_timeout: Duration::from_secs(parse_var(
                "PAGE_TIMEOUT_SECS",
                defaults.page_timeout.as_secs(),
            )?),
            download_timeout: Duration::from_secs(parse_var(
                "DOWNLOAD_TIMEOUT_SECS",
                defaults.download_timeout.as_secs(),
            )?),
            politeness_delay: Duration::from_millis(parse_var(
                "POLITENESS_DELAY_MS",
                defaults.politeness_delay.as_millis() as u64,
            )?),
            min_spreadsheet_bytes: parse_var(
                "MIN_SPREADSHEET_BYTES",
                defaults.min_spreadsheet_bytes,
            )?,
            decoder_order: parse_var("DECODER_ORDER", defaults.decoder_order)?,
            header_row: parse_var("HEADER_ROW", defaults.header_row)?,
            fetch_retries: parse_var("FETCH_RETRIES", defaults.fetch_retries)?,
            accept_invalid_certs: parse_var(
                "ACCEPT_INVALID_CERTS",
                defaults.accept_invalid_certs,
            )?,
        })
    }

    /// Landing page scraped for point-in-time rates
    pub fn landing_page_url(&self) -> String {
        format!("{}/", self.bcv_base_url.trim_end_matches('/'))
    }
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

fn parse_years_back(default: u32) -> Result<u32, ConfigError> {
    let years_back = parse_var("YEARS_BACK", default)?;
    if years_back > MAX_YEARS_BACK {
        return Err(ConfigError::Invalid {
            var: "YEARS_BACK",
            value: years_back.to_string(),
        });
    }
    Ok(years_back)
}
