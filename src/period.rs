use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Invalid quarter '{0}': expected one of I, II, III, IV")]
    InvalidQuarter(String),
}

/// Reporting quarter (trimestre)
///
/// Variants are declared in calendar order so the derived `Ord` ranks
/// I < II < III < IV numerically rather than lexically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quarter {
    I,
    II,
    III,
    IV,
}

impl Quarter {
    pub const ALL: [Quarter; 4] = [Quarter::I, Quarter::II, Quarter::III, Quarter::IV];

    /// 1-based quarter index
    pub fn index(self) -> u32 {
        match self {
            Quarter::I => 1,
            Quarter::II => 2,
            Quarter::III => 3,
            Quarter::IV => 4,
        }
    }

    /// Letter used by the BCV file naming scheme
    pub fn letter(self) -> char {
        match self {
            Quarter::I => 'a',
            Quarter::II => 'b',
            Quarter::III => 'c',
            Quarter::IV => 'd',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quarter::I => "I",
            Quarter::II => "II",
            Quarter::III => "III",
            Quarter::IV => "IV",
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quarter {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "I" => Ok(Quarter::I),
            "II" => Ok(Quarter::II),
            "III" => Ok(Quarter::III),
            "IV" => Ok(Quarter::IV),
            other => Err(ResolveError::InvalidQuarter(other.to_string())),
        }
    }
}

/// One reporting period. Determines both the remote URL and the local file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    pub year: i32,
    pub quarter: Quarter,
}

impl PeriodKey {
    pub fn new(year: i32, quarter: Quarter) -> Self {
        Self { year, quarter }
    }

    /// Storage slug, e.g. `2023_trimestre_II`
    pub fn slug(&self) -> String {
        format!("{}_trimestre_{}", self.year, self.quarter)
    }

    /// Inverse of [`PeriodKey::slug`]
    pub fn from_slug(slug: &str) -> Option<Self> {
        let (year, quarter) = slug.split_once("_trimestre_")?;
        Some(Self {
            year: year.parse().ok()?,
            quarter: quarter.parse().ok()?,
        })
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.quarter)
    }
}

/// Maps a period to the URL of its published spreadsheet
///
/// URL shape: `<base>/<path>/2_1_2<letter><yy>_smc.xls`
#[derive(Debug, Clone)]
pub struct PeriodResolver {
    base_url: String,
    spreadsheet_path: String,
}

impl PeriodResolver {
    pub fn new(base_url: impl Into<String>, spreadsheet_path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            spreadsheet_path: spreadsheet_path.into().trim_matches('/').to_string(),
        }
    }

    pub fn resolve(&self, key: PeriodKey) -> String {
        let year_suffix = key.year.rem_euclid(100);
        let filename = format!("2_1_2{}{year_suffix:02}_smc.xls", key.quarter.letter());
        if self.spreadsheet_path.is_empty() {
            format!("{}/{filename}", self.base_url)
        } else {
            format!("{}/{}/{filename}", self.base_url, self.spreadsheet_path)
        }
    }

    /// Validate a raw quarter symbol, then resolve. Returns the period with its URL.
    pub fn resolve_symbol(
        &self,
        year: i32,
        quarter: &str,
    ) -> Result<(PeriodKey, String), ResolveError> {
        let key = PeriodKey::new(year, quarter.parse::<Quarter>()?);
        Ok((key, self.resolve(key)))
    }
}
