use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::period::{PeriodKey, Quarter};

/// One normalized spreadsheet row, keys in column order
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodMetadata {
    pub year: i32,
    #[serde(rename = "trimestre")]
    pub quarter: Quarter,
    #[serde(rename = "url_origen")]
    pub source_url: String,
    #[serde(rename = "fecha_descarga")]
    pub fetched_at: String,
    #[serde(rename = "total_registros")]
    pub record_count: usize,
    #[serde(rename = "total_columnas")]
    pub column_count: usize,
    #[serde(rename = "columnas")]
    pub columns: Vec<String>,
}

/// Persisted unit for one (year, quarter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodDocument {
    pub metadata: PeriodMetadata,
    #[serde(rename = "datos")]
    pub records: Vec<Record>,
}

impl PeriodDocument {
    pub fn key(&self) -> PeriodKey {
        PeriodKey::new(self.metadata.year, self.metadata.quarter)
    }
}

/// Outcome of one attempted period within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub year: i32,
    #[serde(rename = "trimestre")]
    pub quarter: Quarter,
    #[serde(rename = "exito")]
    pub success: bool,
    #[serde(rename = "archivo", skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    pub fn succeeded(key: PeriodKey, archive_path: impl Into<String>) -> Self {
        Self {
            year: key.year,
            quarter: key.quarter,
            success: true,
            archive_path: Some(archive_path.into()),
            error: None,
        }
    }

    pub fn failed(key: PeriodKey, error: impl Into<String>) -> Self {
        Self {
            year: key.year,
            quarter: key.quarter,
            success: false,
            archive_path: None,
            error: Some(error.into()),
        }
    }

    pub fn key(&self) -> PeriodKey {
        PeriodKey::new(self.year, self.quarter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "fecha_ejecucion")]
    pub generated_at: String,
    #[serde(rename = "total_intentos")]
    pub total_attempts: usize,
    #[serde(rename = "exitosos")]
    pub success_count: usize,
    #[serde(rename = "fallidos")]
    pub failure_count: usize,
    #[serde(rename = "detalles")]
    pub details: Vec<RunResult>,
}

impl RunSummary {
    pub fn from_results(generated_at: String, details: Vec<RunResult>) -> Self {
        let success_count = details.iter().filter(|r| r.success).count();
        Self {
            generated_at,
            total_attempts: details.len(),
            success_count,
            failure_count: details.len() - success_count,
            details,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableDocument {
    #[serde(rename = "archivo")]
    pub path: String,
    pub year: i32,
    #[serde(rename = "trimestre")]
    pub quarter: Quarter,
    #[serde(rename = "registros")]
    pub record_count: usize,
    #[serde(rename = "columnas")]
    pub column_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearSummary {
    #[serde(rename = "trimestres_disponibles")]
    pub quarters_available: Vec<Quarter>,
    #[serde(rename = "total_registros")]
    pub total_records: usize,
}

/// Roll-up of every persisted period document, rebuilt from scratch each time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsIndex {
    #[serde(rename = "ultima_actualizacion")]
    pub generated_at: String,
    #[serde(rename = "total_archivos")]
    pub total_documents: usize,
    #[serde(rename = "datos_disponibles")]
    pub available: Vec<AvailableDocument>,
    #[serde(rename = "resumen_por_año")]
    pub by_year: BTreeMap<i32, YearSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    #[serde(rename = "USD")]
    pub usd: Option<f64>,
    #[serde(rename = "EUR")]
    pub eur: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateData {
    pub success: bool,
    pub source: String,
    pub rates: Rates,
    #[serde(rename = "fecha_valor")]
    pub value_date: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateFailure {
    pub success: bool,
    pub error: String,
    pub updated_at: String,
}

/// Point-in-time rates from the landing page, or a failure marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateSnapshot {
    Available(RateData),
    Unavailable(RateFailure),
}

impl RateSnapshot {
    pub fn available(rates: Rates, value_date: Option<String>, updated_at: String) -> Self {
        RateSnapshot::Available(RateData {
            success: true,
            source: "BCV".to_string(),
            rates,
            value_date,
            updated_at,
        })
    }

    pub fn unavailable(error: impl Into<String>, updated_at: String) -> Self {
        RateSnapshot::Unavailable(RateFailure {
            success: false,
            error: error.into(),
            updated_at,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RateSnapshot::Available(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_summary_counts() {
        let key = PeriodKey::new(2023, Quarter::I);
        let summary = RunSummary::from_results(
            "2024-01-01T00:00:00.000000Z".to_string(),
            vec![
                RunResult::succeeded(key, "datos/2023_trimestre_I.json"),
                RunResult::failed(PeriodKey::new(2023, Quarter::II), "not found"),
            ],
        );
        assert_eq!(summary.total_attempts, 2);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failure_count, 1);
    }

    #[test]
    fn test_run_result_json_keys() {
        let value = serde_json::to_value(RunResult::failed(
            PeriodKey::new(2022, Quarter::IV),
            "File not found (404)",
        ))
        .unwrap();
        assert_eq!(
            value,
            json!({"year": 2022, "trimestre": "IV", "exito": false, "error": "File not found (404)"})
        );
    }

    #[test]
    fn test_rate_snapshot_failure_shape() {
        let snapshot = RateSnapshot::unavailable("BCV no disponible", "t".to_string());
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            value,
            json!({"success": false, "error": "BCV no disponible", "updated_at": "t"})
        );
    }

    #[test]
    fn test_rate_snapshot_success_keeps_null_fields() {
        let snapshot = RateSnapshot::available(
            Rates {
                usd: Some(36.5),
                eur: None,
            },
            None,
            "t".to_string(),
        );
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["source"], "BCV");
        assert_eq!(value["rates"]["USD"], 36.5);
        assert!(value["rates"]["EUR"].is_null());
        assert!(value.as_object().unwrap().contains_key("fecha_valor"));
    }

    #[test]
    fn test_rate_snapshot_deserializes_both_shapes() {
        let ok: RateSnapshot = serde_json::from_value(json!({
            "success": true, "source": "BCV",
            "rates": {"USD": 1.0, "EUR": null},
            "fecha_valor": "Lunes, 01 Enero 2024", "updated_at": "t"
        }))
        .unwrap();
        assert!(ok.is_success());

        let failed: RateSnapshot = serde_json::from_value(json!({
            "success": false, "error": "BCV no disponible", "updated_at": "t"
        }))
        .unwrap();
        assert!(!failed.is_success());
    }

    #[test]
    fn test_statistics_index_year_keys_are_strings() {
        let mut by_year = BTreeMap::new();
        by_year.insert(
            2023,
            YearSummary {
                quarters_available: vec![Quarter::I],
                total_records: 10,
            },
        );
        let index = StatisticsIndex {
            generated_at: "t".to_string(),
            total_documents: 1,
            available: Vec::new(),
            by_year,
        };
        let value = serde_json::to_value(&index).unwrap();
        assert_eq!(value["resumen_por_año"]["2023"]["total_registros"], 10);
    }
}
