// Tests for RateFetcher against a mocked BCV landing page

use bcv_stats::fetcher::{RateFetcher, UNAVAILABLE_MESSAGE};
use bcv_stats::models::RateSnapshot;
use mockito::Server;
use std::fs;
use std::time::Duration;

const LANDING_PAGE: &str = r#"
<html><body>
<div id="dolar"><div class="field-content"><div class="row recuadrotsmc">
  <div class="col-sm-6 col-xs-6"><img src="/usd.png"> <span> USD</span></div>
  <div class="col-sm-6 col-xs-6 centrado"><strong> 36,52130000 </strong></div>
</div></div></div>
<div id="euro"><div class="field-content"><div class="row recuadrotsmc">
  <div class="col-sm-6 col-xs-6"><span>EUR</span></div>
  <div class="col-sm-6 col-xs-6 centrado"><strong>39.750,25</strong></div>
</div></div></div>
<div class="pull-right dinpro center">Fecha Valor: <span class="date-display-single" property="dc:date">Viernes, 15 Marzo  2024</span></div>
</body></html>
"#;

fn fetcher_for(url: String) -> RateFetcher {
    RateFetcher::with_url(url, Duration::from_secs(5), true).unwrap()
}

#[tokio::test]
async fn test_refresh_writes_rate_snapshot() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(LANDING_PAGE)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bcv_data.json");

    let snapshot = fetcher_for(format!("{}/", server.url()))
        .refresh(&output)
        .await
        .unwrap();
    assert!(snapshot.is_success());
    mock.assert_async().await;

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["success"], true);
    assert_eq!(written["source"], "BCV");
    assert_eq!(written["rates"]["USD"], 36.5213);
    assert_eq!(written["rates"]["EUR"], 39750.25);
    assert_eq!(written["fecha_valor"], "Viernes, 15 Marzo  2024");
    assert!(written["updated_at"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_server_error_writes_failure_snapshot() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(503)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bcv_data.json");

    let snapshot = fetcher_for(format!("{}/", server.url()))
        .refresh(&output)
        .await
        .unwrap();

    match &snapshot {
        RateSnapshot::Unavailable(failure) => {
            assert!(!failure.success);
            assert_eq!(failure.error, UNAVAILABLE_MESSAGE);
        }
        other => panic!("Expected failure snapshot, got {other:?}"),
    }

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["success"], false);
    assert_eq!(written["error"], "BCV no disponible");
    assert!(written.get("rates").is_none());
}

#[tokio::test]
async fn test_refused_connection_is_failure_snapshot() {
    let snapshot = fetcher_for("http://127.0.0.1:9/".to_string())
        .fetch_snapshot()
        .await;

    assert!(!snapshot.is_success());
}

#[tokio::test]
async fn test_page_without_rates_is_still_success() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body("<html><body>Nuevo diseño</body></html>")
        .create_async()
        .await;

    let snapshot = fetcher_for(format!("{}/", server.url()))
        .fetch_snapshot()
        .await;

    match snapshot {
        RateSnapshot::Available(data) => {
            assert_eq!(data.rates.usd, None);
            assert_eq!(data.rates.eur, None);
            assert_eq!(data.value_date, None);
        }
        other => panic!("Expected available snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_refresh_replaces_previous_snapshot() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_body(LANDING_PAGE)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bcv_data.json");
    fs::write(&output, r#"{"success": false, "error": "old", "updated_at": "x", "extra": 1}"#)
        .unwrap();

    fetcher_for(format!("{}/", server.url()))
        .refresh(&output)
        .await
        .unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["success"], true);
    assert!(written.get("extra").is_none());
}
