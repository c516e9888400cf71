//! Full retraining runs against in-process data and inference servers

use covertype_core::{Dataset, Distributor, LedgerStore, ManualClock, SampleRng};
use covertype_pipeline::table::{PREPROCESSED_TABLE, RAW_TABLE};
use covertype_pipeline::{Pipeline, PipelineConfig};
use covertype_registry::FsRegistry;
use covertype_server::{data_api, http, inference, DataApiState, InferenceState};
use http_body_util::BodyExt;
use hyper::StatusCode;
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tokio::net::TcpListener;

/// 200 rows: even rows are class 1 at low elevation, odd rows class 2 high up
fn covertype_csv() -> String {
    let mut csv = String::from(
        "Elevation,Aspect,Slope,Horizontal_Distance_To_Hydrology,\
Vertical_Distance_To_Hydrology,Horizontal_Distance_To_Roadways,Hillshade_9am,\
Hillshade_Noon,Hillshade_3pm,Horizontal_Distance_To_Fire_Points,Wilderness_Area,\
Soil_Type,Cover_Type\n",
    );
    for i in 0..200 {
        let (elevation, label) = if i % 2 == 0 {
            (2000 + i, 1)
        } else {
            (3500 + i, 2)
        };
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},\"Rawah, North\",C7745,{}\n",
            elevation,
            i % 360,
            i % 30,
            100 + i,
            i % 50,
            1000 + i,
            200,
            220,
            140,
            1500 + i,
            label
        ));
    }
    csv
}

async fn spawn_data_api(ledger_path: &Path) -> String {
    let dataset = Dataset::from_csv_str(&covertype_csv()).unwrap();
    let ledger = LedgerStore::open(ledger_path).unwrap();
    let clock = Arc::new(ManualClock::new(1_700_000_000.0));
    let distributor = Distributor::new(dataset, ledger, clock, SampleRng::new(42));
    let state = Arc::new(DataApiState::new(distributor));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(http::serve(listener, move |req| {
        let state = state.clone();
        async move {
            let (parts, _) = req.into_parts();
            data_api::route(&state, &parts.method, &parts.uri).await
        }
    }));
    format!("http://{}", addr)
}

async fn spawn_inference(registry_dir: &Path) -> String {
    let registry = FsRegistry::new(registry_dir);
    let state = Arc::new(InferenceState::new(Arc::new(registry), "CovertypeModel"));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(http::serve(listener, move |req| {
        let state = state.clone();
        async move {
            let (parts, body) = req.into_parts();
            let body = body.collect().await.unwrap().to_bytes();
            inference::route(&state, &parts.method, parts.uri.path(), body).await
        }
    }));
    format!("http://{}", addr)
}

async fn setup() -> (TempDir, Pipeline, String) {
    let dir = tempdir().unwrap();
    let data_api_url = spawn_data_api(&dir.path().join("timestamps.json")).await;
    let inference_url = spawn_inference(&dir.path().join("registry")).await;
    let config = PipelineConfig {
        data_api_url,
        inference_url: inference_url.clone(),
        tables_dir: dir.path().join("tables"),
        registry_dir: dir.path().join("registry"),
        request_timeout_secs: 5,
        ..PipelineConfig::default()
    };
    (dir, Pipeline::new(config).unwrap(), inference_url)
}

#[tokio::test]
async fn test_run_collects_trains_and_reloads() {
    let (_dir, pipeline, inference_url) = setup().await;

    let summary = pipeline.run_once().await.unwrap();
    assert_eq!(summary.groups_collected, 10);
    assert_eq!(summary.groups_exhausted, 0);
    // 10 groups of 20 rows, 2 sampled from each
    assert_eq!(summary.raw_rows, 20);
    assert_eq!(summary.preprocessed_rows, 20);
    let training = summary.training.expect("training ran");
    assert_eq!(training.candidates.len(), 3);
    assert_eq!(training.promoted.map(|(version, _)| version), Some(1));
    assert!(summary.notified);

    let raw = pipeline.tables().read(RAW_TABLE).unwrap().unwrap();
    assert_eq!(raw.header.len(), 13);
    assert_eq!(raw.rows.len(), 20);
    assert!(raw.rows.iter().all(|row| row[10] == "Rawah, North"));
    let prepared = pipeline.tables().read(PREPROCESSED_TABLE).unwrap().unwrap();
    assert_eq!(prepared.header.len(), 11);

    let response = reqwest::Client::new()
        .post(format!("{}/predict/", inference_url))
        .json(&serde_json::json!({
            "Elevation": 2050.0,
            "Aspect": 10.0,
            "Slope": 5.0,
            "Horizontal_Distance_To_Hydrology": 150.0,
            "Vertical_Distance_To_Hydrology": 10.0,
            "Horizontal_Distance_To_Roadways": 1050.0,
            "Hillshade_9am": 200.0,
            "Hillshade_Noon": 220.0,
            "Hillshade_3pm": 140.0,
            "Horizontal_Distance_To_Fire_Points": 1550.0
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), StatusCode::OK.as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["model"], "CovertypeModel");
    assert!(body["prediction"].is_i64());
}

#[tokio::test]
async fn test_second_run_replaces_tables() {
    let (_dir, pipeline, _) = setup().await;

    pipeline.run_once().await.unwrap();
    let summary = pipeline.run_once().await.unwrap();
    assert_eq!(summary.raw_rows, 20);
    let raw = pipeline.tables().read(RAW_TABLE).unwrap().unwrap();
    assert_eq!(raw.rows.len(), 20);

    let model = pipeline.registry().model("CovertypeModel").unwrap();
    assert_eq!(model.versions.len(), 2);
    assert_eq!(model.production().map(|v| v.version), Some(2));
}

#[tokio::test]
async fn test_exhausted_groups_are_skipped() {
    let dir = tempdir().unwrap();
    let ledger_path = dir.path().join("timestamps.json");
    let exhausted: serde_json::Map<String, serde_json::Value> = (1..=10)
        .map(|g| (g.to_string(), serde_json::json!([1_700_000_000.0, 10])))
        .collect();
    std::fs::write(&ledger_path, serde_json::to_string(&exhausted).unwrap()).unwrap();

    let data_api_url = spawn_data_api(&ledger_path).await;
    let inference_url = spawn_inference(&dir.path().join("registry")).await;
    let pipeline = Pipeline::new(PipelineConfig {
        data_api_url,
        inference_url,
        tables_dir: dir.path().join("tables"),
        registry_dir: dir.path().join("registry"),
        request_timeout_secs: 5,
        ..PipelineConfig::default()
    })
    .unwrap();

    let summary = pipeline.run_once().await.unwrap();
    assert_eq!(summary.groups_exhausted, 10);
    assert_eq!(summary.raw_rows, 0);
    assert_eq!(summary.training, None);
    // Nothing in Production, so the reload is refused
    assert!(!summary.notified);

    let prepared = pipeline.tables().read(PREPROCESSED_TABLE).unwrap().unwrap();
    assert!(prepared.is_empty());
}

#[tokio::test]
async fn test_unreachable_data_api_fails_run() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(PipelineConfig {
        data_api_url: "http://127.0.0.1:1".to_string(),
        inference_url: "http://127.0.0.1:1".to_string(),
        tables_dir: dir.path().join("tables"),
        registry_dir: dir.path().join("registry"),
        request_timeout_secs: 2,
        ..PipelineConfig::default()
    })
    .unwrap();
    assert!(pipeline.run_once().await.is_err());
}
