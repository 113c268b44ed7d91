#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use spectrum_backend_client::HttpMiningBackend;
use spectrum_core::BackendError;
use spectrum_core::CaseFilter;
use spectrum_core::MiningBackend;
use spectrum_core::Scope;
use spectrum_core::Session;
use spectrum_core::SpectrumConfig;
use spectrum_core::Snapshot;
use spectrum_core::build_full_payload;
use spectrum_core::config::BackendConfig;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;

fn backend_for(server: &MockServer) -> HttpMiningBackend {
    HttpMiningBackend::new(&BackendConfig {
        base_url: server.uri(),
        request_timeout_secs: 5,
    })
    .expect("client")
}

fn mined_body() -> Value {
    json!({
        "spectra": [{
            "records": [{"case_ID": "c1", "start": 0}, {"case_ID": 7, "start": 3}],
            "empty": false,
            "statistics": {},
            "metadata": {}
        }],
        "event_log": {"id": 2}
    })
}

#[tokio::test]
async fn posts_payload_and_decodes_mined_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/event-log/2/mined-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mined_body()))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = Snapshot::default().with_scope(
        Scope::Global,
        vec![CaseFilter::Manual(vec!["c1".into(), "7".into()])],
    );
    let payload = build_full_payload(&snapshot);
    let data = backend_for(&server).mined_data(2, &payload).await.unwrap();

    assert_eq!(data.cases_of_spectrum(0), vec!["c1", "7"]);

    let request = &server.received_requests().await.unwrap()[0];
    let body = request.body_json::<Value>().unwrap();
    assert_eq!(
        body,
        json!({
            "spectra": [{"on": 0, "batches": {}}],
            "global_filters": {"cases": ["c1", "7"], "activities": {}, "time": {}}
        })
    );
}

#[tokio::test]
async fn invalid_metadata_maps_to_not_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/event-log/5/data"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"detail": {"err": "invalid_metadata", "id": 5}})),
        )
        .mount(&server)
        .await;

    let err = backend_for(&server).event_log_data(5).await.unwrap_err();

    assert_eq!(
        err,
        BackendError::NotConfigured {
            event_log_id: Some(json!(5))
        }
    );
}

#[tokio::test]
async fn unknown_route_maps_to_not_found() {
    let server = MockServer::start().await;

    let err = backend_for(&server).event_log_data(1).await.unwrap_err();

    assert_eq!(
        err,
        BackendError::NotFound {
            resource: "/api/event-log/1/data".into()
        }
    );
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/event-log/1/mined-data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let payload = build_full_payload(&Snapshot::default());
    let err = backend_for(&server).mined_data(1, &payload).await.unwrap_err();

    assert!(matches!(err, BackendError::Decode(_)));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let backend = HttpMiningBackend::new(&BackendConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        request_timeout_secs: 1,
    })
    .expect("client");

    let err = backend.event_log_data(1).await.unwrap_err();

    assert!(matches!(err, BackendError::Transport(_)));
}

#[tokio::test]
async fn download_reports_missing_export() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download/gone.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "File not found"})))
        .mount(&server)
        .await;

    let err = backend_for(&server).download("gone.zip").await.unwrap_err();

    assert!(matches!(err, BackendError::NotFound { .. }));
}

#[tokio::test]
async fn session_exports_through_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/event-log/2/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 2})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/event-log/2/mined-data/export"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("log_2_export.zip")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/download/log_2_export.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .set_body_bytes(b"PK\x03\x04".to_vec()),
        )
        .mount(&server)
        .await;

    let config = SpectrumConfig {
        backend: BackendConfig {
            base_url: server.uri(),
            request_timeout_secs: 5,
        },
        ..SpectrumConfig::default()
    };
    let session = Session::new(Arc::new(backend_for(&server)), &config).unwrap();
    let id = session.load_event_log(2).await.unwrap();

    let artifact = session.export(id).await.unwrap();

    assert_eq!(artifact.file_name, "log_2_export.zip");
    assert_eq!(artifact.bytes.as_ref(), b"PK\x03\x04");
}
