mod common;

use common::{FakeModel, MockStorage};
use med_record_analysis::{
    ActionGroupEvent, ActionGroupHandler, AnalysisEngine, AnalysisPipeline, BedrockAnalyzer, LocalAnalyzer,
    PipelineSettings,
};
use serde_json::{json, Value};
use std::time::Duration;

async fn handler(storage: &MockStorage) -> ActionGroupHandler<MockStorage, LocalAnalyzer> {
    let pipeline = AnalysisPipeline::new(
        storage.clone(),
        storage.clone(),
        LocalAnalyzer::new("us-east-1"),
        PipelineSettings::default(),
    );
    ActionGroupHandler::new(AnalysisEngine::new(pipeline, Duration::from_secs(30)))
}

fn event(value: Value) -> ActionGroupEvent {
    serde_json::from_value(value).unwrap()
}

fn status_and_body(response: &Value) -> (u64, Value) {
    let status = response["response"]["httpStatusCode"].as_u64().unwrap();
    let body = response["response"]["responseBody"]["application/json"]["body"]
        .as_str()
        .unwrap();
    (status, serde_json::from_str(body).unwrap())
}

#[tokio::test]
async fn test_analyze_through_agent_envelope() {
    let storage = MockStorage::with_records().await;
    let handler = handler(&storage).await;

    let response = handler
        .handle(&event(json!({
            "messageVersion": "1.0",
            "actionGroup": "MasterWorkflowActionGroup",
            "apiPath": "/analyze",
            "httpMethod": "POST",
            "requestBody": {"content": {"application/json": {"properties": [
                {"name": "patient_name", "type": "string", "value": "john doe"}
            ]}}}
        })))
        .await;

    assert_eq!(response["messageVersion"], "1.0");
    assert_eq!(response["response"]["apiPath"], "/analyze");
    let (status, body) = status_and_body(&response);
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["patient_id"], "TEST_P001");
    assert_eq!(body["patient_name"], "John Doe");
    let key = body["report_s3_key"].as_str().unwrap();
    assert!(key.starts_with("analysis-reports/patient-TEST_P001/local-analysis-"));
    assert!(storage.get_file(key).await.is_some());
}

#[tokio::test]
async fn test_missing_patient_name_is_bad_request() {
    let storage = MockStorage::with_records().await;
    let handler = handler(&storage).await;

    let response = handler
        .handle(&event(json!({"apiPath": "/analyze", "httpMethod": "POST"})))
        .await;
    let (status, body) = status_and_body(&response);
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);

    let response = handler
        .handle(&event(json!({"apiPath": "/analyze", "httpMethod": "POST", "patient_name": "X"})))
        .await;
    assert_eq!(status_and_body(&response).0, 400);
}

#[tokio::test]
async fn test_unknown_patient_is_not_found() {
    let storage = MockStorage::with_records().await;
    let handler = handler(&storage).await;

    let response = handler
        .handle(&event(json!({
            "apiPath": "/analyze",
            "httpMethod": "POST",
            "parameters": [{"name": "patient_name", "type": "string", "value": "Zed Quux"}]
        })))
        .await;
    let (status, body) = status_and_body(&response);
    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("Zed Quux"));
}

#[tokio::test]
async fn test_patients_and_health_routes() {
    let storage = MockStorage::with_records().await;
    let handler = handler(&storage).await;

    let response = handler
        .handle(&event(json!({"apiPath": "/patients", "httpMethod": "GET"})))
        .await;
    let (status, body) = status_and_body(&response);
    assert_eq!(status, 200);
    assert_eq!(body["count"], 2);
    assert_eq!(body["patients"][1]["patient_id"], "TEST_P001");

    let response = handler
        .handle(&event(json!({"apiPath": "/health", "httpMethod": "GET"})))
        .await;
    let (status, body) = status_and_body(&response);
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["workflow_type"], "local");

    let response = handler
        .handle(&event(json!({"apiPath": "/reports", "httpMethod": "DELETE"})))
        .await;
    assert_eq!(status_and_body(&response).0, 404);
}

#[tokio::test]
async fn test_timed_out_analysis_is_server_error() {
    let storage = MockStorage::with_records().await;
    let pipeline = AnalysisPipeline::new(
        storage.clone(),
        storage.clone(),
        BedrockAnalyzer::new(FakeModel::slow("too late", Duration::from_secs(5))),
        PipelineSettings::default(),
    );
    let handler = ActionGroupHandler::new(AnalysisEngine::new(pipeline, Duration::from_millis(50)));

    let response = handler
        .handle(&event(json!({"apiPath": "/analyze", "httpMethod": "POST", "patient_name": "John Doe"})))
        .await;
    let (status, body) = status_and_body(&response);
    assert_eq!(status, 500);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_category"], "System");
}
