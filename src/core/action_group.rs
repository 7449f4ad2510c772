//! Request and response envelopes for the Bedrock Agent action group Lambda.

use crate::core::engine::AnalysisEngine;
use crate::core::workflow;
use crate::domain::ports::{Analyzer, Storage};
use crate::utils::error::AnalysisError;
use crate::utils::validation::{normalize_patient_name, validate_patient_name};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

pub const ACTION_GROUP: &str = "MasterWorkflowActionGroup";
const MESSAGE_VERSION: &str = "1.0";
const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroupEvent {
    #[serde(default)]
    pub action_group: Option<String>,
    #[serde(default)]
    pub api_path: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub request_body: Option<Value>,
    /// Direct invocations outside an agent pass the name at the top level.
    #[serde(default, rename = "patient_name")]
    pub patient_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Analyze,
    ListPatients,
    Health,
    Unknown,
}

impl ActionGroupEvent {
    pub fn api_path(&self) -> &str {
        self.api_path.as_deref().unwrap_or("/analyze")
    }

    pub fn http_method(&self) -> String {
        self.http_method
            .as_deref()
            .unwrap_or("POST")
            .to_ascii_uppercase()
    }

    pub fn route(&self) -> Route {
        match (self.http_method().as_str(), self.api_path()) {
            ("POST", "/analyze") => Route::Analyze,
            ("GET", "/patients") => Route::ListPatients,
            ("GET", "/health") => Route::Health,
            _ => Route::Unknown,
        }
    }

    /// Looks in the JSON request body, then a bare `patient_name` on the body,
    /// then the API parameters.
    pub fn patient_name(&self) -> Option<String> {
        let body = self.request_body.as_ref();
        body.and_then(|b| b.pointer("/content/application~1json"))
            .and_then(name_from_content)
            .or_else(|| body.and_then(|b| non_empty(b.get("patient_name"))))
            .or_else(|| {
                self.parameters
                    .iter()
                    .find(|p| p.name == "patient_name")
                    .and_then(|p| non_empty(Some(&p.value)))
            })
            .or_else(|| self.patient_name.clone().filter(|n| !n.trim().is_empty()))
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn name_from_content(content: &Value) -> Option<String> {
    match content {
        Value::String(raw) => {
            let parsed: Value = serde_json::from_str(raw).ok()?;
            non_empty(parsed.get("patient_name"))
        }
        Value::Object(map) => match map.get("properties").and_then(Value::as_array) {
            Some(properties) => properties
                .iter()
                .find(|p| p.get("name").and_then(Value::as_str) == Some("patient_name"))
                .and_then(|p| non_empty(p.get("value"))),
            None => non_empty(map.get("patient_name")),
        },
        _ => None,
    }
}

/// Wraps `body` in the envelope Bedrock Agents expect back from an action group.
pub fn envelope(event: &ActionGroupEvent, status: u16, body: &Value) -> Value {
    json!({
        "messageVersion": MESSAGE_VERSION,
        "response": {
            "actionGroup": event.action_group.as_deref().unwrap_or(ACTION_GROUP),
            "apiPath": event.api_path(),
            "httpMethod": event.http_method(),
            "httpStatusCode": status,
            "responseBody": {
                "application/json": {
                    "body": body.to_string()
                }
            }
        }
    })
}

pub fn status_for_error(error: &AnalysisError) -> u16 {
    match error {
        AnalysisError::PatientNotFound { .. } => 404,
        AnalysisError::DataValidation { .. } => 400,
        _ => 500,
    }
}

pub fn error_envelope(event: &ActionGroupEvent, error: &AnalysisError) -> Value {
    let body = json!({
        "success": false,
        "error": error.user_friendly_message(),
        "error_category": format!("{:?}", error.category()),
        "recovery_suggestion": error.recovery_suggestion(),
    });
    envelope(event, status_for_error(error), &body)
}

/// 400 envelope for a payload that does not deserialize as an action group event.
pub fn malformed_event_envelope(error: &serde_json::Error) -> Value {
    envelope(
        &ActionGroupEvent::default(),
        400,
        &json!({
            "success": false,
            "error": format!("Malformed action group event: {}", error),
        }),
    )
}

pub struct ActionGroupHandler<S: Storage, A: Analyzer> {
    engine: AnalysisEngine<S, A>,
    list_limit: usize,
}

impl<S: Storage, A: Analyzer> ActionGroupHandler<S, A> {
    pub fn new(engine: AnalysisEngine<S, A>) -> Self {
        Self {
            engine,
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }

    pub async fn handle(&self, event: &ActionGroupEvent) -> Value {
        tracing::info!(
            "Action group request: {} {}",
            event.http_method(),
            event.api_path()
        );

        match event.route() {
            Route::Health => envelope(
                event,
                200,
                &json!({
                    "status": "healthy",
                    "workflow_type": self.engine.pipeline().workflow_type().as_str(),
                    "timestamp": Utc::now().to_rfc3339(),
                }),
            ),
            Route::ListPatients => {
                let pipeline = self.engine.pipeline();
                match workflow::list_patients(
                    pipeline.records(),
                    &pipeline.settings().records_prefix,
                    Some(self.list_limit),
                )
                .await
                {
                    Ok(patients) => envelope(
                        event,
                        200,
                        &json!({ "count": patients.len(), "patients": patients }),
                    ),
                    Err(e) => error_envelope(event, &e),
                }
            }
            Route::Analyze => self.analyze(event).await,
            Route::Unknown => {
                tracing::warn!("Unknown action group route");
                envelope(
                    event,
                    404,
                    &json!({
                        "success": false,
                        "error": format!("Unknown operation: {} {}", event.http_method(), event.api_path()),
                    }),
                )
            }
        }
    }

    async fn analyze(&self, event: &ActionGroupEvent) -> Value {
        let Some(name) = event.patient_name() else {
            return envelope(
                event,
                400,
                &json!({ "success": false, "error": "patient_name is required" }),
            );
        };
        if let Err(reason) = validate_patient_name(&name) {
            return envelope(event, 400, &json!({ "success": false, "error": reason }));
        }

        match self.engine.run(&normalize_patient_name(&name)).await {
            Ok(outcome) => envelope(
                event,
                200,
                &json!({
                    "success": true,
                    "patient_id": outcome.patient_id,
                    "patient_name": outcome.patient_name,
                    "medical_summary": outcome.medical_summary,
                    "research_analysis": outcome.research_analysis,
                    "report_s3_key": outcome.s3_key,
                    "workflow_id": outcome.workflow_id,
                    "duration_seconds": outcome.duration_seconds,
                }),
            ),
            Err(e) => error_envelope(event, &e),
        }
    }
}
