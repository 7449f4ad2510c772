//! The four-step analysis workflow and its Bedrock Agent variant.

use crate::config::toml_config::AppConfig;
use crate::core::report::{self, ReportInput};
use crate::core::{resolver, xml_parser};
use crate::domain::model::{AnalysisOutcome, PatientData, PatientListing, WorkflowType};
use crate::domain::ports::{AgentInvoker, Analyzer, Storage};
use crate::utils::audit;
use crate::utils::error::{AnalysisError, Result};
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub records_prefix: String,
    pub reports_prefix: String,
    pub audit_salt: String,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            records_prefix: config.storage.records_prefix.clone(),
            reports_prefix: config.storage.reports_prefix.clone(),
            audit_salt: config.audit.hash_salt.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Fetch and parse, summarize, research, persist.
pub struct AnalysisPipeline<S: Storage, A: Analyzer> {
    records: S,
    reports: S,
    analyzer: A,
    settings: PipelineSettings,
}

impl<S: Storage, A: Analyzer> AnalysisPipeline<S, A> {
    pub fn new(records: S, reports: S, analyzer: A, settings: PipelineSettings) -> Self {
        Self {
            records,
            reports,
            analyzer,
            settings,
        }
    }

    pub fn workflow_type(&self) -> WorkflowType {
        self.analyzer.workflow_type()
    }

    pub fn records(&self) -> &S {
        &self.records
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn load_patient(&self, patient_name: &str, request_id: &str) -> Result<PatientData> {
        let prefix = &self.settings.records_prefix;
        let key = resolver::locate_record(&self.records, prefix, patient_name).await?;
        audit::log_data_access(
            &audit::search_subject(patient_name, &self.settings.audit_salt),
            "read_patient_record",
            &key,
            request_id,
        );

        let bytes = self.records.read_file(&key).await?;
        let xml = String::from_utf8(bytes)
            .map_err(|e| AnalysisError::xml(format!("Record {} is not valid UTF-8: {}", key, e)))?;
        tracing::info!("Retrieved {} bytes of XML from {}", xml.len(), key);

        let mut patient = xml_parser::parse_patient_record(&xml, patient_name)?;
        if patient.patient_id == xml_parser::UNKNOWN_PATIENT_ID {
            patient.patient_id = resolver::patient_id_from_key(&key, prefix);
        } else if !report::is_safe_segment(&patient.patient_id) {
            tracing::warn!("Record {} has a patient id unusable in storage keys, using the key-derived id", key);
            patient.patient_id = resolver::patient_id_from_key(&key, prefix);
        }
        Ok(patient)
    }

    pub async fn run(&self, patient_name: &str) -> Result<AnalysisOutcome> {
        let request_id = audit::new_request_id();
        let result = self.execute(patient_name, &request_id).await;
        if let Err(e) = &result {
            audit::log_error(
                &audit::search_subject(patient_name, &self.settings.audit_salt),
                "analysis_workflow",
                e,
                &request_id,
            );
        }
        result
    }

    async fn execute(&self, patient_name: &str, request_id: &str) -> Result<AnalysisOutcome> {
        let started = Instant::now();
        let workflow_type = self.workflow_type();
        let workflow_id = report::workflow_id(workflow_type, Utc::now());
        tracing::info!(workflow_id = %workflow_id, "Starting {} analysis workflow", workflow_type.as_str());

        tracing::info!("Step 1/4: Retrieving patient record");
        let patient = self.load_patient(patient_name, request_id).await?;
        audit::log_processing_start(&patient.patient_id, workflow_type.as_str(), request_id);

        tracing::info!("Step 2/4: Generating medical summary");
        let summary = self.analyzer.summarize(&patient).await?;

        tracing::info!("Step 3/4: Generating research analysis");
        let research = self.analyzer.research(&patient, &summary).await?;

        tracing::info!("Step 4/4: Persisting report");
        let model_info = self.analyzer.model_info();
        let generated_at = Utc::now();
        let report = report::build_report(
            ReportInput {
                workflow_id: &workflow_id,
                workflow_type,
                patient: &patient,
                summary: &summary,
                research: &research,
                model_info: &model_info,
            },
            generated_at,
        );
        let key = report::report_key(
            &self.settings.reports_prefix,
            &patient.patient_id,
            workflow_type.analysis_kind(),
            &report::timestamp(generated_at),
            &report.report_id,
        );
        let body = serde_json::to_vec_pretty(&report)?;
        self.reports.write_file(&key, &body).await?;
        audit::log_data_access(&patient.patient_id, "write_report", &key, request_id);
        tracing::info!("Report saved to {}", key);

        let elapsed = started.elapsed();
        audit::log_processing_complete(&patient.patient_id, workflow_type.as_str(), elapsed, request_id);

        Ok(AnalysisOutcome {
            success: true,
            workflow_id,
            patient_id: patient.patient_id,
            patient_name: patient.name,
            medical_summary: summary.text,
            research_analysis: research.text,
            report,
            s3_key: key,
            duration_seconds: elapsed.as_secs_f64(),
            model_info,
        })
    }
}

/// Patient records under `prefix`, at most `limit` of them.
pub async fn list_patients<S: Storage>(
    storage: &S,
    prefix: &str,
    limit: Option<usize>,
) -> Result<Vec<PatientListing>> {
    let keys = storage.list_keys(prefix).await?;
    let patients: Vec<PatientListing> = keys
        .iter()
        .filter(|key| key.ends_with(".xml"))
        .take(limit.unwrap_or(usize::MAX))
        .map(|key| PatientListing {
            name: resolver::display_name_from_key(key),
            patient_id: resolver::patient_id_from_key(key, prefix),
            s3_key: key.clone(),
        })
        .collect();
    tracing::info!("Found {} patient records under '{}'", patients.len(), prefix);
    Ok(patients)
}

#[derive(Debug)]
pub enum AgentRunResult {
    /// The agent's own result, with workflow metadata added.
    Agent(Value),
    /// The agent was denied access and the direct workflow ran instead.
    Fallback(AnalysisOutcome),
}

/// Structured agent result: the completion as a JSON object when it parses as
/// one, otherwise the raw text.
pub fn agent_result(completion: &str, patient_name: &str, duration_seconds: f64, workflow_id: &str) -> Value {
    let mut value = match serde_json::from_str::<Value>(completion) {
        Ok(Value::Object(map)) => Value::Object(map),
        _ => json!({
            "raw_response": completion,
            "patient_name": patient_name,
        }),
    };
    if let Some(map) = value.as_object_mut() {
        map.insert("duration_seconds".to_string(), json!(duration_seconds));
        map.insert(
            "workflow_type".to_string(),
            json!(WorkflowType::BedrockAgent.as_str()),
        );
        map.insert("workflow_id".to_string(), json!(workflow_id));
    }
    value
}

/// Runs the analysis through a Bedrock Agent, falling back to the direct
/// pipeline when the agent cannot reach its action group.
pub struct AgentWorkflow<G: AgentInvoker, S: Storage, A: Analyzer> {
    agent: G,
    fallback: Option<AnalysisPipeline<S, A>>,
}

impl<G: AgentInvoker, S: Storage, A: Analyzer> AgentWorkflow<G, S, A> {
    pub fn new(agent: G, fallback: Option<AnalysisPipeline<S, A>>) -> Self {
        Self { agent, fallback }
    }

    pub async fn run(&self, patient_name: &str) -> Result<AgentRunResult> {
        let started = Instant::now();
        let workflow_id = report::workflow_id(WorkflowType::BedrockAgent, Utc::now());
        let session_id = uuid::Uuid::new_v4().to_string();
        let input = format!("Analyze medical records for patient: {}", patient_name);
        tracing::info!(workflow_id = %workflow_id, "Starting Bedrock Agent workflow");

        match self.agent.invoke_agent(&input, &session_id).await {
            Ok(completion) => {
                let duration = started.elapsed().as_secs_f64();
                tracing::info!("Agent workflow completed in {:.2}s", duration);
                Ok(AgentRunResult::Agent(agent_result(
                    &completion,
                    patient_name,
                    duration,
                    &workflow_id,
                )))
            }
            Err(agent_err) if agent_err.is_agent_permission_failure() => {
                let Some(pipeline) = &self.fallback else {
                    return Err(agent_err);
                };
                tracing::warn!("Agent could not invoke its action group, falling back to direct model calls");
                match pipeline.run(patient_name).await {
                    Ok(outcome) => Ok(AgentRunResult::Fallback(outcome)),
                    Err(direct_err) => Err(AnalysisError::agent(
                        "FallbackFailed",
                        format!(
                            "Agent failed: {}; direct workflow also failed: {}",
                            agent_err, direct_err
                        ),
                    )),
                }
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_result_from_json_object() {
        let value = agent_result(r#"{"patient_id":"P1","medical_summary":"ok"}"#, "Jane Smith", 1.5, "WF_1");
        assert_eq!(value["patient_id"], "P1");
        assert_eq!(value["workflow_type"], "bedrock_agent");
        assert_eq!(value["workflow_id"], "WF_1");
        assert_eq!(value["duration_seconds"], 1.5);
        assert!(value.get("raw_response").is_none());
    }

    #[test]
    fn test_agent_result_from_plain_text() {
        let value = agent_result("The patient has hypertension.", "Jane Smith", 0.0, "WF_2");
        assert_eq!(value["raw_response"], "The patient has hypertension.");
        assert_eq!(value["patient_name"], "Jane Smith");
        assert_eq!(value["workflow_type"], "bedrock_agent");

        let value = agent_result("[1, 2]", "Jane Smith", 0.0, "WF_3");
        assert_eq!(value["raw_response"], "[1, 2]");
    }
}
