//! Report identifiers, layout and storage keys.

use crate::core::quality;
use crate::domain::model::{
    AnalysisReport, DataSummary, GeneratedText, ModelInfo, PatientData, PatientInfo, ReportMetadata,
    WorkflowType,
};
use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

pub fn workflow_id(workflow_type: WorkflowType, now: DateTime<Utc>) -> String {
    format!("{}_{}", workflow_type.id_prefix(), timestamp(now))
}

/// `RPT_{timestamp}_{last 8 chars of the workflow id}`.
pub fn report_id(workflow_id: &str, now: DateTime<Utc>) -> String {
    let chars: Vec<char> = workflow_id.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(8)..].iter().collect();
    format!("RPT_{}_{}", timestamp(now), tail)
}

const MAX_SEGMENT_LEN: usize = 128;

/// True when `id` can be used as a single storage key segment as is.
pub fn is_safe_segment(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SEGMENT_LEN
        && !id.contains("..")
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// `id` reduced to a single key segment: separators, control and other
/// unexpected characters become `_`, and `..` runs are broken up.
pub fn safe_segment(id: &str) -> String {
    let mapped: String = id
        .chars()
        .take(MAX_SEGMENT_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let mut segment = mapped;
    while segment.contains("..") {
        segment = segment.replace("..", "_");
    }
    if segment.is_empty() || segment == "." {
        return "unknown".to_string();
    }
    segment
}

/// Key of a stored report. The patient id is always reduced to one segment.
pub fn report_key(
    reports_prefix: &str,
    patient_id: &str,
    analysis_kind: &str,
    timestamp: &str,
    report_id: &str,
) -> String {
    format!(
        "{}/patient-{}/{}-{}-{}.json",
        reports_prefix.trim_end_matches('/'),
        safe_segment(patient_id),
        analysis_kind,
        timestamp,
        report_id
    )
}

pub struct ReportInput<'a> {
    pub workflow_id: &'a str,
    pub workflow_type: WorkflowType,
    pub patient: &'a PatientData,
    pub summary: &'a GeneratedText,
    pub research: &'a GeneratedText,
    pub model_info: &'a ModelInfo,
}

pub fn build_report(input: ReportInput<'_>, now: DateTime<Utc>) -> AnalysisReport {
    let patient = input.patient;
    AnalysisReport {
        report_id: report_id(input.workflow_id, now),
        workflow_id: input.workflow_id.to_string(),
        generated_at: now,
        patient_info: PatientInfo {
            patient_id: patient.patient_id.clone(),
            name: patient.name.clone(),
            age: patient.demographics.age,
            gender: patient.demographics.gender.clone(),
            date_of_birth: patient.demographics.date_of_birth.clone(),
        },
        medical_summary: input.summary.clone(),
        research_analysis: input.research.clone(),
        data_summary: DataSummary {
            total_medications: patient.medications.len(),
            total_diagnoses: patient.diagnoses.len(),
            total_procedures: patient.procedures.len(),
            total_medical_events: patient.medical_history.len(),
        },
        quality: quality::assess(patient, input.summary, input.research),
        metadata: ReportMetadata {
            workflow_type: input.workflow_type.report_label().to_string(),
            model_provider: input.model_info.provider.clone(),
            model_name: input.model_info.model_name.clone(),
            region: input.model_info.region.clone(),
        },
    }
}
