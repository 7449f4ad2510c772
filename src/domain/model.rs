use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub emergency_contact: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub prescribing_physician: Option<String>,
    pub indication: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub condition: String,
    pub diagnosis_date: Option<String>,
    pub icd_10_code: Option<String>,
    pub severity: Option<String>,
    pub status: Option<String>,
    pub diagnosing_physician: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    pub date: Option<String>,
    pub procedure_code: Option<String>,
    pub performing_physician: Option<String>,
    pub location: Option<String>,
    pub outcome: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalEvent {
    pub date: Option<String>,
    pub event_type: String,
    pub description: String,
    pub provider: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Everything extracted from one patient record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientData {
    pub patient_id: String,
    pub name: String,
    pub demographics: Demographics,
    pub medical_history: Vec<MedicalEvent>,
    pub medications: Vec<Medication>,
    pub procedures: Vec<Procedure>,
    pub diagnoses: Vec<Diagnosis>,
    #[serde(skip)]
    pub raw_xml: String,
    pub extraction_timestamp: DateTime<Utc>,
}

const CHRONIC_MARKERS: &[&str] = &[
    "diabetes",
    "hypertension",
    "asthma",
    "copd",
    "chronic",
    "arthritis",
    "hyperlipidemia",
    "hypothyroidism",
    "heart failure",
    "kidney disease",
    "depression",
];

impl PatientData {
    pub fn new(patient_id: impl Into<String>, name: impl Into<String>, raw_xml: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            name: name.into(),
            demographics: Demographics::default(),
            medical_history: Vec::new(),
            medications: Vec::new(),
            procedures: Vec::new(),
            diagnoses: Vec::new(),
            raw_xml: raw_xml.into(),
            extraction_timestamp: Utc::now(),
        }
    }

    /// Returns data quality warnings. An empty list means the record is usable as-is.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.patient_id.trim().is_empty() {
            warnings.push("Patient ID is required".to_string());
        }
        if self.name.trim().is_empty() {
            warnings.push("Patient name is required".to_string());
        }
        if self.raw_xml.trim().is_empty() {
            warnings.push("Raw XML content is required".to_string());
        }
        if let Some(age) = self.demographics.age {
            if age > 150 {
                warnings.push(format!("Invalid age: {}", age));
            }
        }
        for (i, medication) in self.medications.iter().enumerate() {
            if medication.name.trim().is_empty() {
                warnings.push(format!("Medication {}: name is required", i));
            }
            if medication.dosage.as_deref().map_or(true, |d| d.trim().is_empty()) {
                warnings.push(format!("Medication {}: dosage is required", i));
            }
        }
        for (i, diagnosis) in self.diagnoses.iter().enumerate() {
            if diagnosis.condition.trim().is_empty() {
                warnings.push(format!("Diagnosis {}: condition is required", i));
            }
        }

        warnings
    }

    pub fn active_conditions(&self) -> Vec<&Diagnosis> {
        self.diagnoses
            .iter()
            .filter(|d| {
                d.status
                    .as_deref()
                    .map_or(true, |s| s.eq_ignore_ascii_case("active"))
            })
            .collect()
    }

    pub fn chronic_conditions(&self) -> Vec<&Diagnosis> {
        self.diagnoses
            .iter()
            .filter(|d| {
                let condition = d.condition.to_lowercase();
                CHRONIC_MARKERS.iter().any(|m| condition.contains(m))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    Local,
    Bedrock,
    BedrockAgent,
}

impl WorkflowType {
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Local => "LOCAL_WF",
            Self::Bedrock => "BEDROCK_WF",
            Self::BedrockAgent => "BEDROCK_AGENT_WF",
        }
    }

    /// Label stored in report metadata.
    pub fn report_label(&self) -> &'static str {
        match self {
            Self::Local => "local_rule_based_analysis",
            Self::Bedrock | Self::BedrockAgent => "bedrock_claude_analysis",
        }
    }

    /// File name prefix of persisted reports.
    pub fn analysis_kind(&self) -> &'static str {
        match self {
            Self::Local => "local-analysis",
            Self::Bedrock | Self::BedrockAgent => "bedrock-analysis",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Bedrock => "bedrock",
            Self::BedrockAgent => "bedrock_agent",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: String,
    pub usage: TokenUsage,
    pub stop_reason: Option<String>,
    pub model_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub model_name: String,
    pub provider: String,
    pub region: String,
}

/// A generated report section and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedText {
    pub text: String,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
    pub token_usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityStatus {
    Passed,
    PassedWithWarnings,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub completeness: f64,
    pub validation_warnings: Vec<String>,
    pub overall_score: f64,
    pub status: QualityStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub patient_id: String,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSummary {
    pub total_medications: usize,
    pub total_diagnoses: usize,
    pub total_procedures: usize,
    pub total_medical_events: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub workflow_type: String,
    pub model_provider: String,
    pub model_name: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub report_id: String,
    pub workflow_id: String,
    pub generated_at: DateTime<Utc>,
    pub patient_info: PatientInfo,
    pub medical_summary: GeneratedText,
    pub research_analysis: GeneratedText,
    pub data_summary: DataSummary,
    pub quality: QualityReport,
    pub metadata: ReportMetadata,
}

/// Result of a completed four-step analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub success: bool,
    pub workflow_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub medical_summary: String,
    pub research_analysis: String,
    pub report: AnalysisReport,
    pub s3_key: String,
    pub duration_seconds: f64,
    pub model_info: ModelInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientListing {
    pub name: String,
    pub patient_id: String,
    pub s3_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_patient() -> PatientData {
        let mut patient = PatientData::new("P001", "Jane Smith", "<patient/>");
        patient.demographics.age = Some(45);
        patient.medications.push(Medication {
            name: "Metformin".to_string(),
            dosage: Some("500mg".to_string()),
            ..Default::default()
        });
        patient.diagnoses.push(Diagnosis {
            condition: "Type 2 Diabetes".to_string(),
            status: Some("active".to_string()),
            ..Default::default()
        });
        patient.diagnoses.push(Diagnosis {
            condition: "Ankle sprain".to_string(),
            status: Some("resolved".to_string()),
            ..Default::default()
        });
        patient
    }

    #[test]
    fn test_valid_patient_has_no_warnings() {
        assert!(sample_patient().validate().is_empty());
    }

    #[test]
    fn test_validation_warnings() {
        let mut patient = sample_patient();
        patient.demographics.age = Some(200);
        patient.medications[0].dosage = None;
        patient.raw_xml.clear();

        let warnings = patient.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("Invalid age")));
        assert!(warnings.iter().any(|w| w.contains("dosage")));
    }

    #[test]
    fn test_condition_filters() {
        let patient = sample_patient();
        assert_eq!(patient.active_conditions().len(), 1);
        assert_eq!(patient.chronic_conditions()[0].condition, "Type 2 Diabetes");
    }

    #[test]
    fn test_raw_xml_not_serialized() {
        let json = serde_json::to_value(sample_patient()).unwrap();
        assert!(json.get("raw_xml").is_none());
        assert_eq!(json["patient_id"], "P001");
    }

    #[test]
    fn test_quality_status_serialization() {
        assert_eq!(
            serde_json::to_value(QualityStatus::PassedWithWarnings).unwrap(),
            "PASSED_WITH_WARNINGS"
        );
    }
}
