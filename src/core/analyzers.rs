//! The two ways of producing report text: Claude on Bedrock, or local rules.

use crate::core::conditions::{self, Condition};
use crate::core::prompts;
use crate::core::research::{self, ResearchFinding, CATALOGUE};
use crate::domain::model::{GeneratedText, ModelInfo, PatientData, WorkflowType};
use crate::domain::ports::{Analyzer, ModelInvoker};
use crate::utils::error::{AnalysisError, Result};
use async_trait::async_trait;
use chrono::Utc;

pub struct BedrockAnalyzer<M: ModelInvoker> {
    model: M,
}

impl<M: ModelInvoker> BedrockAnalyzer<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<M: ModelInvoker> Analyzer for BedrockAnalyzer<M> {
    async fn summarize(&self, patient: &PatientData) -> Result<GeneratedText> {
        let prompt = prompts::summary_prompt(patient);
        let response = self
            .model
            .invoke(&prompt, Some(prompts::SUMMARY_SYSTEM_PROMPT))
            .await?;
        tracing::info!(
            "Medical summary generated ({} characters, {} output tokens)",
            response.text.len(),
            response.usage.output_tokens
        );

        Ok(GeneratedText {
            text: response.text,
            generated_by: response.model_id,
            generated_at: Utc::now(),
            token_usage: Some(response.usage),
        })
    }

    async fn research(&self, patient: &PatientData, summary: &GeneratedText) -> Result<GeneratedText> {
        let prompt = prompts::research_prompt(&summary.text);
        tracing::debug!(
            "Research prompt for {}: {} chars",
            patient.patient_id,
            prompt.len()
        );
        let response = self
            .model
            .invoke(&prompt, Some(prompts::RESEARCH_SYSTEM_PROMPT))
            .await?;
        tracing::info!("Research analysis generated ({} characters)", response.text.len());

        Ok(GeneratedText {
            text: response.text,
            generated_by: response.model_id,
            generated_at: Utc::now(),
            token_usage: Some(response.usage),
        })
    }

    fn model_info(&self) -> ModelInfo {
        self.model.model_info()
    }

    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Bedrock
    }
}

pub const LOCAL_MODEL_ID: &str = "local-rule-based";

/// Offline analysis from the condition rules and the reference catalogue.
pub struct LocalAnalyzer {
    region: String,
}

impl LocalAnalyzer {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

fn join_natural(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{} and {}", a, b),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

pub fn narrative_summary(patient: &PatientData, conditions: &[Condition]) -> String {
    let demographics = &patient.demographics;
    let mut intro = format!("{} is a", patient.name);
    if let Some(age) = demographics.age {
        intro.push_str(&format!(" {}-year-old", age));
    }
    if let Some(gender) = &demographics.gender {
        intro.push_str(&format!(" {}", gender.to_lowercase()));
    }
    intro.push_str(" patient");

    let mut sections = Vec::new();
    let names: Vec<String> = conditions.iter().take(10).map(|c| c.name.clone()).collect();
    if names.is_empty() {
        sections.push(format!("{} with no documented conditions.", intro));
    } else {
        sections.push(format!(
            "{} with a medical history significant for {}.",
            intro,
            join_natural(&names)
        ));
    }

    let medications: Vec<String> = patient
        .medications
        .iter()
        .take(20)
        .map(|m| {
            let mut line = m.name.clone();
            if let Some(dosage) = &m.dosage {
                line.push_str(&format!(" {}", dosage));
            }
            if let Some(indication) = &m.indication {
                line.push_str(&format!(" for {}", indication));
            }
            line
        })
        .collect();
    if !medications.is_empty() {
        sections.push(format!("Current medications include {}.", join_natural(&medications)));
    }

    let procedures: Vec<String> = patient
        .procedures
        .iter()
        .take(15)
        .map(|p| match &p.date {
            Some(date) => format!("{} ({})", p.name, date),
            None => p.name.clone(),
        })
        .collect();
    if !procedures.is_empty() {
        sections.push(format!("Documented procedures include {}.", join_natural(&procedures)));
    }

    let events: Vec<String> = patient
        .medical_history
        .iter()
        .take(10)
        .map(|e| e.description.to_lowercase())
        .collect();
    if !events.is_empty() {
        sections.push(format!("Recent medical events include {}.", join_natural(&events)));
    }

    let chronic: Vec<String> = conditions
        .iter()
        .filter(|c| conditions::is_chronic(&c.name))
        .map(|c| c.name.clone())
        .collect();
    if !chronic.is_empty() {
        sections.push(format!(
            "Chronic condition management focuses on {}.",
            join_natural(&chronic)
        ));
    }

    let mut key_conditions = String::from("Key conditions:");
    for condition in conditions.iter().take(10) {
        key_conditions.push_str(&format!(
            "\n- {} (severity: {}, confidence: {:.2})",
            condition.name,
            condition.severity.map_or("unknown", |s| s.as_str()),
            condition.confidence
        ));
    }
    if conditions.is_empty() {
        key_conditions.push_str("\n- None identified");
    }
    sections.push(key_conditions);

    sections.join("\n\n")
}

pub fn research_text(findings: &[ResearchFinding]) -> String {
    if findings.is_empty() {
        return "No relevant research was found for the identified conditions.".to_string();
    }

    let mut text = format!("Research correlation identified {} relevant papers.\n", findings.len());
    let mut current: Option<&str> = None;
    for finding in findings {
        if current != Some(finding.condition.as_str()) {
            text.push_str(&format!("\n{}\n", finding.condition));
            current = Some(finding.condition.as_str());
        }
        text.push_str(&format!(
            "- {} [{}; relevance {:.2}]\n  {}\n",
            finding.citation, finding.study_type, finding.relevance_score, finding.key_findings
        ));
    }
    text.push_str("\nReferences:\n");
    for (i, finding) in findings.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, finding.citation));
    }
    text
}

#[async_trait]
impl Analyzer for LocalAnalyzer {
    async fn summarize(&self, patient: &PatientData) -> Result<GeneratedText> {
        let conditions = conditions::extract_conditions(patient);
        Ok(GeneratedText {
            text: narrative_summary(patient, &conditions),
            generated_by: LOCAL_MODEL_ID.to_string(),
            generated_at: Utc::now(),
            token_usage: None,
        })
    }

    async fn research(&self, patient: &PatientData, _summary: &GeneratedText) -> Result<GeneratedText> {
        let names: Vec<String> = conditions::extract_conditions(patient)
            .into_iter()
            .map(|c| c.name)
            .collect();
        if names.is_empty() && !patient.diagnoses.is_empty() {
            return Err(AnalysisError::Research {
                message: "Diagnoses present but no conditions could be identified".to_string(),
            });
        }
        let findings = research::search(&names, CATALOGUE);
        tracing::info!(
            "Research correlation found {} papers for {} conditions",
            findings.len(),
            names.len()
        );

        Ok(GeneratedText {
            text: research_text(&findings),
            generated_by: LOCAL_MODEL_ID.to_string(),
            generated_at: Utc::now(),
            token_usage: None,
        })
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_id: LOCAL_MODEL_ID.to_string(),
            model_name: "Local Rule-Based Analysis".to_string(),
            provider: "Local".to_string(),
            region: self.region.clone(),
        }
    }

    fn workflow_type(&self) -> WorkflowType {
        WorkflowType::Local
    }
}

/// Analyzer chosen at runtime from the configured mode.
pub enum AnyAnalyzer<M: ModelInvoker> {
    Bedrock(BedrockAnalyzer<M>),
    Local(LocalAnalyzer),
}

#[async_trait]
impl<M: ModelInvoker> Analyzer for AnyAnalyzer<M> {
    async fn summarize(&self, patient: &PatientData) -> Result<GeneratedText> {
        match self {
            Self::Bedrock(a) => a.summarize(patient).await,
            Self::Local(a) => a.summarize(patient).await,
        }
    }

    async fn research(&self, patient: &PatientData, summary: &GeneratedText) -> Result<GeneratedText> {
        match self {
            Self::Bedrock(a) => a.research(patient, summary).await,
            Self::Local(a) => a.research(patient, summary).await,
        }
    }

    fn model_info(&self) -> ModelInfo {
        match self {
            Self::Bedrock(a) => a.model_info(),
            Self::Local(a) => a.model_info(),
        }
    }

    fn workflow_type(&self) -> WorkflowType {
        match self {
            Self::Bedrock(a) => a.workflow_type(),
            Self::Local(a) => a.workflow_type(),
        }
    }
}
