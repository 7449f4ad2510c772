//! Rule-based condition identification from diagnoses, history and medications.

use crate::domain::model::PatientData;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Mild,
    Moderate,
    High,
}

impl Severity {
    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "high" | "severe" | "critical" => Some(Self::High),
            "moderate" => Some(Self::Moderate),
            "mild" => Some(Self::Mild),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    pub icd_10_code: Option<String>,
    pub severity: Option<Severity>,
    pub status: String,
    pub first_diagnosed: Option<String>,
    pub confidence: f64,
}

const CHRONIC_CONDITIONS: &[&str] = &[
    "diabetes mellitus",
    "diabetes",
    "type 2 diabetes",
    "type 1 diabetes",
    "hypertension",
    "high blood pressure",
    "hyperlipidemia",
    "high cholesterol",
    "coronary artery disease",
    "heart disease",
    "chronic kidney disease",
    "kidney disease",
    "copd",
    "chronic obstructive pulmonary disease",
    "asthma",
    "arthritis",
    "rheumatoid arthritis",
    "osteoarthritis",
    "depression",
    "anxiety",
    "hypothyroidism",
    "hyperthyroidism",
];

const HIGH_SEVERITY_TERMS: &[&str] = &[
    "acute",
    "severe",
    "critical",
    "emergency",
    "crisis",
    "failure",
    "myocardial infarction",
    "stroke",
    "cancer",
    "malignant",
];
const MODERATE_SEVERITY_TERMS: &[&str] = &["chronic", "moderate", "uncontrolled", "complicated"];
const MILD_SEVERITY_TERMS: &[&str] = &["mild", "controlled", "stable", "managed"];

const SYNONYMS: &[(&[&str], &str)] = &[
    (
        &["diabetes", "dm", "diabetes mellitus", "type 2 diabetes", "type 2 diabetes mellitus"],
        "diabetes mellitus",
    ),
    (&["hypertension", "htn", "high blood pressure", "essential hypertension"], "hypertension"),
    (&["hyperlipidemia", "high cholesterol", "dyslipidemia"], "hyperlipidemia"),
    (&["coronary artery disease", "cad", "heart disease"], "coronary artery disease"),
    (&["copd", "chronic obstructive pulmonary disease"], "copd"),
];

const MEDICATION_CONDITIONS: &[(&str, &str)] = &[
    ("metformin", "Diabetes Mellitus"),
    ("insulin", "Diabetes Mellitus"),
    ("glipizide", "Diabetes Mellitus"),
    ("lisinopril", "Hypertension"),
    ("amlodipine", "Hypertension"),
    ("losartan", "Hypertension"),
    ("atenolol", "Hypertension"),
    ("atorvastatin", "Hyperlipidemia"),
    ("simvastatin", "Hyperlipidemia"),
    ("rosuvastatin", "Hyperlipidemia"),
    ("albuterol", "Asthma"),
    ("fluticasone", "Asthma"),
    ("sertraline", "Depression"),
    ("escitalopram", "Depression"),
    ("levothyroxine", "Hypothyroidism"),
    ("omeprazole", "GERD"),
    ("pantoprazole", "GERD"),
];

// (any of these phrases in free text, condition it indicates)
const TEXT_MENTIONS: &[(&[&str], &str)] = &[
    (&["diabetes"], "Diabetes Mellitus"),
    (&["hypertension", "high blood pressure"], "Hypertension"),
    (&["hyperlipidemia", "high cholesterol"], "Hyperlipidemia"),
];

pub fn is_chronic(name: &str) -> bool {
    CHRONIC_CONDITIONS.contains(&name.trim().to_lowercase().as_str())
}

/// Title-cases and expands common abbreviations (`htn` -> `Hypertension`).
pub fn normalize_condition_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| match word.to_lowercase().as_str() {
            "dm" => "Diabetes Mellitus".to_string(),
            "htn" => "Hypertension".to_string(),
            "cad" => "Coronary Artery Disease".to_string(),
            "copd" => "COPD".to_string(),
            lower => {
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn determine_severity(name: &str, explicit: Option<&str>) -> Option<Severity> {
    if let Some(severity) = explicit.and_then(Severity::from_label) {
        return Some(severity);
    }
    let lower = name.to_lowercase();
    let has_any = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));
    if has_any(HIGH_SEVERITY_TERMS) {
        Some(Severity::High)
    } else if has_any(MODERATE_SEVERITY_TERMS) {
        Some(Severity::Moderate)
    } else if has_any(MILD_SEVERITY_TERMS) {
        Some(Severity::Mild)
    } else if is_chronic(name) {
        Some(Severity::Moderate)
    } else {
        None
    }
}

fn canonical_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    SYNONYMS
        .iter()
        .find(|(synonyms, _)| synonyms.contains(&lower.as_str()))
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lower)
}

fn medication_status(status: Option<&str>) -> String {
    match status {
        Some(s) if s.eq_ignore_ascii_case("active") => "active".to_string(),
        _ => "managed".to_string(),
    }
}

/// Conditions for `patient`, merged by synonym and ranked most significant first.
pub fn extract_conditions(patient: &PatientData) -> Vec<Condition> {
    let mut found = Vec::new();

    for diagnosis in &patient.diagnoses {
        if diagnosis.condition.trim().is_empty() {
            continue;
        }
        found.push(Condition {
            name: normalize_condition_name(&diagnosis.condition),
            icd_10_code: diagnosis.icd_10_code.clone(),
            severity: determine_severity(&diagnosis.condition, diagnosis.severity.as_deref()),
            status: diagnosis
                .status
                .as_deref()
                .map(str::to_lowercase)
                .unwrap_or_else(|| "active".to_string()),
            first_diagnosed: diagnosis.diagnosis_date.clone(),
            confidence: 1.0,
        });
    }

    for event in &patient.medical_history {
        let text = event.description.to_lowercase();
        for (phrases, condition) in TEXT_MENTIONS {
            if phrases.iter().any(|p| text.contains(p)) {
                found.push(Condition {
                    name: condition.to_string(),
                    icd_10_code: None,
                    severity: determine_severity(condition, None),
                    status: "active".to_string(),
                    first_diagnosed: event.date.clone(),
                    confidence: 0.7,
                });
            }
        }
    }

    for medication in &patient.medications {
        let status = medication_status(medication.status.as_deref());
        if let Some(indication) = medication.indication.as_deref().filter(|i| !i.trim().is_empty()) {
            let name = normalize_condition_name(indication);
            found.push(Condition {
                severity: determine_severity(&name, None),
                name,
                icd_10_code: None,
                status: status.clone(),
                first_diagnosed: medication.start_date.clone(),
                confidence: 0.8,
            });
        }
        let med = medication.name.to_lowercase();
        for (pattern, condition) in MEDICATION_CONDITIONS {
            if med.contains(pattern) {
                found.push(Condition {
                    name: condition.to_string(),
                    icd_10_code: None,
                    severity: determine_severity(condition, None),
                    status: status.clone(),
                    first_diagnosed: medication.start_date.clone(),
                    confidence: 0.6,
                });
            }
        }
    }

    let mut merged = merge_conditions(found);
    merged.sort_by(|a, b| priority(b).partial_cmp(&priority(a)).unwrap_or(Ordering::Equal));
    tracing::debug!("Identified {} conditions", merged.len());
    merged
}

fn priority(condition: &Condition) -> (u8, u8, f64) {
    let severity = condition.severity.map_or(0, |s| s as u8 + 1);
    let chronic = if is_chronic(&condition.name) || is_chronic(&canonical_name(&condition.name)) {
        2
    } else {
        1
    };
    (severity, chronic, condition.confidence)
}

// Groups keep first-seen order.
fn merge_conditions(conditions: Vec<Condition>) -> Vec<Condition> {
    let mut groups: Vec<(String, Vec<Condition>)> = Vec::new();
    for condition in conditions {
        let key = canonical_name(&condition.name);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push(condition),
            None => groups.push((key, vec![condition])),
        }
    }
    groups.into_iter().filter_map(|(_, group)| merge_group(group)).collect()
}

fn merge_group(group: Vec<Condition>) -> Option<Condition> {
    let count = group.len() as f64;
    let base = group
        .iter()
        .max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(Ordering::Equal))?
        .clone();
    if group.len() == 1 {
        return Some(base);
    }

    let first_diagnosed = group
        .iter()
        .filter_map(|c| c.first_diagnosed.clone())
        .min()
        .or(base.first_diagnosed.clone());
    let severity = group.iter().filter_map(|c| c.severity).max().or(base.severity);
    let icd_10_code = group
        .iter()
        .find_map(|c| c.icd_10_code.clone())
        .or(base.icd_10_code.clone());
    let confidence = (group.iter().map(|c| c.confidence).sum::<f64>() / count).min(1.0);

    Some(Condition {
        first_diagnosed,
        severity,
        icd_10_code,
        confidence,
        ..base
    })
}
