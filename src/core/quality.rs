//! Data and output quality scoring attached to every report.

use crate::domain::model::{GeneratedText, PatientData, QualityReport, QualityStatus};

const PASS_THRESHOLD: f64 = 0.8;
const WARN_THRESHOLD: f64 = 0.5;
const WARNINGS_FOR_ZERO: f64 = 10.0;

/// Fraction of the core record sections that are present, in steps of 0.2.
pub fn data_completeness(patient: &PatientData) -> f64 {
    let checks = [
        patient.demographics.age.is_some(),
        patient.demographics.gender.is_some(),
        !patient.medications.is_empty(),
        !patient.diagnoses.is_empty(),
        !patient.procedures.is_empty() || !patient.medical_history.is_empty(),
    ];
    let present = checks.iter().filter(|c| **c).count();
    (present as f64 * 0.2).min(1.0)
}

fn text_score(summary: &GeneratedText, research: &GeneratedText) -> f64 {
    let present = [summary, research]
        .iter()
        .filter(|t| !t.text.trim().is_empty())
        .count();
    present as f64 / 2.0
}

pub fn status_for(score: f64) -> QualityStatus {
    if score >= PASS_THRESHOLD {
        QualityStatus::Passed
    } else if score >= WARN_THRESHOLD {
        QualityStatus::PassedWithWarnings
    } else {
        QualityStatus::Failed
    }
}

pub fn assess(patient: &PatientData, summary: &GeneratedText, research: &GeneratedText) -> QualityReport {
    let completeness = data_completeness(patient);
    let validation_warnings = patient.validate();
    let validation_score = (1.0 - validation_warnings.len() as f64 / WARNINGS_FOR_ZERO).max(0.0);
    let overall_score = (completeness + validation_score + text_score(summary, research)) / 3.0;
    let status = status_for(overall_score);

    if status != QualityStatus::Passed {
        tracing::warn!(
            "Quality check for {}: {:?} (score {:.2}, {} warnings)",
            patient.patient_id,
            status,
            overall_score,
            validation_warnings.len()
        );
    }

    QualityReport {
        completeness,
        validation_warnings,
        overall_score,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Diagnosis, Medication};
    use chrono::Utc;

    fn text(s: &str) -> GeneratedText {
        GeneratedText {
            text: s.to_string(),
            generated_by: "test".to_string(),
            generated_at: Utc::now(),
            token_usage: None,
        }
    }

    #[test]
    fn test_completeness_steps() {
        let mut patient = PatientData::new("P1", "Jane Smith", "<x/>");
        assert_eq!(data_completeness(&patient), 0.0);

        patient.demographics.age = Some(40);
        patient.demographics.gender = Some("Female".to_string());
        assert!((data_completeness(&patient) - 0.4).abs() < 1e-9);

        patient.diagnoses.push(Diagnosis {
            condition: "Asthma".to_string(),
            ..Default::default()
        });
        patient.medications.push(Medication {
            name: "Albuterol".to_string(),
            dosage: Some("90mcg".to_string()),
            ..Default::default()
        });
        assert!((data_completeness(&patient) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_assess_complete_record_passes() {
        let mut patient = PatientData::new("P1", "Jane Smith", "<x/>");
        patient.demographics.age = Some(40);
        patient.demographics.gender = Some("Female".to_string());
        patient.diagnoses.push(Diagnosis {
            condition: "Asthma".to_string(),
            ..Default::default()
        });

        let report = assess(&patient, &text("summary"), &text("research"));
        assert!(report.validation_warnings.is_empty());
        // (0.6 + 1.0 + 1.0) / 3
        assert!((report.overall_score - 2.6 / 3.0).abs() < 1e-9);
        assert_eq!(report.status, QualityStatus::Passed);
    }

    #[test]
    fn test_assess_empty_output_fails() {
        let patient = PatientData::new("P1", "Jane Smith", "");
        let report = assess(&patient, &text(""), &text("  "));
        assert_eq!(report.validation_warnings.len(), 1);
        assert_eq!(report.status, QualityStatus::Failed);
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(status_for(0.8), QualityStatus::Passed);
        assert_eq!(status_for(0.79), QualityStatus::PassedWithWarnings);
        assert_eq!(status_for(0.5), QualityStatus::PassedWithWarnings);
        assert_eq!(status_for(0.49), QualityStatus::Failed);
    }
}
