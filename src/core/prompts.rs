//! Prompt text sent to the model for the two report sections.

use crate::domain::model::PatientData;
use std::fmt::Write;

const MAX_MEDICATIONS: usize = 20;
const MAX_DIAGNOSES: usize = 20;
const MAX_PROCEDURES: usize = 15;
const MAX_EVENTS: usize = 10;

pub const SUMMARY_SYSTEM_PROMPT: &str = "\
You are an experienced medical analyst reviewing a patient record.
Summarize the record accurately and use standard medical terminology.
Identify the clinically significant conditions, explain what each medication is \
being used for, and call out chronic conditions, ongoing treatment and gaps in care.

Rules:
- Report only what is documented in the record.
- Do not speculate or invent findings.
- Keep conclusions objective and tied to the documented evidence.";

pub const RESEARCH_SYSTEM_PROMPT: &str = "\
You are a clinical research analyst working from evidence-based medicine.
Relate the patient summary to published clinical guidelines (AHA, ADA, ACC, USPSTF) \
and to major trials or meta-analyses, grading the evidence (Level A, B or C) where possible.

Rules:
- Cite only well-established guidelines and research.
- State when evidence is limited or conflicting.
- Separate strong evidence from expert opinion.
- Do not prescribe treatment; defer decisions to the treating physician.";

fn or_unknown(value: Option<&str>) -> &str {
    value.unwrap_or("Unknown")
}

fn list_or<T>(items: &[T], limit: usize, empty: &str, line: impl Fn(&T) -> String) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items
        .iter()
        .take(limit)
        .map(line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn summary_prompt(patient: &PatientData) -> String {
    let demographics = &patient.demographics;
    let age = demographics
        .age
        .map(|a| a.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let medications = list_or(&patient.medications, MAX_MEDICATIONS, "No medications recorded", |m| {
        format!(
            "- {} ({}) - Status: {}",
            m.name,
            or_unknown(m.dosage.as_deref()),
            or_unknown(m.status.as_deref())
        )
    });
    let diagnoses = list_or(&patient.diagnoses, MAX_DIAGNOSES, "No diagnoses recorded", |d| {
        format!(
            "- {} (ICD-10: {}) - Status: {}",
            d.condition,
            d.icd_10_code.as_deref().unwrap_or("N/A"),
            or_unknown(d.status.as_deref())
        )
    });
    let procedures = list_or(&patient.procedures, MAX_PROCEDURES, "No procedures recorded", |p| {
        format!("- {} on {}", p.name, or_unknown(p.date.as_deref()))
    });
    let history = list_or(&patient.medical_history, MAX_EVENTS, "No medical history recorded", |e| {
        format!("- {}: {}", or_unknown(e.date.as_deref()), e.description)
    });

    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Analyze the following patient medical record and write a comprehensive medical summary.\n"
    );
    let _ = writeln!(prompt, "Patient Information:");
    let _ = writeln!(prompt, "- Name: {}", patient.name);
    let _ = writeln!(prompt, "- Age: {}", age);
    let _ = writeln!(prompt, "- Gender: {}", or_unknown(demographics.gender.as_deref()));
    let _ = writeln!(
        prompt,
        "- Date of Birth: {}\n",
        or_unknown(demographics.date_of_birth.as_deref())
    );
    let _ = writeln!(prompt, "Medications ({} total):\n{}\n", patient.medications.len(), medications);
    let _ = writeln!(
        prompt,
        "Diagnoses/Conditions ({} total):\n{}\n",
        patient.diagnoses.len(),
        diagnoses
    );
    let _ = writeln!(prompt, "Procedures ({} total):\n{}\n", patient.procedures.len(), procedures);
    let _ = writeln!(
        prompt,
        "Medical History ({} events):\n{}\n",
        patient.medical_history.len(),
        history
    );
    prompt.push_str(
        "Include:
1. A narrative summary of the patient's medical history
2. The 5-10 most significant medical conditions
3. The current medication regimen and the purpose of each medication
4. Notable procedures or interventions
5. An overall health status assessment
6. Patterns or concerns that deserve attention

Use clear sections with headers.
",
    );
    prompt
}

pub fn research_prompt(medical_summary: &str) -> String {
    format!(
        "Using the patient medical summary below, write a research-based clinical analysis with references.

PATIENT MEDICAL SUMMARY:
{medical_summary}

Include:
1. **Clinical Research Context**: significance of the key conditions, current guidelines and relevant literature
2. **Evidence-Based Treatment Analysis**: current medications measured against guidelines and any treatment gaps
3. **Risk Assessment**: health risks from the current conditions, with epidemiological risk factors
4. **Research-Backed Recommendations**: guideline-based areas for further evaluation or monitoring
5. **References**: clinical guidelines, major trials or meta-analyses, with evidence levels

Use clear sections and standard medical citation format.
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Diagnosis, Medication};

    #[test]
    fn test_summary_prompt_lists_record_contents() {
        let mut patient = PatientData::new("P1", "Jane Smith", "<x/>");
        patient.demographics.age = Some(52);
        patient.diagnoses.push(Diagnosis {
            condition: "Essential hypertension".to_string(),
            icd_10_code: Some("I10".to_string()),
            status: Some("active".to_string()),
            ..Default::default()
        });
        for i in 0..25 {
            patient.medications.push(Medication {
                name: format!("Drug{}", i),
                dosage: Some("10 mg".to_string()),
                ..Default::default()
            });
        }

        let prompt = summary_prompt(&patient);
        assert!(prompt.contains("- Name: Jane Smith"));
        assert!(prompt.contains("- Age: 52"));
        assert!(prompt.contains("- Gender: Unknown"));
        assert!(prompt.contains("Medications (25 total)"));
        assert!(prompt.contains("- Drug19 (10 mg)"));
        assert!(!prompt.contains("Drug20"));
        assert!(prompt.contains("Essential hypertension (ICD-10: I10) - Status: active"));
        assert!(prompt.contains("No procedures recorded"));
        assert!(prompt.contains("6. Patterns or concerns"));
    }

    #[test]
    fn test_research_prompt_embeds_summary() {
        let prompt = research_prompt("Patient has type 2 diabetes.");
        assert!(prompt.contains("PATIENT MEDICAL SUMMARY:\nPatient has type 2 diabetes."));
        assert!(prompt.contains("5. **References**"));
    }
}
