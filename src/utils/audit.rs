//! Audit trail for access to patient data.
//!
//! Events go to the `audit` tracing target so they can be routed to a
//! separate log stream. Only identifiers and storage keys are recorded,
//! never names or clinical content.

use crate::utils::error::AnalysisError;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Salt for [`search_subject`] when none is configured.
pub const DEFAULT_AUDIT_SALT: &str = "medical_analysis_audit_salt_2024";

pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn log_processing_start(patient_id: &str, workflow_type: &str, request_id: &str) {
    tracing::info!(
        target: "audit",
        event = "processing_start",
        patient_id,
        workflow_type,
        request_id,
    );
}

pub fn log_data_access(patient_id: &str, operation: &str, resource: &str, request_id: &str) {
    tracing::info!(
        target: "audit",
        event = "data_access",
        patient_id,
        operation,
        resource,
        request_id,
    );
}

pub fn log_processing_complete(
    patient_id: &str,
    workflow_type: &str,
    duration: Duration,
    request_id: &str,
) {
    tracing::info!(
        target: "audit",
        event = "processing_complete",
        patient_id,
        workflow_type,
        duration_ms = duration.as_millis() as u64,
        request_id,
    );
}

/// Records the failure by kind only. Error messages can carry the requested
/// patient name, so they stay out of the audit stream.
pub fn log_error(patient_id: &str, operation: &str, error: &AnalysisError, request_id: &str) {
    tracing::warn!(
        target: "audit",
        event = "error",
        patient_id,
        operation,
        error_kind = error.kind(),
        error_category = ?error.category(),
        severity = ?error.severity(),
        request_id,
    );
}

/// Audit-safe identifier for a lookup that has not resolved a patient id yet:
/// the first 16 hex digits of a salted SHA-256 of the normalized name.
pub fn search_subject(patient_name: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(patient_name.trim().to_lowercase().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("search_{}", &digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_subject_hides_name() {
        let subject = search_subject("Jane Smith", DEFAULT_AUDIT_SALT);
        assert!(subject.starts_with("search_"));
        assert_eq!(subject.len(), "search_".len() + 16);
        assert!(!subject.to_lowercase().contains("jane"));
        assert_eq!(subject, search_subject(" jane smith", DEFAULT_AUDIT_SALT));
    }

    #[test]
    fn test_search_subject_depends_on_salt() {
        let mut unsalted = Sha256::new();
        unsalted.update(b"jane smith");
        let unsalted = hex::encode(unsalted.finalize());

        let subject = search_subject("Jane Smith", "deployment-salt");
        assert_ne!(subject, search_subject("Jane Smith", DEFAULT_AUDIT_SALT));
        assert_ne!(&subject["search_".len()..], &unsalted[..16]);
    }
}
