use crate::utils::error::{AnalysisError, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// The only region patient data may be processed in.
pub const COMPLIANT_REGION: &str = "us-east-1";

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidConfigValue {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(invalid(
                field_name,
                url_str,
                format!("Unsupported URL scheme: {}", scheme),
            )),
        },
        Err(e) => Err(invalid(
            field_name,
            url_str,
            format!("Invalid URL format: {}", e),
        )),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| AnalysisError::MissingConfig {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

pub fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(invalid(
            field_name,
            bucket_name,
            "S3 bucket name must be between 3 and 63 characters",
        ));
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            field_name,
            bucket_name,
            "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(invalid(
            field_name,
            bucket_name,
            "S3 bucket name cannot start or end with a hyphen",
        ));
    }

    Ok(())
}

pub fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    validate_non_empty_string(field_name, region)?;

    if region != COMPLIANT_REGION {
        return Err(invalid(
            field_name,
            region,
            format!("Patient data must be processed in {}", COMPLIANT_REGION),
        ));
    }

    Ok(())
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z\s\-'.]+$").expect("static regex"))
}

/// Checks interactive patient name input: 2..=100 characters, letters and
/// `-'.` only, first and last name.
pub fn validate_patient_name(name: &str) -> std::result::Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Patient name cannot be empty".to_string());
    }
    if name.chars().count() < 2 {
        return Err("Patient name must be at least 2 characters long".to_string());
    }
    if name.chars().count() > 100 {
        return Err("Patient name cannot exceed 100 characters".to_string());
    }
    if !name_pattern().is_match(name) {
        return Err(
            "Patient name can only contain letters, spaces, hyphens, apostrophes, and periods"
                .to_string(),
        );
    }
    if name.split_whitespace().count() < 2 {
        return Err("Please enter both first and last name".to_string());
    }
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Collapses whitespace and capitalizes each part (`o'connor` -> `O'Connor`,
/// `jean-luc` -> `Jean-Luc`, `mcdonald` -> `McDonald`).
pub fn normalize_patient_name(name: &str) -> String {
    name.split_whitespace()
        .map(|part| {
            if part.contains('\'') {
                part.split('\'').map(capitalize).collect::<Vec<_>>().join("'")
            } else if part.contains('-') {
                part.split('-').map(capitalize).collect::<Vec<_>>().join("-")
            } else if part.len() > 2 && part.to_lowercase().starts_with("mc") {
                format!("Mc{}", capitalize(&part[2..]))
            } else {
                capitalize(part)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("s3_endpoint_url", "https://example.com").is_ok());
        assert!(validate_url("s3_endpoint_url", "http://localhost:4566").is_ok());
        assert!(validate_url("s3_endpoint_url", "").is_err());
        assert!(validate_url("s3_endpoint_url", "invalid-url").is_err());
        assert!(validate_url("s3_endpoint_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_region() {
        assert!(validate_aws_region("region", "us-east-1").is_ok());
        assert!(validate_aws_region("region", "eu-west-1").is_err());
        assert!(validate_aws_region("region", " ").is_err());
    }

    #[test]
    fn test_validate_bucket_name() {
        assert!(validate_s3_bucket_name("bucket", "patient-records-20251024").is_ok());
        assert!(validate_s3_bucket_name("bucket", "ab").is_err());
        assert!(validate_s3_bucket_name("bucket", "Patient_Records").is_err());
        assert!(validate_s3_bucket_name("bucket", "-records").is_err());
    }

    #[test]
    fn test_validate_patient_name() {
        assert!(validate_patient_name("Jane Smith").is_ok());
        assert!(validate_patient_name("Mary-Ann O'Connor").is_ok());
        assert!(validate_patient_name("Jane").is_err());
        assert!(validate_patient_name("J").is_err());
        assert!(validate_patient_name("Jane Sm1th").is_err());
        assert!(validate_patient_name(&"a ".repeat(60)).is_err());
    }

    #[test]
    fn test_normalize_patient_name() {
        assert_eq!(normalize_patient_name("  jane   smith "), "Jane Smith");
        assert_eq!(normalize_patient_name("sean o'connor"), "Sean O'Connor");
        assert_eq!(normalize_patient_name("jean-luc picard"), "Jean-Luc Picard");
        assert_eq!(normalize_patient_name("ronald mcdonald"), "Ronald McDonald");
    }
}
