//! Maps a patient name typed by a user to the storage key of their record.
//!
//! Records are stored as `{prefix}{patient_id}/{FirstLast}.xml` or directly as
//! `{prefix}{FirstLast}.xml`.

use crate::domain::ports::Storage;
use crate::utils::error::{AnalysisError, Result};
use std::collections::HashSet;

const SIMILARITY_THRESHOLD: f64 = 0.8;

/// `"jane  o'smith"` -> `"JaneOsmith"`
pub fn normalize_patient_name(name: &str) -> String {
    name.split_whitespace()
        .map(title_case)
        .collect::<String>()
        .chars()
        .filter(|c| !matches!(c, '\'' | '-' | '.'))
        .collect()
}

// Upper-cases the first letter after every non-letter.
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut at_boundary = true;
    for c in word.chars() {
        if c.is_alphabetic() {
            if at_boundary {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_boundary = false;
        } else {
            out.push(c);
            at_boundary = true;
        }
    }
    out
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn file_stem(key: &str) -> &str {
    let name = file_name(key);
    name.strip_suffix(".xml").unwrap_or(name)
}

/// Character-set Jaccard similarity.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / union as f64
}

fn names_similar(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.contains(b) || b.contains(a) {
        return true;
    }
    jaccard_similarity(a, b) >= SIMILARITY_THRESHOLD
}

/// Picks the record key for `patient_name` among `keys`.
///
/// An exact match on the normalized file name wins over the first similar one.
pub fn resolve<'a>(patient_name: &str, keys: &'a [String]) -> Result<&'a str> {
    let wanted = normalize_patient_name(patient_name).to_lowercase();
    let candidates: Vec<(&'a str, String)> = keys
        .iter()
        .filter(|k| k.ends_with(".xml"))
        .map(|k| (k.as_str(), normalize_patient_name(file_stem(k)).to_lowercase()))
        .collect();

    if let Some((key, _)) = candidates.iter().find(|(_, stem)| *stem == wanted) {
        return Ok(key);
    }

    if let Some((key, _)) = candidates
        .iter()
        .find(|(_, stem)| names_similar(&wanted, stem))
    {
        tracing::warn!(
            "Using similar record {} for requested patient name",
            file_name(key)
        );
        return Ok(key);
    }

    Err(AnalysisError::PatientNotFound {
        name: patient_name.to_string(),
    })
}

/// Patient id for a record key: its directory below `prefix`, or the file stem
/// when the record sits directly under the prefix.
pub fn patient_id_from_key(key: &str, prefix: &str) -> String {
    let relative = key.strip_prefix(prefix).unwrap_or(key);
    match relative.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => {
            dir.rsplit('/').next().unwrap_or(dir).to_string()
        }
        _ => file_stem(relative).to_string(),
    }
}

/// `"patient-records/abc/Jane_Smith.xml"` -> `"Jane Smith"`
pub fn display_name_from_key(key: &str) -> String {
    file_stem(key).replace('_', " ")
}

/// Lists the prefix and resolves `patient_name` against it.
pub async fn locate_record<S: Storage>(storage: &S, prefix: &str, patient_name: &str) -> Result<String> {
    let keys = storage.list_keys(prefix).await?;
    tracing::debug!("Searching {} keys under '{}'", keys.len(), prefix);
    resolve(patient_name, &keys).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<String> {
        vec![
            "patient-records/".to_string(),
            "patient-records/0199-aaaa/JaneSmith.xml".to_string(),
            "patient-records/0199-bbbb/MaryOConnor.xml".to_string(),
            "patient-records/notes.txt".to_string(),
            "patient-records/Robert_Johnson.xml".to_string(),
        ]
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_patient_name("  jane   smith "), "JaneSmith");
        assert_eq!(normalize_patient_name("mary o'connor"), "MaryOConnor");
        assert_eq!(normalize_patient_name("Jean-Luc Picard"), "JeanLucPicard");
        assert_eq!(normalize_patient_name("J. R. Ewing"), "JREwing");
    }

    #[test]
    fn test_resolve_exact() {
        let keys = keys();
        assert_eq!(
            resolve("jane smith", &keys).unwrap(),
            "patient-records/0199-aaaa/JaneSmith.xml"
        );
        assert_eq!(
            resolve("Mary O'Connor", &keys).unwrap(),
            "patient-records/0199-bbbb/MaryOConnor.xml"
        );
    }

    #[test]
    fn test_resolve_similar() {
        let keys = keys();
        // containment
        assert_eq!(
            resolve("Smith", &keys).unwrap(),
            "patient-records/0199-aaaa/JaneSmith.xml"
        );
        // underscores survive normalization, so only similarity matches
        assert_eq!(
            resolve("Robert Johnson", &keys).unwrap(),
            "patient-records/Robert_Johnson.xml"
        );
    }

    #[test]
    fn test_resolve_not_found() {
        let keys = keys();
        let err = resolve("Zed Quux", &keys).unwrap_err();
        assert!(matches!(err, AnalysisError::PatientNotFound { name } if name == "Zed Quux"));
    }

    #[test]
    fn test_patient_id_from_key() {
        let prefix = "patient-records/";
        assert_eq!(
            patient_id_from_key("patient-records/0199-aaaa/JaneSmith.xml", prefix),
            "0199-aaaa"
        );
        assert_eq!(
            patient_id_from_key("patient-records/Robert_Johnson.xml", prefix),
            "Robert_Johnson"
        );
        assert_eq!(patient_id_from_key("0199-cccc/Bob.xml", ""), "0199-cccc");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(
            display_name_from_key("patient-records/Robert_Johnson.xml"),
            "Robert Johnson"
        );
    }
}
