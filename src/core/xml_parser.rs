//! Patient record extraction from HL7 CDA documents and simpler ad-hoc XML layouts.

use crate::domain::model::{
    Demographics, Diagnosis, MedicalEvent, Medication, PatientData, Procedure,
};
use crate::utils::error::{AnalysisError, Result};
use chrono::{Datelike, NaiveDate, Utc};
use roxmltree::{Document, Node};
use std::collections::HashSet;

pub const UNKNOWN_PATIENT_ID: &str = "unknown_patient_id";

const HL7_V3_NAMESPACE: &str = "urn:hl7-org:v3";
const ICD10_CODE_SYSTEM: &str = "2.16.840.1.113883.6.90";
const DOCUMENT_ROOT_OID_PREFIX: &str = "2.16.840.1.113883.3.";

// LOINC section codes
const MEDICATIONS_SECTION: &str = "10160-0";
const PROBLEMS_SECTION: &str = "11450-4";
const PROCEDURES_SECTION: &str = "47519-4";
const ENCOUNTERS_SECTION: &str = "46240-8";

// At least one of these must sit on the patient root or its containers.
const PATIENT_INDICATORS: &[&str] = &[
    "id",
    "patientId",
    "patient_id",
    "ID",
    "mrn",
    "MRN",
    "name",
    "Name",
    "patientName",
    "fullName",
    "age",
    "Age",
    "patientAge",
    "gender",
    "Gender",
    "sex",
    "Sex",
    "medications",
    "medication",
    "diagnoses",
    "diagnosis",
    "procedures",
    "procedure",
    "medicalHistory",
    "history",
];

const PATIENT_ROOTS: &[&str] = &[
    "patient",
    "Patient",
    "PATIENT",
    "record",
    "Record",
    "patient_record",
    "patientRecord",
    "medicalRecord",
];

/// Parses `xml`, picking the CDA or generic extractor from the document shape.
///
/// A mismatch between the name in the record and `expected_name` is logged,
/// not rejected.
pub fn parse_patient_record(xml: &str, expected_name: &str) -> Result<PatientData> {
    let doc = Document::parse(xml).map_err(|e| AnalysisError::xml(format!("Invalid XML syntax: {}", e)))?;

    let patient = if is_cda(&doc) {
        tracing::debug!("Detected HL7 CDA document");
        parse_cda(&doc, xml)
    } else {
        tracing::debug!("Using generic XML extractor");
        parse_generic(&doc, xml)?
    };

    if !names_match(&patient.name, expected_name) {
        tracing::warn!("Patient name in record does not match the requested name");
    }

    let warnings = patient.validate();
    if !warnings.is_empty() {
        tracing::warn!("Patient data validation warnings: {:?}", warnings);
    }

    tracing::info!(
        "Extracted {} medications, {} diagnoses, {} procedures, {} events",
        patient.medications.len(),
        patient.diagnoses.len(),
        patient.procedures.len(),
        patient.medical_history.len()
    );

    Ok(patient)
}

pub fn is_cda(doc: &Document) -> bool {
    let root = doc.root_element();
    root.tag_name().name() == "ClinicalDocument" || root.tag_name().namespace() == Some(HL7_V3_NAMESPACE)
}

/// Fuzzy comparison on letters only: equal, containment, or character-set
/// Jaccard above 0.7.
pub fn names_match(extracted: &str, expected: &str) -> bool {
    let letters = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect()
    };
    let a = letters(extracted);
    let b = letters(expected);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b || a.contains(&b) || b.contains(&a) {
        return true;
    }
    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    let overlap = set_a.intersection(&set_b).count() as f64;
    let total = set_a.union(&set_b).count() as f64;
    overlap / total > 0.7
}

// ---------------------------------------------------------------------------
// Shared helpers

fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn children<'a, 'i>(node: Node<'a, 'i>, name: &'a str) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn path<'a, 'i>(node: Node<'a, 'i>, steps: &[&str]) -> Option<Node<'a, 'i>> {
    steps.iter().try_fold(node, |current, step| child(current, step))
}

fn attr(node: Option<Node>, name: &str) -> Option<String> {
    node?.attribute(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn element_text(node: Node) -> Option<String> {
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// ---------------------------------------------------------------------------
// HL7 CDA

fn parse_cda(doc: &Document, raw_xml: &str) -> PatientData {
    let root = doc.root_element();
    let patient_role = path(root, &["recordTarget", "patientRole"]);
    let patient_node = patient_role.and_then(|r| child(r, "patient"));

    let mut patient = PatientData::new(
        cda_patient_id(root, patient_role),
        patient_node.map(cda_patient_name).unwrap_or_else(|| "Unknown Patient".to_string()),
        raw_xml,
    );
    patient.demographics = cda_demographics(patient_node, patient_role);

    let sections: Vec<Node> = root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "section")
        .collect();
    let find_section = |code: &str| {
        sections
            .iter()
            .copied()
            .find(|s| attr(child(*s, "code"), "code").as_deref() == Some(code))
    };

    if let Some(section) = find_section(MEDICATIONS_SECTION) {
        patient.medications = children(section, "entry")
            .filter_map(|e| child(e, "substanceAdministration"))
            .map(cda_medication)
            .collect();
    }
    if let Some(section) = find_section(PROBLEMS_SECTION) {
        patient.diagnoses = children(section, "entry")
            .filter_map(|e| child(e, "act"))
            .flat_map(|act| children(act, "entryRelationship").collect::<Vec<_>>())
            .filter_map(|rel| child(rel, "observation"))
            .map(cda_problem)
            .collect();
    }
    if let Some(section) = find_section(PROCEDURES_SECTION) {
        patient.procedures = children(section, "entry")
            .filter_map(|e| child(e, "procedure"))
            .map(cda_procedure)
            .collect();
    }
    if let Some(section) = find_section(ENCOUNTERS_SECTION) {
        patient.medical_history = children(section, "entry")
            .filter_map(|e| child(e, "encounter"))
            .map(cda_encounter)
            .collect();
    }

    patient
}

fn cda_patient_id(document: Node, patient_role: Option<Node>) -> String {
    let role_id = patient_role.and_then(|r| child(r, "id"));
    if let Some(extension) = attr(role_id, "extension").filter(|e| e != "UNK") {
        return extension;
    }
    if let Some(root) = attr(role_id, "root") {
        return root;
    }
    if let Some(root) = attr(child(document, "id"), "root") {
        return root.replace(DOCUMENT_ROOT_OID_PREFIX, "MRN-");
    }
    UNKNOWN_PATIENT_ID.to_string()
}

fn cda_patient_name(patient: Node) -> String {
    let Some(name) = child(patient, "name") else {
        return "Unknown Patient".to_string();
    };
    let given = children(name, "given")
        .filter_map(element_text)
        .collect::<Vec<_>>()
        .join(" ");
    let family = child(name, "family").and_then(element_text);

    match family {
        Some(family) if !given.is_empty() => format!("{} {}", given, family),
        _ => "Unknown Patient".to_string(),
    }
}

fn cda_demographics(patient: Option<Node>, patient_role: Option<Node>) -> Demographics {
    let mut demographics = Demographics::default();

    if let Some(birth) = attr(patient.and_then(|p| child(p, "birthTime")), "value") {
        match parse_birth_date(&birth) {
            Some(date) => {
                demographics.date_of_birth = Some(date.format("%Y-%m-%d").to_string());
                demographics.age = Some(age_on(date, Utc::now().date_naive()));
            }
            None => tracing::warn!("Failed to parse birth time '{}'", birth),
        }
    }

    if let Some(code) = attr(patient.and_then(|p| child(p, "administrativeGenderCode")), "code") {
        demographics.gender = Some(
            match code.as_str() {
                "M" => "Male",
                "F" => "Female",
                "UN" => "Unknown",
                other => other,
            }
            .to_string(),
        );
    }

    if let Some(addr) = patient_role.and_then(|r| child(r, "addr")) {
        let parts: Vec<String> = ["streetAddressLine", "city", "state", "postalCode"]
            .iter()
            .filter_map(|field| child(addr, field).and_then(element_text))
            .collect();
        if !parts.is_empty() {
            demographics.address = Some(parts.join(", "));
        }
    }

    if let Some(phone) = attr(patient_role.and_then(|r| child(r, "telecom")), "value") {
        demographics.phone = Some(phone.trim_start_matches("tel:").to_string());
    }

    demographics
}

fn parse_birth_date(value: &str) -> Option<NaiveDate> {
    let digits = value.get(0..8)?;
    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

/// Whole years between `birth` and `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

/// `YYYYMMDD[HHMMSS]` -> `MM/DD/YYYY`; anything shorter is returned as-is.
pub fn format_cda_date(value: &str) -> String {
    match (value.get(0..4), value.get(4..6), value.get(6..8)) {
        (Some(year), Some(month), Some(day)) => format!("{}/{}/{}", month, day, year),
        _ => value.to_string(),
    }
}

fn effective_bound(node: Node, bound: &str) -> Option<String> {
    children(node, "effectiveTime")
        .find_map(|t| attr(child(t, bound), "value"))
        .map(|v| format_cda_date(&v))
}

fn effective_point(node: Node) -> Option<String> {
    children(node, "effectiveTime")
        .find_map(|t| attr(Some(t), "value"))
        .map(|v| format_cda_date(&v))
        .or_else(|| effective_bound(node, "low"))
}

fn cda_medication(admin: Node) -> Medication {
    let material = path(admin, &["consumable", "manufacturedProduct", "manufacturedMaterial"]);
    let dose = child(admin, "doseQuantity");
    let dosage = attr(dose, "value").map(|value| match attr(dose, "unit") {
        Some(unit) => format!("{} {}", value, unit),
        None => value,
    });

    Medication {
        name: attr(material.and_then(|m| child(m, "code")), "displayName")
            .or_else(|| material.and_then(|m| child(m, "name")).and_then(element_text))
            .unwrap_or_else(|| "Unknown medication".to_string()),
        dosage,
        start_date: effective_bound(admin, "low"),
        end_date: effective_bound(admin, "high"),
        status: attr(child(admin, "statusCode"), "code"),
        ..Default::default()
    }
}

fn cda_problem(observation: Node) -> Diagnosis {
    let value = child(observation, "value");
    let icd_10_code = if attr(value, "codeSystem").as_deref() == Some(ICD10_CODE_SYSTEM) {
        attr(value, "code")
    } else {
        None
    };

    Diagnosis {
        condition: attr(value, "displayName").unwrap_or_else(|| "Unknown condition".to_string()),
        diagnosis_date: effective_bound(observation, "low"),
        icd_10_code,
        status: attr(child(observation, "statusCode"), "code").or_else(|| Some("active".to_string())),
        ..Default::default()
    }
}

fn cda_procedure(procedure: Node) -> Procedure {
    let code = child(procedure, "code");
    Procedure {
        name: attr(code, "displayName").unwrap_or_else(|| "Unknown procedure".to_string()),
        date: effective_point(procedure),
        procedure_code: attr(code, "code"),
        ..Default::default()
    }
}

fn cda_encounter(encounter: Node) -> MedicalEvent {
    let event_type =
        attr(child(encounter, "code"), "displayName").unwrap_or_else(|| "encounter".to_string());
    MedicalEvent {
        date: effective_point(encounter),
        description: format!("Medical encounter: {}", event_type),
        event_type,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Generic layouts such as <patient_record><demographics/><medical_history/></patient_record>

const CONTAINER_SCOPES: &[&str] = &[
    "demographics",
    "Demographics",
    "medical_history",
    "medicalHistory",
    "clinical",
];

struct Scopes<'a, 'i> {
    nodes: Vec<Node<'a, 'i>>,
}

impl<'a, 'i> Scopes<'a, 'i> {
    fn new(root: Node<'a, 'i>) -> Self {
        let mut nodes = vec![root];
        nodes.extend(
            root.children()
                .filter(|c| c.is_element() && CONTAINER_SCOPES.contains(&c.tag_name().name())),
        );
        Self { nodes }
    }

    fn find(&self, names: &[&str]) -> Option<Node<'a, 'i>> {
        self.nodes
            .iter()
            .find_map(|scope| names.iter().find_map(|name| child(*scope, name)))
    }

    fn text(&self, names: &[&str]) -> Option<String> {
        self.find(names).and_then(element_text)
    }

    /// Items of the first matching container, e.g. `<medications><medication/>…`.
    fn items(&self, containers: &[&str], items: &[&str]) -> Vec<Node<'a, 'i>> {
        self.nodes
            .iter()
            .flat_map(|scope| {
                containers
                    .iter()
                    .filter_map(move |name| child(*scope, name))
            })
            .map(|container| {
                container
                    .children()
                    .filter(|c| c.is_element() && items.contains(&c.tag_name().name()))
                    .collect::<Vec<_>>()
            })
            .find(|found| !found.is_empty())
            .unwrap_or_default()
    }
}

fn field(node: Node, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| child(node, name).and_then(element_text).or_else(|| attr(Some(node), name)))
}

fn generic_patient_root<'a, 'i>(doc: &'a Document<'i>) -> Node<'a, 'i> {
    let root = doc.root_element();
    if PATIENT_ROOTS.contains(&root.tag_name().name()) {
        return root;
    }
    root.descendants()
        .find(|n| n.is_element() && PATIENT_ROOTS.contains(&n.tag_name().name()))
        .unwrap_or(root)
}

fn parse_generic(doc: &Document, raw_xml: &str) -> Result<PatientData> {
    let scopes = Scopes::new(generic_patient_root(doc));
    if scopes.find(PATIENT_INDICATORS).is_none() {
        return Err(AnalysisError::xml("No patient data found in XML"));
    }

    let name = generic_name(&scopes).unwrap_or_else(|| "Unknown Patient".to_string());
    let patient_id = scopes
        .text(&["patient_id", "patientId", "id", "ID", "mrn", "MRN", "recordNumber"])
        .unwrap_or_else(|| format!("patient_{}", name.replace(' ', "_").to_lowercase()));

    let mut patient = PatientData::new(patient_id, name, raw_xml);
    patient.demographics = Demographics {
        age: scopes
            .text(&["age", "Age", "patientAge"])
            .and_then(|a| a.parse().ok()),
        gender: scopes.text(&["gender", "Gender", "sex", "Sex"]),
        date_of_birth: scopes.text(&["date_of_birth", "dateOfBirth", "dob", "birthDate", "DOB"]),
        address: scopes.find(&["address", "Address"]).and_then(generic_address),
        phone: scopes.text(&["phone", "Phone", "telephone"]),
        emergency_contact: scopes.text(&["emergency_contact", "emergencyContact"]),
    };

    patient.medications = scopes
        .items(&["medications", "drugs", "prescriptions"], &["medication", "drug", "prescription"])
        .into_iter()
        .map(|m| Medication {
            name: field(m, &["name", "description"]).unwrap_or_else(|| "Unknown medication".to_string()),
            dosage: field(m, &["dosage", "dose"]),
            frequency: field(m, &["frequency"]),
            start_date: field(m, &["start_date", "startDate"]),
            end_date: field(m, &["end_date", "endDate"]),
            prescribing_physician: field(m, &["prescribing_physician", "prescribingPhysician"]),
            indication: field(m, &["indication"]),
            status: field(m, &["status"]).or_else(|| Some("active".to_string())),
        })
        .collect();

    patient.diagnoses = scopes
        .items(&["diagnoses", "conditions", "problems"], &["diagnosis", "condition", "problem"])
        .into_iter()
        .map(|d| Diagnosis {
            condition: field(d, &["condition", "description", "name"])
                .unwrap_or_else(|| "Unknown condition".to_string()),
            diagnosis_date: field(d, &["date_diagnosed", "dateDiagnosed", "date"]),
            icd_10_code: field(d, &["icd10Code", "icd_10_code", "code"]),
            severity: field(d, &["severity"]),
            status: field(d, &["status"]).or_else(|| Some("active".to_string())),
            diagnosing_physician: field(d, &["diagnosing_physician", "diagnosingPhysician"]),
            notes: field(d, &["notes"]),
        })
        .collect();

    patient.procedures = scopes
        .items(&["procedures", "surgeries", "operations"], &["procedure", "surgery", "operation"])
        .into_iter()
        .map(|p| Procedure {
            name: field(p, &["name", "description"]).unwrap_or_else(|| "Unknown procedure".to_string()),
            date: field(p, &["date"]),
            procedure_code: field(p, &["cptCode", "code"]),
            performing_physician: field(p, &["provider", "performing_physician", "performingPhysician"]),
            location: field(p, &["location"]),
            outcome: field(p, &["outcome"]),
            notes: field(p, &["notes"]),
        })
        .collect();

    patient.medical_history = scopes
        .items(&["events", "visits", "history", "encounters", "medicalHistory"], &["event", "visit", "encounter"])
        .into_iter()
        .map(|e| MedicalEvent {
            date: field(e, &["date"]),
            event_type: field(e, &["type", "event_type"]).unwrap_or_else(|| "visit".to_string()),
            description: field(e, &["description"]).unwrap_or_else(|| "Medical event".to_string()),
            provider: field(e, &["provider"]),
            location: field(e, &["location"]),
            notes: field(e, &["notes"]),
        })
        .collect();

    Ok(patient)
}

fn generic_name(scopes: &Scopes) -> Option<String> {
    let node = scopes.find(&["name", "Name", "patientName", "fullName", "patient_name"])?;
    let first = field(node, &["firstName", "first_name", "given"]);
    let last = field(node, &["lastName", "last_name", "family"]);
    match (first, last) {
        (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
        _ => element_text(node),
    }
}

fn generic_address(node: Node) -> Option<String> {
    let parts: Vec<String> = node
        .children()
        .filter(|c| c.is_element())
        .filter_map(element_text)
        .collect();
    if parts.is_empty() {
        element_text(node)
    } else {
        Some(parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDA: &str = r#"<?xml version="1.0"?>
<ClinicalDocument xmlns="urn:hl7-org:v3">
  <id root="2.16.840.1.113883.3.991"/>
  <recordTarget>
    <patientRole>
      <id extension="UNK" root="1.2.3.4"/>
      <addr><streetAddressLine>1 Elm St</streetAddressLine><city>Boston</city><state>MA</state><postalCode>02110</postalCode></addr>
      <patient>
        <name><given>Jane</given><family>Smith</family></name>
        <administrativeGenderCode code="F"/>
        <birthTime value="19800115"/>
      </patient>
    </patientRole>
  </recordTarget>
  <component><structuredBody>
    <component><section>
      <code code="10160-0"/>
      <entry><substanceAdministration>
        <effectiveTime><low value="20200105"/><high value="20231231"/></effectiveTime>
        <doseQuantity value="500" unit="mg"/>
        <consumable><manufacturedProduct><manufacturedMaterial>
          <code displayName="Metformin"/>
        </manufacturedMaterial></manufacturedProduct></consumable>
        <statusCode code="active"/>
      </substanceAdministration></entry>
    </section></component>
    <component><section>
      <code code="11450-4"/>
      <entry><act><entryRelationship><observation>
        <effectiveTime><low value="20190620"/></effectiveTime>
        <value displayName="Essential hypertension" code="I10" codeSystem="2.16.840.1.113883.6.90"/>
      </observation></entryRelationship></act></entry>
      <entry><act><entryRelationship><observation>
        <value displayName="Obesity" code="414916001" codeSystem="2.16.840.1.113883.6.96"/>
      </observation></entryRelationship></act></entry>
    </section></component>
    <component><section>
      <code code="47519-4"/>
      <entry><procedure><code displayName="Colonoscopy" code="73761001"/><effectiveTime value="20220301"/></procedure></entry>
    </section></component>
    <component><section>
      <code code="46240-8"/>
      <entry><encounter><code displayName="Office visit"/><effectiveTime value="20230410120000"/></encounter></entry>
    </section></component>
  </structuredBody></component>
</ClinicalDocument>"#;

    const GENERIC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<patient_record>
  <demographics>
    <patient_id>TEST_P001</patient_id>
    <name>John Doe</name>
    <date_of_birth>1978-03-15</date_of_birth>
    <age>45</age>
    <gender>Male</gender>
    <address><street>123 Main St</street><city>Anytown</city></address>
  </demographics>
  <medical_history>
    <diagnoses>
      <diagnosis><code>E11.9</code><description>Type 2 diabetes mellitus</description><status>Active</status><severity>Moderate</severity></diagnosis>
      <diagnosis><code>I10</code><description>Essential hypertension</description></diagnosis>
    </diagnoses>
    <medications>
      <medication><name>Metformin</name><dosage>500mg</dosage><frequency>Twice daily</frequency><indication>Type 2 diabetes</indication></medication>
    </medications>
    <procedures>
      <procedure><code>80053</code><description>Comprehensive metabolic panel</description><date>2023-08-15</date></procedure>
    </procedures>
  </medical_history>
</patient_record>"#;

    #[test]
    fn test_cda_extraction() {
        let patient = parse_patient_record(CDA, "Jane Smith").unwrap();

        assert_eq!(patient.patient_id, "1.2.3.4");
        assert_eq!(patient.name, "Jane Smith");
        assert_eq!(patient.demographics.gender.as_deref(), Some("Female"));
        assert_eq!(patient.demographics.date_of_birth.as_deref(), Some("1980-01-15"));
        assert!(patient.demographics.age.unwrap() >= 44);
        assert_eq!(
            patient.demographics.address.as_deref(),
            Some("1 Elm St, Boston, MA, 02110")
        );

        assert_eq!(patient.medications.len(), 1);
        let med = &patient.medications[0];
        assert_eq!(med.name, "Metformin");
        assert_eq!(med.dosage.as_deref(), Some("500 mg"));
        assert_eq!(med.start_date.as_deref(), Some("01/05/2020"));
        assert_eq!(med.end_date.as_deref(), Some("12/31/2023"));

        assert_eq!(patient.diagnoses.len(), 2);
        assert_eq!(patient.diagnoses[0].icd_10_code.as_deref(), Some("I10"));
        assert_eq!(patient.diagnoses[0].diagnosis_date.as_deref(), Some("06/20/2019"));
        assert_eq!(patient.diagnoses[1].icd_10_code, None);

        assert_eq!(patient.procedures[0].name, "Colonoscopy");
        assert_eq!(patient.procedures[0].date.as_deref(), Some("03/01/2022"));
        assert_eq!(patient.medical_history[0].description, "Medical encounter: Office visit");
        assert_eq!(patient.medical_history[0].date.as_deref(), Some("04/10/2023"));
    }

    #[test]
    fn test_cda_patient_id_fallbacks() {
        let doc_id_only = r#"<ClinicalDocument><id root="2.16.840.1.113883.3.991.1"/>
            <recordTarget><patientRole><patient/></patientRole></recordTarget></ClinicalDocument>"#;
        let patient = parse_patient_record(doc_id_only, "Anyone Here").unwrap();
        assert_eq!(patient.patient_id, "MRN-991.1");
        assert_eq!(patient.name, "Unknown Patient");

        let nothing = "<ClinicalDocument/>";
        let patient = parse_patient_record(nothing, "Anyone Here").unwrap();
        assert_eq!(patient.patient_id, "unknown_patient_id");
    }

    #[test]
    fn test_generic_extraction() {
        let patient = parse_patient_record(GENERIC, "John Doe").unwrap();

        assert_eq!(patient.patient_id, "TEST_P001");
        assert_eq!(patient.name, "John Doe");
        assert_eq!(patient.demographics.age, Some(45));
        assert_eq!(patient.demographics.address.as_deref(), Some("123 Main St, Anytown"));
        assert_eq!(patient.diagnoses.len(), 2);
        assert_eq!(patient.diagnoses[0].condition, "Type 2 diabetes mellitus");
        assert_eq!(patient.diagnoses[0].icd_10_code.as_deref(), Some("E11.9"));
        assert_eq!(patient.diagnoses[1].status.as_deref(), Some("active"));
        assert_eq!(patient.medications[0].indication.as_deref(), Some("Type 2 diabetes"));
        assert_eq!(patient.procedures[0].name, "Comprehensive metabolic panel");
        assert_eq!(patient.procedures[0].procedure_code.as_deref(), Some("80053"));
        assert!(patient.validate().is_empty());
    }

    #[test]
    fn test_document_without_patient_data_is_rejected() {
        let err = parse_patient_record("<invoice><total>3</total></invoice>", "John Doe").unwrap_err();
        assert!(matches!(err, AnalysisError::XmlParsing { ref message } if message == "No patient data found in XML"));

        let err = parse_patient_record("<patient_record/>", "John Doe").unwrap_err();
        assert!(matches!(err, AnalysisError::XmlParsing { .. }));

        let nested = "<export><patient><demographics><name>Ann Lee</name></demographics></patient></export>";
        assert_eq!(parse_patient_record(nested, "Ann Lee").unwrap().name, "Ann Lee");
    }

    #[test]
    fn test_malformed_xml() {
        let err = parse_patient_record("<patient><name>Jane</patient>", "Jane Smith").unwrap_err();
        assert!(matches!(err, AnalysisError::XmlParsing { .. }));
    }

    #[test]
    fn test_names_match() {
        assert!(names_match("Jane Smith", "jane smith"));
        assert!(names_match("Jane A. Smith", "Jane Smith"));
        assert!(names_match("Smith", "Jane Smith"));
        assert!(!names_match("Robert Brown", "Jane Smith"));
        assert!(!names_match("", "Jane Smith"));
    }

    #[test]
    fn test_dates() {
        assert_eq!(format_cda_date("20230410120000"), "04/10/2023");
        assert_eq!(format_cda_date("2023"), "2023");
        let birth = NaiveDate::from_ymd_opt(1980, 6, 15).unwrap();
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()), 43);
        assert_eq!(age_on(birth, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), 44);
    }
}
