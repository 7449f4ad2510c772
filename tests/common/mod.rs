#![allow(dead_code)]

use async_trait::async_trait;
use med_record_analysis::domain::model::{ModelInfo, ModelResponse, TokenUsage};
use med_record_analysis::domain::ports::{AgentInvoker, ModelInvoker, Storage};
use med_record_analysis::utils::error::{AnalysisError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const JOHN_DOE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<patient_record>
  <demographics>
    <patient_id>TEST_P001</patient_id>
    <name>John Doe</name>
    <age>45</age>
    <gender>Male</gender>
  </demographics>
  <medical_history>
    <diagnoses>
      <diagnosis><code>E11.9</code><description>Type 2 diabetes mellitus</description><status>Active</status></diagnosis>
      <diagnosis><code>I10</code><description>Essential hypertension</description></diagnosis>
    </diagnoses>
    <medications>
      <medication><name>Metformin</name><dosage>500mg</dosage><indication>Type 2 diabetes</indication></medication>
      <medication><name>Lisinopril</name><dosage>10mg</dosage></medication>
    </medications>
    <procedures>
      <procedure><description>Comprehensive metabolic panel</description><date>2023-08-15</date></procedure>
    </procedures>
  </medical_history>
</patient_record>"#;

pub const JANE_SMITH_CDA: &str = r#"<?xml version="1.0"?>
<ClinicalDocument xmlns="urn:hl7-org:v3">
  <recordTarget>
    <patientRole>
      <patient>
        <name><given>Jane</given><family>Smith</family></name>
        <administrativeGenderCode code="F"/>
        <birthTime value="19700301"/>
      </patient>
    </patientRole>
  </recordTarget>
  <component><structuredBody>
    <component><section>
      <code code="11450-4"/>
      <entry><act><entryRelationship><observation>
        <value displayName="Hyperlipidemia" code="E78.5" codeSystem="2.16.840.1.113883.6.90"/>
      </observation></entryRelationship></act></entry>
    </section></component>
  </structuredBody></component>
</ClinicalDocument>"#;

/// Generic record whose `<patient_id>` tries to climb out of the report prefix.
pub const EVE_MALLORY_XML: &str = r#"<patient_record>
  <demographics>
    <patient_id>/../../../escaped</patient_id>
    <name>Eve Mallory</name>
    <age>38</age>
    <gender>Female</gender>
  </demographics>
  <medical_history>
    <diagnoses>
      <diagnosis><code>I10</code><description>Essential hypertension</description></diagnosis>
    </diagnoses>
  </medical_history>
</patient_record>"#;

/// `MakeWriter` target collecting formatted log lines in memory.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_records() -> Self {
        let storage = Self::new();
        storage
            .insert("patient-records/TEST_P001/JohnDoe.xml", JOHN_DOE_XML.as_bytes())
            .await;
        storage
            .insert("patient-records/JaneSmith.xml", JANE_SMITH_CDA.as_bytes())
            .await;
        storage
    }

    pub async fn insert(&self, path: &str, data: &[u8]) {
        self.files.lock().await.insert(path.to_string(), data.to_vec());
    }

    pub async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().await.get(path).cloned()
    }

    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let files = self.files.lock().await;
        let mut keys: Vec<String> = files.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        keys.sort();
        keys
    }
}

impl Storage for MockStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let files = self.files.lock().await;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| AnalysisError::storage(format!("File not found: {}", path)))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut files = self.files.lock().await;
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.keys_with_prefix(prefix).await)
    }
}

/// Model that answers every prompt with a fixed text, optionally failing first.
pub struct FakeModel {
    reply: String,
    failures: Vec<AnalysisError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            failures: Vec::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_with(error: AnalysisError) -> Self {
        Self {
            failures: vec![error],
            ..Self::replying("")
        }
    }

    /// Answers only after `delay`.
    pub fn slow(reply: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::replying(reply)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl ModelInvoker for FakeModel {
    async fn invoke(&self, prompt: &str, _system_prompt: Option<&str>) -> Result<ModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().await.push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(AnalysisError::Model { code, message }) = self.failures.first() {
            return Err(AnalysisError::model(code.clone(), message.clone()));
        }
        Ok(ModelResponse {
            text: self.reply.clone(),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            stop_reason: Some("end_turn".to_string()),
            model_id: "fake-model".to_string(),
        })
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_id: "fake-model".to_string(),
            model_name: "Fake Claude".to_string(),
            provider: "Anthropic".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

pub struct FakeAgent {
    reply: std::result::Result<String, (String, String)>,
    pub inputs: Mutex<Vec<(String, String)>>,
}

impl FakeAgent {
    pub fn replying(completion: &str) -> Self {
        Self {
            reply: Ok(completion.to_string()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(code: &str, message: &str) -> Self {
        Self {
            reply: Err((code.to_string(), message.to_string())),
            inputs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AgentInvoker for FakeAgent {
    async fn invoke_agent(&self, input_text: &str, session_id: &str) -> Result<String> {
        self.inputs
            .lock()
            .await
            .push((input_text.to_string(), session_id.to_string()));
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err((code, message)) => Err(AnalysisError::agent(code.clone(), message.clone())),
        }
    }
}
