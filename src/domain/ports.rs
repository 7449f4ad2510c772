use crate::domain::model::{GeneratedText, ModelInfo, ModelResponse, PatientData, WorkflowType};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Object storage holding patient records and analysis reports.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Keys under `prefix`, in storage order.
    fn list_keys(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// A hosted text model.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, prompt: &str, system_prompt: Option<&str>) -> Result<ModelResponse>;
    fn model_info(&self) -> ModelInfo;
}

/// A managed agent that runs the analysis through its own action group.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke_agent(&self, input_text: &str, session_id: &str) -> Result<String>;
}

/// Produces the two narrative sections of a report.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn summarize(&self, patient: &PatientData) -> Result<GeneratedText>;
    async fn research(&self, patient: &PatientData, summary: &GeneratedText) -> Result<GeneratedText>;
    fn model_info(&self) -> ModelInfo;
    fn workflow_type(&self) -> WorkflowType;
}
