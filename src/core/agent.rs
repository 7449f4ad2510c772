use crate::domain::ports::AgentInvoker;
use crate::utils::error::{AnalysisError, Result};
use async_trait::async_trait;
use aws_sdk_bedrockagentruntime::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_bedrockagentruntime::types::ResponseStream;

/// Bedrock Agent runtime client; collects the streamed completion into one string.
pub struct BedrockAgentClient {
    client: aws_sdk_bedrockagentruntime::Client,
    agent_id: String,
    agent_alias_id: String,
}

impl BedrockAgentClient {
    pub fn new(
        client: aws_sdk_bedrockagentruntime::Client,
        agent_id: impl Into<String>,
        agent_alias_id: impl Into<String>,
    ) -> Self {
        let agent_id = agent_id.into();
        tracing::info!("Bedrock Agent client initialized: {}", agent_id);
        Self {
            client,
            agent_id,
            agent_alias_id: agent_alias_id.into(),
        }
    }
}

fn agent_error<E>(err: &E) -> AnalysisError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let code = err.code().unwrap_or("Unknown").to_string();
    AnalysisError::agent(code, DisplayErrorContext(err).to_string())
}

#[async_trait]
impl AgentInvoker for BedrockAgentClient {
    async fn invoke_agent(&self, input_text: &str, session_id: &str) -> Result<String> {
        tracing::info!(
            agent_id = %self.agent_id,
            alias_id = %self.agent_alias_id,
            session_id,
            "Invoking Bedrock Agent"
        );

        let mut output = self
            .client
            .invoke_agent()
            .agent_id(&self.agent_id)
            .agent_alias_id(&self.agent_alias_id)
            .session_id(session_id)
            .input_text(input_text)
            .send()
            .await
            .map_err(|e| {
                let err = agent_error(&e);
                tracing::error!("Failed to invoke agent: {}", err);
                err
            })?;

        let mut completion = String::new();
        loop {
            match output.completion.recv().await {
                Ok(Some(ResponseStream::Chunk(part))) => {
                    if let Some(bytes) = part.bytes() {
                        completion.push_str(&String::from_utf8_lossy(bytes.as_ref()));
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    let err = agent_error(&e);
                    tracing::error!("Agent response stream failed: {}", err);
                    return Err(err);
                }
            }
        }

        tracing::info!("Agent response length: {} characters", completion.len());
        Ok(completion)
    }
}
