use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use med_record_analysis::config::aws;
use med_record_analysis::core::action_group;
use med_record_analysis::core::bedrock::BedrockClient;
use med_record_analysis::utils::logger;
use med_record_analysis::{
    ActionGroupEvent, ActionGroupHandler, AnalysisEngine, AnalysisMode, AnalysisPipeline, AnyAnalyzer, AppConfig,
    BedrockAnalyzer, LocalAnalyzer, PipelineSettings, S3Storage, StorageBackend,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

type Handler = ActionGroupHandler<StorageBackend, AnyAnalyzer<BedrockClient>>;

async fn function_handler(handler: &Handler, event: LambdaEvent<Value>) -> Result<Value, Error> {
    let (payload, context) = event.into_parts();
    tracing::info!(request_id = %context.request_id, "Received action group request");

    match serde_json::from_value::<ActionGroupEvent>(payload) {
        Ok(request) => Ok(handler.handle(&request).await),
        Err(e) => {
            tracing::warn!("Rejected malformed action group event: {}", e);
            Ok(action_group::malformed_event_envelope(&e))
        }
    }
}

/// `ANALYSIS_MODE=local` runs the rule-based analyzer; anything else calls Claude.
fn analysis_mode() -> AnalysisMode {
    let mode = std::env::var("ANALYSIS_MODE")
        .ok()
        .and_then(|name| AnalysisMode::from_name(&name))
        .unwrap_or(AnalysisMode::Bedrock);
    if mode == AnalysisMode::BedrockAgent {
        tracing::warn!("ANALYSIS_MODE=bedrock_agent is not valid inside the action group, using bedrock");
        return AnalysisMode::Bedrock;
    }
    mode
}

async fn build_handler() -> Result<Handler, Error> {
    let config = AppConfig::from_env()?;
    let sdk = aws::load_sdk_config(&config.aws).await;

    let storage = StorageBackend::S3(S3Storage::new(
        aws::s3_client(&sdk, &config.aws),
        config.aws.s3_bucket.clone(),
    ));
    let analyzer = match analysis_mode() {
        AnalysisMode::Local => AnyAnalyzer::Local(LocalAnalyzer::new(config.aws.region.clone())),
        _ => AnyAnalyzer::Bedrock(BedrockAnalyzer::new(BedrockClient::new(
            aws_sdk_bedrockruntime::Client::new(&sdk),
            config.models.clone(),
            config.aws.region.clone(),
        ))),
    };

    let pipeline = AnalysisPipeline::new(
        storage.clone(),
        storage,
        analyzer,
        PipelineSettings::from_config(&config),
    );
    let engine = AnalysisEngine::new(pipeline, Duration::from_secs(config.workflow.timeout_seconds));
    Ok(ActionGroupHandler::new(engine))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();
    tracing::info!("Starting medical record analysis action group");

    let handler = Arc::new(build_handler().await?);
    run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = Arc::clone(&handler);
        async move { function_handler(&handler, event).await }
    }))
    .await
}
