use clap::Parser;
use med_record_analysis::config::aws::{self, StorageBackend};
use med_record_analysis::core::agent::BedrockAgentClient;
use med_record_analysis::core::bedrock::BedrockClient;
use med_record_analysis::core::workflow::{self, AgentRunResult};
use med_record_analysis::domain::model::AnalysisOutcome;
use med_record_analysis::utils::error::ErrorSeverity;
use med_record_analysis::utils::{logger, validation};
use med_record_analysis::{
    AgentWorkflow, AnalysisEngine, AnalysisError, AnalysisMode, AnalysisPipeline, AnyAnalyzer, AppConfig,
    BedrockAnalyzer, CliConfig, LocalAnalyzer, LocalStorage, PipelineSettings, S3Storage,
};
use std::io::{self, BufRead, Write};
use std::time::Duration;

const RULE: &str = "============================================================";

fn exit_code(e: &AnalysisError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(e: &AnalysisError) -> ! {
    tracing::error!(
        "Analysis failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(exit_code(e));
}

fn build_storage(config: &AppConfig, sdk: &aws_config::SdkConfig) -> (StorageBackend, StorageBackend) {
    let pick = |local: &Option<String>| match local {
        Some(dir) => StorageBackend::Local(LocalStorage::new(dir.clone())),
        None => StorageBackend::S3(S3Storage::new(
            aws::s3_client(sdk, &config.aws),
            config.aws.s3_bucket.clone(),
        )),
    };
    (
        pick(&config.storage.local_records_dir),
        pick(&config.storage.local_output_dir),
    )
}

fn read_patient_name() -> io::Result<String> {
    print!("Enter patient name: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_outcome(outcome: &AnalysisOutcome) {
    let report = &outcome.report;
    println!("\n{}", RULE);
    println!("MEDICAL RECORD ANALYSIS COMPLETE");
    println!("{}", RULE);
    println!("Patient:   {} (ID: {})", outcome.patient_name, outcome.patient_id);
    println!("Workflow:  {}", outcome.workflow_id);
    println!(
        "Model:     {} ({}, {})",
        outcome.model_info.model_name, outcome.model_info.provider, outcome.model_info.region
    );
    println!("Duration:  {:.2}s", outcome.duration_seconds);
    println!("Report:    {}", outcome.s3_key);
    println!(
        "Quality:   {:?} (score {:.2}, completeness {:.0}%)",
        report.quality.status,
        report.quality.overall_score,
        report.quality.completeness * 100.0
    );
    println!(
        "Data:      {} medications, {} diagnoses, {} procedures, {} events",
        report.data_summary.total_medications,
        report.data_summary.total_diagnoses,
        report.data_summary.total_procedures,
        report.data_summary.total_medical_events
    );
    println!("\n--- MEDICAL SUMMARY ---\n{}", outcome.medical_summary);
    println!("\n--- RESEARCH ANALYSIS ---\n{}", outcome.research_analysis);
    println!("{}", RULE);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();
    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting med-record-analysis CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    let mode = cli.mode();
    tracing::info!("Analysis mode: {:?}", mode);
    if config.monitoring.enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let sdk = aws::load_sdk_config(&config.aws).await;
    let (records, reports) = build_storage(&config, &sdk);
    tracing::info!("Records: {}, reports: {}", records.describe(), reports.describe());

    if cli.list_patients {
        let patients = match workflow::list_patients(&records, &config.storage.records_prefix, None).await {
            Ok(patients) => patients,
            Err(e) => fail(&e),
        };
        println!("Available patients ({}):", patients.len());
        for patient in &patients {
            println!("  - {} (ID: {}) [{}]", patient.name, patient.patient_id, patient.s3_key);
        }
        return Ok(());
    }

    let raw_name = match &cli.patient {
        Some(name) => name.clone(),
        None => read_patient_name()?,
    };
    if let Err(reason) = validation::validate_patient_name(&raw_name) {
        eprintln!("❌ Invalid patient name: {}", reason);
        std::process::exit(1);
    }
    let patient_name = validation::normalize_patient_name(&raw_name);

    let settings = PipelineSettings::from_config(&config);
    let analyzer: AnyAnalyzer<BedrockClient> = match mode {
        AnalysisMode::Local => AnyAnalyzer::Local(LocalAnalyzer::new(config.aws.region.clone())),
        AnalysisMode::Bedrock | AnalysisMode::BedrockAgent => {
            let client = BedrockClient::new(
                aws_sdk_bedrockruntime::Client::new(&sdk),
                config.models.clone(),
                config.aws.region.clone(),
            );
            AnyAnalyzer::Bedrock(BedrockAnalyzer::new(client))
        }
    };
    let pipeline = AnalysisPipeline::new(records, reports, analyzer, settings);
    let timeout = Duration::from_secs(config.workflow.timeout_seconds);

    if mode == AnalysisMode::BedrockAgent {
        let (Some(agent_id), Some(alias_id)) = (&config.agent.agent_id, &config.agent.agent_alias_id) else {
            fail(&AnalysisError::MissingConfig {
                field: "agent.agent_id".to_string(),
            });
        };
        let agent = BedrockAgentClient::new(
            aws_sdk_bedrockagentruntime::Client::new(&sdk),
            agent_id.clone(),
            alias_id.clone(),
        );
        let agent_workflow = AgentWorkflow::new(agent, Some(pipeline));
        let result = match tokio::time::timeout(timeout, agent_workflow.run(&patient_name)).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::Timeout {
                seconds: timeout.as_secs(),
            }),
        };
        match result {
            Ok(AgentRunResult::Agent(value)) => {
                println!("\n{}\nBEDROCK AGENT ANALYSIS COMPLETE\n{}", RULE, RULE);
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Ok(AgentRunResult::Fallback(outcome)) => {
                println!("⚠️  Bedrock Agent could not reach its action group; used direct model calls");
                print_outcome(&outcome);
            }
            Err(e) => fail(&e),
        }
        return Ok(());
    }

    let engine = AnalysisEngine::new_with_monitoring(pipeline, timeout, config.monitoring.enabled);
    match engine.run(&patient_name).await {
        Ok(outcome) => {
            tracing::info!("✅ Analysis completed successfully");
            print_outcome(&outcome);
        }
        Err(e) => fail(&e),
    }

    Ok(())
}
