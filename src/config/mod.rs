pub mod aws;
#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::config::toml_config::AppConfig;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;

/// Which analysis path a run takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Rule-based analysis without any model calls.
    Local,
    /// Direct Claude calls through Bedrock InvokeModel.
    Bedrock,
    /// A Bedrock Agent orchestrating the action-group Lambda.
    BedrockAgent,
}

impl AnalysisMode {
    /// Parses the `ANALYSIS_MODE` values used by the Lambda.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "local" => Some(Self::Local),
            "bedrock" => Some(Self::Bedrock),
            "bedrock_agent" | "agent" => Some(Self::BedrockAgent),
            _ => None,
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "med-record-analysis")]
#[command(about = "Analyze patient medical records with local rules, Claude on Bedrock, or a Bedrock Agent")]
pub struct CliConfig {
    #[arg(long, help = "Use direct Claude model calls through Bedrock")]
    pub bedrock: bool,

    #[arg(long, conflicts_with = "bedrock", help = "Use a Bedrock Agent (needs --agent-id and --agent-alias-id)")]
    pub bedrock_agent: bool,

    #[arg(long)]
    pub agent_id: Option<String>,

    #[arg(long)]
    pub agent_alias_id: Option<String>,

    #[arg(long, help = "Patient name; read from stdin when omitted")]
    pub patient: Option<String>,

    #[arg(long, help = "List available patient records and exit")]
    pub list_patients: bool,

    #[arg(long, help = "Path to a TOML configuration file")]
    pub config: Option<String>,

    #[arg(long, help = "Read patient records from a local directory instead of S3")]
    pub records_dir: Option<String>,

    #[arg(long, help = "Write reports to a local directory instead of S3")]
    pub output_dir: Option<String>,

    #[arg(long, help = "Log CPU and memory usage between workflow steps")]
    pub monitor: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn mode(&self) -> AnalysisMode {
        if self.bedrock_agent {
            AnalysisMode::BedrockAgent
        } else if self.bedrock {
            AnalysisMode::Bedrock
        } else {
            AnalysisMode::Local
        }
    }

    /// Builds the effective configuration: file (if given), then environment,
    /// then these flags.
    pub fn resolve(&self) -> Result<AppConfig> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    pub fn resolve_with<F>(&self, lookup: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.config {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path);
                AppConfig::from_file(path)?
            }
            None => AppConfig::default(),
        };
        config.apply_env_with(lookup)?;

        if let Some(id) = &self.agent_id {
            config.agent.agent_id = Some(id.clone());
        }
        if let Some(alias) = &self.agent_alias_id {
            config.agent.agent_alias_id = Some(alias.clone());
        }
        if let Some(dir) = &self.records_dir {
            config.storage.local_records_dir = Some(dir.clone());
            // local record directories hold the files at their root
            config.storage.records_prefix = String::new();
        }
        if let Some(dir) = &self.output_dir {
            config.storage.local_output_dir = Some(dir.clone());
        }
        if self.monitor {
            config.monitoring.enabled = true;
        }

        config.validate()?;
        self.validate_mode(&config)?;
        Ok(config)
    }

    fn validate_mode(&self, config: &AppConfig) -> Result<()> {
        if self.mode() != AnalysisMode::BedrockAgent {
            return Ok(());
        }
        validation::validate_required_field("--agent-id", &config.agent.agent_id)?;
        validation::validate_required_field("--agent-alias-id", &config.agent.agent_alias_id)?;
        Ok(())
    }
}
