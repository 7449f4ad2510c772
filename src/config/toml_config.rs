use crate::utils::audit;
use crate::utils::error::{AnalysisError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BUCKET: &str = "patient-records-20251024";
pub const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-haiku-20240307-v1:0";

/// Full runtime configuration.
///
/// Layers: defaults, then an optional TOML file, then environment variables,
/// then command line flags (applied by the CLI).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub aws: AwsConfig,
    pub storage: StorageConfig,
    pub models: ModelConfig,
    pub workflow: WorkflowConfig,
    pub agent: AgentConfig,
    pub monitoring: MonitoringConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
    pub s3_bucket: String,
    pub s3_endpoint_url: Option<String>,
    pub cross_account_role_arn: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            s3_bucket: DEFAULT_BUCKET.to_string(),
            s3_endpoint_url: None,
            cross_account_role_arn: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub records_prefix: String,
    pub reports_prefix: String,
    /// Read records from this directory instead of S3.
    pub local_records_dir: Option<String>,
    /// Write reports to this directory instead of S3.
    pub local_output_dir: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            records_prefix: "patient-records/".to_string(),
            reports_prefix: "analysis-reports".to_string(),
            local_records_dir: None,
            local_output_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub timeout_seconds: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub agent_id: Option<String>,
    pub agent_alias_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Salt mixed into hashed patient names in audit events.
    pub hash_salt: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            hash_salt: audit::DEFAULT_AUDIT_SALT.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed)?)
    }

    /// Defaults overlaid with the process environment. Used by the Lambda.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces `${VAR}` with the value of the environment variable; unknown
    /// variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| AnalysisError::Config {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Overlays values found through `lookup` (normally `std::env::var`).
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("AWS_REGION") {
            self.aws.region = v;
        }
        if let Some(v) = get("S3_BUCKET") {
            self.aws.s3_bucket = v;
        }
        if let Some(v) = get("S3_ENDPOINT_URL") {
            self.aws.s3_endpoint_url = Some(v);
        }
        if let Some(v) = get("CROSS_ACCOUNT_ROLE_ARN") {
            self.aws.cross_account_role_arn = Some(v);
        }
        if let Some(v) = get("RECORDS_PREFIX") {
            self.storage.records_prefix = v;
        }
        if let Some(v) = get("REPORTS_PREFIX") {
            self.storage.reports_prefix = v;
        }
        if let Some(v) = get("BEDROCK_MODEL_ID") {
            self.models.model_id = v;
        }
        if let Some(v) = get("BEDROCK_MAX_TOKENS") {
            self.models.max_tokens = parse_env("BEDROCK_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("BEDROCK_TEMPERATURE") {
            self.models.temperature = parse_env("BEDROCK_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("BEDROCK_MAX_RETRIES") {
            self.models.max_retries = parse_env("BEDROCK_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("WORKFLOW_TIMEOUT_SECONDS") {
            self.workflow.timeout_seconds = parse_env("WORKFLOW_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("BEDROCK_AGENT_ID") {
            self.agent.agent_id = Some(v);
        }
        if let Some(v) = get("BEDROCK_AGENT_ALIAS_ID") {
            self.agent.agent_alias_id = Some(v);
        }
        if let Some(v) = get("AUDIT_HASH_SALT") {
            self.audit.hash_salt = v;
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AnalysisError::InvalidConfigValue {
            field: key.to_string(),
            value: value.to_string(),
            reason: "Not a valid number".to_string(),
        })
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_aws_region("aws.region", &self.aws.region)?;
        validation::validate_s3_bucket_name("aws.s3_bucket", &self.aws.s3_bucket)?;
        if let Some(endpoint) = &self.aws.s3_endpoint_url {
            validation::validate_url("aws.s3_endpoint_url", endpoint)?;
        }
        if let Some(arn) = &self.aws.cross_account_role_arn {
            if !arn.starts_with("arn:aws:iam::") {
                return Err(AnalysisError::InvalidConfigValue {
                    field: "aws.cross_account_role_arn".to_string(),
                    value: arn.clone(),
                    reason: "Expected an IAM role ARN".to_string(),
                });
            }
        }

        validation::validate_non_empty_string("storage.reports_prefix", &self.storage.reports_prefix)?;
        if let Some(dir) = &self.storage.local_records_dir {
            validation::validate_path("storage.local_records_dir", dir)?;
        }
        if let Some(dir) = &self.storage.local_output_dir {
            validation::validate_path("storage.local_output_dir", dir)?;
        }

        validation::validate_non_empty_string("models.model_id", &self.models.model_id)?;
        validation::validate_range("models.max_tokens", self.models.max_tokens, 1, 200_000)?;
        validation::validate_range("models.temperature", self.models.temperature, 0.0, 1.0)?;
        validation::validate_range("models.max_retries", self.models.max_retries, 1, 10)?;
        validation::validate_range("models.retry_base_delay_ms", self.models.retry_base_delay_ms, 0, 60_000)?;
        validation::validate_range("workflow.timeout_seconds", self.workflow.timeout_seconds, 1, 3600)?;
        validation::validate_non_empty_string("audit.hash_salt", &self.audit.hash_salt)?;

        Ok(())
    }
}
