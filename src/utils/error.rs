use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Patient not found: {name}")]
    PatientNotFound { name: String },

    #[error("XML parsing failed: {message}")]
    XmlParsing { message: String },

    #[error("Data validation failed: {message}")]
    DataValidation { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Model invocation failed ({code}): {message}")]
    Model { code: String, message: String },

    #[error("Bedrock Agent invocation failed ({code}): {message}")]
    Agent { code: String, message: String },

    #[error("Research correlation failed: {message}")]
    Research { message: String },

    #[error("Report generation failed: {message}")]
    Report { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("Workflow timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Parsing,
    Storage,
    Inference,
    Configuration,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

const RETRYABLE_MODEL_CODES: &[&str] = &[
    "ThrottlingException",
    "ServiceUnavailableException",
    "ServiceUnavailable",
    "ModelNotReadyException",
];

impl AnalysisError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn xml(message: impl Into<String>) -> Self {
        Self::XmlParsing {
            message: message.into(),
        }
    }

    pub fn model(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Model {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn agent(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Agent {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::PatientNotFound { .. } | Self::DataValidation { .. } => ErrorCategory::Input,
            Self::XmlParsing { .. } | Self::Serialization(_) | Self::Toml(_) => {
                ErrorCategory::Parsing
            }
            Self::Storage { .. } | Self::Io(_) => ErrorCategory::Storage,
            Self::Model { .. } | Self::Agent { .. } => ErrorCategory::Inference,
            Self::Config { .. } | Self::InvalidConfigValue { .. } | Self::MissingConfig { .. } => {
                ErrorCategory::Configuration
            }
            Self::Research { .. } | Self::Report { .. } => ErrorCategory::Processing,
            Self::Timeout { .. } => ErrorCategory::System,
        }
    }

    /// Variant tag without any message text.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PatientNotFound { .. } => "patient_not_found",
            Self::XmlParsing { .. } => "xml_parsing",
            Self::DataValidation { .. } => "data_validation",
            Self::Storage { .. } => "storage",
            Self::Model { .. } => "model",
            Self::Agent { .. } => "agent",
            Self::Research { .. } => "research",
            Self::Report { .. } => "report",
            Self::Config { .. } => "config",
            Self::InvalidConfigValue { .. } => "invalid_config_value",
            Self::MissingConfig { .. } => "missing_config",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Toml(_) => "toml",
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Model { .. } if self.is_retryable_model_error() => ErrorSeverity::Medium,
            Self::Timeout { .. } => ErrorSeverity::Medium,
            Self::Config { .. } | Self::InvalidConfigValue { .. } | Self::MissingConfig { .. } => {
                ErrorSeverity::Critical
            }
            Self::Io(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Throttling and transient availability errors from Bedrock.
    pub fn is_retryable_model_error(&self) -> bool {
        match self {
            Self::Model { code, .. } => RETRYABLE_MODEL_CODES.contains(&code.as_str()),
            _ => false,
        }
    }

    /// The agent could not reach its action-group Lambda because of missing
    /// invoke permissions.
    pub fn is_agent_permission_failure(&self) -> bool {
        match self {
            Self::Agent { code, message } => {
                let text = format!("{code} {message}").to_lowercase();
                text.contains("dependencyfailedexception") && text.contains("access denied")
            }
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::PatientNotFound { .. } => {
                "Verify the patient name spelling or run with --list-patients"
            }
            Self::XmlParsing { .. } => "Check that the patient record is well-formed XML",
            Self::DataValidation { .. } => "Review the patient record for missing required fields",
            Self::Storage { .. } => "Check AWS credentials, S3 bucket name and bucket permissions",
            Self::Model { .. } if self.is_retryable_model_error() => {
                "Bedrock is throttling requests; try again in a few minutes"
            }
            Self::Model { .. } => "Verify Bedrock model access is enabled for this account and region",
            Self::Agent { .. } if self.is_agent_permission_failure() => {
                "Grant the Bedrock Agent permission to invoke its action group Lambda"
            }
            Self::Agent { .. } => "Check the agent id, alias id and that the agent is prepared",
            Self::Research { .. } => "The medical summary is available; retry research analysis later",
            Self::Report { .. } => "Retry the analysis; if it persists contact support with the workflow id",
            Self::Config { .. } | Self::InvalidConfigValue { .. } | Self::MissingConfig { .. } => {
                "Check command line flags, environment variables and the config file"
            }
            Self::Timeout { .. } => "Increase workflow.timeout_seconds or retry later",
            Self::Io(_) => "Check file permissions and available disk space",
            Self::Serialization(_) => "The response was not valid JSON; retry the request",
            Self::Toml(_) => "Fix the syntax of the TOML configuration file",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::PatientNotFound { name } => format!("No medical record found for '{}'", name),
            Self::XmlParsing { .. } => "The patient record could not be read".to_string(),
            Self::Storage { .. } => "Could not access medical record storage".to_string(),
            Self::Model { .. } => "The AI model could not complete the analysis".to_string(),
            Self::Agent { .. } => "The Bedrock Agent could not complete the analysis".to_string(),
            Self::Timeout { seconds } => format!("The analysis did not finish within {}s", seconds),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_permission_failure_detection() {
        let err = AnalysisError::agent(
            "dependencyFailedException",
            "Access denied while invoking Lambda function arn:aws:lambda:us-east-1:1:function:x",
        );
        assert!(err.is_agent_permission_failure());

        let other = AnalysisError::agent("dependencyFailedException", "Lambda timed out");
        assert!(!other.is_agent_permission_failure());

        let model = AnalysisError::model("AccessDeniedException", "Access denied");
        assert!(!model.is_agent_permission_failure());
    }

    #[test]
    fn test_retryable_codes() {
        assert!(AnalysisError::model("ThrottlingException", "slow down").is_retryable_model_error());
        assert!(!AnalysisError::model("ValidationException", "bad").is_retryable_model_error());
        assert_eq!(
            AnalysisError::model("ThrottlingException", "slow down").severity(),
            ErrorSeverity::Medium
        );
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = AnalysisError::MissingConfig {
            field: "agent_id".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
