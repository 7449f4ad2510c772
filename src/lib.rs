pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{cli::LocalStorage, CliConfig};

pub use config::aws::{S3Storage, StorageBackend};
pub use config::toml_config::AppConfig;
pub use config::AnalysisMode;
pub use core::action_group::{ActionGroupEvent, ActionGroupHandler};
pub use core::analyzers::{AnyAnalyzer, BedrockAnalyzer, LocalAnalyzer};
pub use core::engine::AnalysisEngine;
pub use core::workflow::{AgentRunResult, AgentWorkflow, AnalysisPipeline, PipelineSettings};
pub use utils::error::{AnalysisError, Result};
