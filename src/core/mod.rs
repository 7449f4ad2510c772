pub mod action_group;
pub mod agent;
pub mod analyzers;
pub mod bedrock;
pub mod conditions;
pub mod engine;
pub mod prompts;
pub mod quality;
pub mod report;
pub mod research;
pub mod resolver;
pub mod workflow;
pub mod xml_parser;

pub use crate::domain::model::{AnalysisOutcome, PatientData};
pub use crate::domain::ports::{AgentInvoker, Analyzer, ModelInvoker, Storage};
pub use crate::utils::error::Result;
