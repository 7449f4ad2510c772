use crate::core::workflow::AnalysisPipeline;
use crate::domain::model::AnalysisOutcome;
use crate::domain::ports::{Analyzer, Storage};
use crate::utils::error::{AnalysisError, Result};
use crate::utils::monitor::ProcessMonitor;
use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowStats {
    pub total_workflows: u64,
    pub successful_workflows: u64,
    pub failed_workflows: u64,
    pub total_duration_seconds: f64,
}

impl WorkflowStats {
    pub fn average_duration_seconds(&self) -> f64 {
        if self.total_workflows == 0 {
            0.0
        } else {
            self.total_duration_seconds / self.total_workflows as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_workflows == 0 {
            0.0
        } else {
            self.successful_workflows as f64 / self.total_workflows as f64
        }
    }

    fn record(&mut self, success: bool, duration: Duration) {
        self.total_workflows += 1;
        if success {
            self.successful_workflows += 1;
        } else {
            self.failed_workflows += 1;
        }
        self.total_duration_seconds += duration.as_secs_f64();
    }
}

/// Runs a pipeline under the workflow timeout and keeps run statistics.
pub struct AnalysisEngine<S: Storage, A: Analyzer> {
    pipeline: AnalysisPipeline<S, A>,
    timeout: Duration,
    monitor: Option<ProcessMonitor>,
    stats: Mutex<WorkflowStats>,
}

impl<S: Storage, A: Analyzer> AnalysisEngine<S, A> {
    pub fn new(pipeline: AnalysisPipeline<S, A>, timeout: Duration) -> Self {
        Self::new_with_monitoring(pipeline, timeout, false)
    }

    pub fn new_with_monitoring(pipeline: AnalysisPipeline<S, A>, timeout: Duration, monitor_enabled: bool) -> Self {
        let monitor = if monitor_enabled {
            Some(ProcessMonitor::new(true))
        } else {
            None
        };

        Self {
            pipeline,
            timeout,
            monitor,
            stats: Mutex::new(WorkflowStats::default()),
        }
    }

    pub fn pipeline(&self) -> &AnalysisPipeline<S, A> {
        &self.pipeline
    }

    pub fn stats(&self) -> WorkflowStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub async fn run(&self, patient_name: &str) -> Result<AnalysisOutcome> {
        if let Some(monitor) = &self.monitor {
            monitor.log_stats("Workflow start");
        }
        let started = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.pipeline.run(patient_name)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("Workflow exceeded the {}s timeout", self.timeout.as_secs());
                Err(AnalysisError::Timeout {
                    seconds: self.timeout.as_secs(),
                })
            }
        };

        let elapsed = started.elapsed();
        if let Ok(mut stats) = self.stats.lock() {
            stats.record(result.is_ok(), elapsed);
        }

        if let Some(monitor) = &self.monitor {
            monitor.log_stats("Workflow end");
            monitor.log_final_stats();
        }

        match &result {
            Ok(outcome) => tracing::info!(
                "Workflow {} completed in {:.2}s",
                outcome.workflow_id,
                outcome.duration_seconds
            ),
            Err(e) => tracing::error!("Workflow failed after {:.2}s: {}", elapsed.as_secs_f64(), e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_averages() {
        let mut stats = WorkflowStats::default();
        assert_eq!(stats.average_duration_seconds(), 0.0);

        stats.record(true, Duration::from_secs(2));
        stats.record(false, Duration::from_secs(4));
        assert_eq!(stats.total_workflows, 2);
        assert_eq!(stats.failed_workflows, 1);
        assert!((stats.average_duration_seconds() - 3.0).abs() < 1e-9);
        assert!((stats.success_rate() - 0.5).abs() < 1e-9);
    }
}
