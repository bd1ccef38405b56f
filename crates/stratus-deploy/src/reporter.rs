//! Progress reporting
//!
//! Reporters only observe: nothing they do feeds back into the pipeline.

use crate::pipeline::PipelineState;
use crate::steps::StepKind;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info, warn};

/// Event emitted at every step boundary and every failed attempt
#[derive(Debug, Clone, PartialEq)]
pub enum DeployEvent {
    PipelineStarted {
        resource_group: String,
        location: String,
    },
    StateChanged {
        state: PipelineState,
    },
    StepStarted {
        step: StepKind,
    },
    AttemptFailed {
        operation: String,
        attempt: u32,
        max_attempts: u32,
        will_retry: bool,
        error: String,
    },
    StepSucceeded {
        step: StepKind,
        elapsed: Duration,
    },
    StepFailed {
        step: StepKind,
        error: String,
    },
    PipelineFinished {
        success: bool,
        elapsed: Duration,
    },
}

/// Receives deployment events
pub trait Reporter: Send + Sync {
    fn report(&self, event: &DeployEvent);
}

/// Emits every event as a structured `tracing` record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: &DeployEvent) {
        match event {
            DeployEvent::PipelineStarted {
                resource_group,
                location,
            } => {
                info!(
                    resource_group = %resource_group,
                    location = %location,
                    "Pipeline started"
                );
            }
            DeployEvent::StateChanged { state } => {
                info!(state = %state, "Pipeline state changed");
            }
            DeployEvent::StepStarted { step } => {
                info!(step = %step, outcome = "started", "Step started");
            }
            DeployEvent::AttemptFailed {
                operation,
                attempt,
                max_attempts,
                will_retry,
                error,
            } => {
                warn!(
                    operation = %operation,
                    attempt,
                    max_attempts,
                    will_retry,
                    error = %error,
                    "Attempt failed"
                );
            }
            DeployEvent::StepSucceeded { step, elapsed } => {
                info!(
                    step = %step,
                    outcome = "succeeded",
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Step completed"
                );
            }
            DeployEvent::StepFailed { step, error } => {
                error!(step = %step, outcome = "failed", error = %error, "Step failed");
            }
            DeployEvent::PipelineFinished { success, elapsed } => {
                info!(
                    success,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Pipeline finished"
                );
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    events: Mutex<Vec<DeployEvent>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<DeployEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of failed attempts recorded for one operation
    pub fn attempt_failures(&self, operation: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| {
                matches!(e, DeployEvent::AttemptFailed { operation: op, .. } if op == operation)
            })
            .count()
    }

    /// Steps that reported success, in order
    pub fn succeeded_steps(&self) -> Vec<StepKind> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                DeployEvent::StepSucceeded { step, .. } => Some(*step),
                _ => None,
            })
            .collect()
    }

    /// Steps that were started, in order
    pub fn started_steps(&self) -> Vec<StepKind> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                DeployEvent::StepStarted { step } => Some(*step),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, event: &DeployEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_reporter_helpers() {
        let reporter = MemoryReporter::new();
        reporter.report(&DeployEvent::StepStarted {
            step: StepKind::CreateResourceGroup,
        });
        reporter.report(&DeployEvent::AttemptFailed {
            operation: "create resource group".to_string(),
            attempt: 1,
            max_attempts: 3,
            will_retry: true,
            error: "throttled".to_string(),
        });
        reporter.report(&DeployEvent::StepSucceeded {
            step: StepKind::CreateResourceGroup,
            elapsed: Duration::from_secs(5),
        });

        assert_eq!(reporter.events().len(), 3);
        assert_eq!(reporter.attempt_failures("create resource group"), 1);
        assert_eq!(reporter.attempt_failures("create cluster"), 0);
        assert_eq!(reporter.started_steps(), vec![StepKind::CreateResourceGroup]);
        assert_eq!(reporter.succeeded_steps(), vec![StepKind::CreateResourceGroup]);
    }
}
