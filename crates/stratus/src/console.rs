//! Terminal progress output

use colored::Colorize;
use stratus_deploy::{DeployEvent, Reporter};

/// Prints step boundaries and retried attempts to stdout
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }

    fn line(event: &DeployEvent) -> Option<String> {
        let line = match event {
            DeployEvent::PipelineStarted { .. } | DeployEvent::StateChanged { .. } => return None,
            DeployEvent::StepStarted { step } => {
                format!("{} {}", "→".blue(), step.to_string().bold())
            }
            DeployEvent::AttemptFailed {
                operation,
                attempt,
                max_attempts,
                will_retry,
                error,
            } => {
                let next = if *will_retry { ", retrying" } else { "" };
                format!(
                    "  {} {} failed (attempt {}/{}{}): {}",
                    "⚠".yellow(),
                    operation,
                    attempt,
                    max_attempts,
                    next,
                    error.dimmed()
                )
            }
            DeployEvent::StepSucceeded { step, elapsed } => format!(
                "  {} {} ({:.1}s)",
                "✓".green(),
                step,
                elapsed.as_secs_f64()
            ),
            DeployEvent::StepFailed { step, .. } => {
                format!("  {} {}", "✗".red(), step.to_string().red())
            }
            DeployEvent::PipelineFinished { success: false, .. } => {
                "Stopped; completed steps were left in place"
                    .yellow()
                    .to_string()
            }
            DeployEvent::PipelineFinished { success: true, .. } => return None,
        };
        Some(line)
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, event: &DeployEvent) {
        if let Some(line) = Self::line(event) {
            println!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use stratus_deploy::StepKind;

    #[test]
    fn test_attempt_line_mentions_retry() {
        colored::control::set_override(false);
        let line = ConsoleReporter::line(&DeployEvent::AttemptFailed {
            operation: "create storage account".to_string(),
            attempt: 1,
            max_attempts: 3,
            will_retry: true,
            error: "API error (429) TooManyRequests: slow down".to_string(),
        })
        .unwrap();

        assert!(line.contains("create storage account failed (attempt 1/3, retrying)"));
        assert!(line.contains("TooManyRequests"));
    }

    #[test]
    fn test_quiet_events() {
        assert!(
            ConsoleReporter::line(&DeployEvent::PipelineFinished {
                success: true,
                elapsed: Duration::from_secs(3),
            })
            .is_none()
        );
        assert!(
            ConsoleReporter::line(&DeployEvent::StepStarted {
                step: StepKind::CreateCdn
            })
            .is_some()
        );
    }
}
