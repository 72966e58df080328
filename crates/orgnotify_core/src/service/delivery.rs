//! Hand-off of a generated batch to the external delivery collaborator.
//!
//! # Responsibility
//! - Invoke delivery only when the run created at least one artifact.
//! - Turn the collaborator's exit status into a [`DeliveryOutcome`].
//!
//! # Invariants
//! - Delivery failures of any kind (non-zero exit, signal, timeout, spawn
//!   error) are recovered into `DeliveryOutcome::Failed`; they never abort
//!   the run.

use crate::config::DeliveryConfig;
use crate::process::{run_captured, CapturedOutput, ProcessError};
use log::{error, info};
use std::time::Duration;

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Nothing was generated, so the collaborator was not invoked.
    Skipped,
    Delivered,
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Sends the batch behind the archive's `latest` link.
pub trait DeliveryCollaborator {
    /// Blocks until the delivery attempt finishes.
    fn deliver(&self) -> Result<CapturedOutput, ProcessError>;
}

/// Delivery through an external program such as a compose stack.
#[derive(Debug, Clone)]
pub struct CommandDelivery {
    config: DeliveryConfig,
}

impl CommandDelivery {
    pub fn new(config: DeliveryConfig) -> Self {
        Self { config }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }
}

impl DeliveryCollaborator for CommandDelivery {
    fn deliver(&self) -> Result<CapturedOutput, ProcessError> {
        run_captured(&self.config.command, &[], &[], Some(self.config.timeout()))
    }
}

/// Gates and interprets the delivery step.
pub struct DeliveryTrigger<'a, D: DeliveryCollaborator> {
    collaborator: &'a D,
}

impl<'a, D: DeliveryCollaborator> DeliveryTrigger<'a, D> {
    pub fn new(collaborator: &'a D) -> Self {
        Self { collaborator }
    }

    /// Delivers the batch when `created_count > 0`.
    pub fn trigger(&self, created_count: usize) -> DeliveryOutcome {
        if created_count == 0 {
            info!("event=delivery module=delivery status=skipped reason=nothing_to_deliver");
            return DeliveryOutcome::Skipped;
        }

        info!("event=delivery module=delivery status=start artifacts={created_count}");
        match self.collaborator.deliver() {
            Ok(output) if output.success() => {
                info!("event=delivery module=delivery status=ok");
                DeliveryOutcome::Delivered
            }
            Ok(output) => {
                let reason = if output.timed_out {
                    "delivery timed out".to_string()
                } else {
                    match output.exit_code {
                        Some(code) => format!("delivery exited with status {code}"),
                        None => "delivery terminated by signal".to_string(),
                    }
                };
                error!("event=delivery module=delivery status=error reason={reason}");
                error!(
                    "Delivery diagnostic output: {}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                );
                DeliveryOutcome::Failed { reason }
            }
            Err(err) => {
                error!("event=delivery module=delivery status=error error={err}");
                DeliveryOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DeliveryCollaborator, DeliveryOutcome, DeliveryTrigger};
    use crate::process::{CapturedOutput, ProcessError};
    use std::cell::Cell;

    struct ScriptedDelivery {
        exit_code: Option<i32>,
        timed_out: bool,
        calls: Cell<usize>,
    }

    impl ScriptedDelivery {
        fn exiting(exit_code: Option<i32>) -> Self {
            Self {
                exit_code,
                timed_out: false,
                calls: Cell::new(0),
            }
        }
    }

    impl DeliveryCollaborator for ScriptedDelivery {
        fn deliver(&self) -> Result<CapturedOutput, ProcessError> {
            self.calls.set(self.calls.get() + 1);
            Ok(CapturedOutput {
                exit_code: self.exit_code,
                stdout: b"mailer log".to_vec(),
                stderr: b"smtp refused".to_vec(),
                timed_out: self.timed_out,
            })
        }
    }

    #[test]
    fn zero_artifacts_never_invokes_collaborator() {
        let delivery = ScriptedDelivery::exiting(Some(0));
        let outcome = DeliveryTrigger::new(&delivery).trigger(0);
        assert_eq!(outcome, DeliveryOutcome::Skipped);
        assert_eq!(delivery.calls.get(), 0);
    }

    #[test]
    fn zero_exit_status_is_delivered() {
        let delivery = ScriptedDelivery::exiting(Some(0));
        let outcome = DeliveryTrigger::new(&delivery).trigger(2);
        assert!(outcome.is_delivered());
        assert_eq!(delivery.calls.get(), 1);
    }

    #[test]
    fn non_zero_signal_and_timeout_are_failures() {
        let failed = ScriptedDelivery::exiting(Some(1));
        assert!(matches!(
            DeliveryTrigger::new(&failed).trigger(1),
            DeliveryOutcome::Failed { .. }
        ));

        let signalled = ScriptedDelivery::exiting(None);
        assert!(matches!(
            DeliveryTrigger::new(&signalled).trigger(1),
            DeliveryOutcome::Failed { .. }
        ));

        let timed_out = ScriptedDelivery {
            exit_code: None,
            timed_out: true,
            calls: Cell::new(0),
        };
        assert_eq!(
            DeliveryTrigger::new(&timed_out).trigger(1),
            DeliveryOutcome::Failed {
                reason: "delivery timed out".to_string()
            }
        );
    }
}
