// components/provision_engine/src/actions.rs
//! Step framework for check-then-apply provisioning
//!
//! A step transforms one pipeline state into the next. Before doing any work
//! the runner asks the step whether there is anything to do (`check`); a step
//! with nothing to do produces its output through `preview`, which never
//! touches the filesystem or runs a program.

use crate::error::Result;
use crate::report::{send_log, Reporter};
use std::fmt;
use std::future::Future;

/// Unique identifier for a pipeline step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepId(&'static str);

impl StepId {
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution mode for steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Show what would happen without running anything
    DryRun,
    /// Actually provision
    Apply,
}

pub trait Step<Input, Output> {
    fn id(&self) -> StepId;
    fn description(&self) -> String;

    /// Whether `apply` has work to do for this input
    fn check(&self, input: &Input) -> impl Future<Output = Result<bool>> + Send;

    fn apply(&self, input: Input) -> impl Future<Output = Result<Output>> + Send;

    /// Build the output without side effects
    fn preview(&self, input: Input) -> impl Future<Output = Result<Output>> + Send;
}

/// Run one step in the given mode
///
/// Errors are returned untouched so the caller's `?` ends the pipeline at
/// this step.
pub async fn execute_step<I, O, S, R>(step: &S, input: I, mode: ExecutionMode, reporter: &R) -> Result<O>
where
    S: Step<I, O>,
    R: Reporter + ?Sized,
{
    send_log!(reporter, Info, "{}", step.description());
    tracing::debug!(step = %step.id(), ?mode, "entering step");

    match mode {
        ExecutionMode::DryRun => step.preview(input).await,
        ExecutionMode::Apply => {
            if step.check(&input).await? {
                let output = step.apply(input).await?;
                tracing::debug!(step = %step.id(), "step complete");
                Ok(output)
            } else {
                send_log!(reporter, Info, "{}: already done, skipping", step.id());
                step.preview(input).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use crate::report::stub::RecordingReporter;
    use crate::report::NoticeLevel;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Doubler {
        done: bool,
        applied: Mutex<u32>,
    }

    impl Step<i32, i32> for Doubler {
        fn id(&self) -> StepId {
            StepId::new("double")
        }

        fn description(&self) -> String {
            "Double the input".to_string()
        }

        async fn check(&self, _input: &i32) -> Result<bool> {
            Ok(!self.done)
        }

        async fn apply(&self, input: i32) -> Result<i32> {
            *self.applied.lock() += 1;
            Ok(input * 2)
        }

        async fn preview(&self, input: i32) -> Result<i32> {
            Ok(input * 2)
        }
    }

    struct Failing;

    impl Step<i32, i32> for Failing {
        fn id(&self) -> StepId {
            StepId::new("fail")
        }

        fn description(&self) -> String {
            "Always fails".to_string()
        }

        async fn check(&self, _input: &i32) -> Result<bool> {
            Ok(true)
        }

        async fn apply(&self, _input: i32) -> Result<i32> {
            Err(ProvisionError::Recipe("boom".into()))
        }

        async fn preview(&self, input: i32) -> Result<i32> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn apply_runs_when_work_is_needed() {
        let reporter = RecordingReporter::shared();
        let step = Doubler::default();

        let out = execute_step(&step, 5, ExecutionMode::Apply, &reporter).await.unwrap();

        assert_eq!(out, 10);
        assert_eq!(*step.applied.lock(), 1);
    }

    #[tokio::test]
    async fn finished_step_is_previewed_not_applied() {
        let reporter = RecordingReporter::shared();
        let step = Doubler {
            done: true,
            ..Default::default()
        };

        let out = execute_step(&step, 5, ExecutionMode::Apply, &reporter).await.unwrap();

        assert_eq!(out, 10);
        assert_eq!(*step.applied.lock(), 0);
        assert!(reporter
            .messages(NoticeLevel::Info)
            .iter()
            .any(|m| m.contains("skipping")));
    }

    #[tokio::test]
    async fn dry_run_never_applies() {
        let reporter = RecordingReporter::shared();
        let step = Doubler::default();

        execute_step(&step, 1, ExecutionMode::DryRun, &reporter).await.unwrap();
        assert_eq!(*step.applied.lock(), 0);

        let failing = execute_step(&Failing, 1, ExecutionMode::DryRun, &reporter).await;
        assert!(failing.is_ok());
    }

    #[test]
    fn step_futures_can_cross_threads() {
        fn assert_send<T: Send>(_: &T) {}

        let step = Doubler::default();
        let reporter = RecordingReporter::shared();
        let future = execute_step(&step, 1, ExecutionMode::Apply, reporter.as_ref());
        assert_send(&future);
    }

    #[tokio::test]
    async fn errors_propagate() {
        let reporter = RecordingReporter::shared();
        let result = execute_step(&Failing, 1, ExecutionMode::Apply, &reporter).await;
        assert!(result.is_err());
    }
}
