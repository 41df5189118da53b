use crate::command::CommandFailure;
use crate::validation::Mismatch;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    CommandFailure(#[from] CommandFailure),
    #[error(transparent)]
    OutputMismatch(#[from] Mismatch),
}

#[derive(Debug)]
pub enum StepOutcome {
    Passed,
    Failed(StepError),
    Skipped(String),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        !self.is_failure()
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

impl From<Result<(), StepError>> for StepOutcome {
    fn from(result: Result<(), StepError>) -> Self {
        match result {
            Ok(()) => Self::Passed,
            Err(err) => Self::Failed(err),
        }
    }
}

/// Outcome of one step in a suite run
#[derive(Debug)]
pub struct StepReport {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub outcome: StepOutcome,
}

/// Counts over a finished run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn of(reports: &[StepReport]) -> Tally {
        reports.iter().fold(Tally::default(), |mut tally, report| {
            match report.outcome {
                StepOutcome::Passed => tally.passed += 1,
                StepOutcome::Failed(_) => tally.failed += 1,
                StepOutcome::Skipped(_) => tally.skipped += 1,
            }
            tally
        })
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
