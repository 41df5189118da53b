//! The ordered VM lifecycle suite
//!
//! Every step queries the live VM through the CLI tool; the suite keeps no
//! state of its own. The order of [`lifecycle_steps`] is what encodes the
//! expected transitions:
//!
//! ```text
//! Does Not Exist -(start)-> Running -(stop)-> Stopped -(start)-> Running -(delete)-> Does Not Exist
//! ```

use crate::command::{CommandFailure, Executor};
use crate::config::TestContext;
use crate::lifecycle::{LifecycleState, VmCommand};
use crate::step_result::{StepError, StepOutcome, StepReport};
use crate::validation::ValidationRule;
use std::path::PathBuf;
use std::thread;
use thiserror::Error;

pub const PREVIOUS_STEP_FAILED: &str = "previous step failed";

// STEPS

#[derive(Clone, Debug)]
pub enum StepAction {
    Run {
        command: VmCommand,
        expectation: Option<ValidationRule>,
    },
    /// Wait until the driver has released the stopped VM
    Settle,
}

#[derive(Clone, Debug)]
pub struct Step {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub action: StepAction,
}

impl Step {
    pub fn run(name: &'static str, command: VmCommand) -> Step {
        Step {
            name,
            description: None,
            action: StepAction::Run {
                command,
                expectation: None,
            },
        }
    }

    pub fn check(name: &'static str, command: VmCommand, rule: ValidationRule) -> Step {
        Step {
            name,
            description: None,
            action: StepAction::Run {
                command,
                expectation: Some(rule),
            },
        }
    }

    pub fn expect_state(name: &'static str, state: LifecycleState) -> Step {
        Self::check(name, VmCommand::Status, ValidationRule::exact(state.as_str()))
    }

    pub fn settle(name: &'static str) -> Step {
        Step {
            name,
            description: None,
            action: StepAction::Settle,
        }
    }

    pub fn describe(mut self, description: &'static str) -> Step {
        self.description = Some(description);
        self
    }

    pub fn mutates_vm(&self) -> bool {
        match &self.action {
            StepAction::Run { command, .. } => command.mutates_vm(),
            StepAction::Settle => false,
        }
    }
}

pub fn lifecycle_steps() -> Vec<Step> {
    let sshfs_version =
        ValidationRule::regex(r".*SSHFS version 2\.5.*").expect("SSHFS pattern should be valid");

    vec![
        Step::run(
            "boot_vm_out_of_iso",
            VmCommand::Start {
                show_libmachine_logs: false,
            },
        )
        .describe("Boot the VM from the ISO"),
        Step::expect_state("status_after_start", LifecycleState::Running),
        Step::check(
            "ssh_connection_to_vm",
            VmCommand::ssh("echo hello"),
            ValidationRule::exact("hello"),
        )
        .describe("Run a command in the VM over SSH"),
        Step::check("ip_of_vm", VmCommand::Ip, ValidationRule::AddressFormat)
            .describe("The VM reports a valid IP"),
        Step::check(
            "docker_env_evaluable",
            VmCommand::DockerEnv,
            ValidationRule::DirectiveLines,
        )
        .describe("docker-env output is safe to eval"),
        Step::check(
            "cifs_installed",
            VmCommand::ssh("sudo /sbin/mount.cifs -V"),
            ValidationRule::exact("mount.cifs version: 6.2"),
        ),
        Step::check(
            "sshfs_installed",
            VmCommand::ssh("sudo sshfs -V"),
            sshfs_version,
        ),
        Step::check(
            "nfs_installed",
            VmCommand::ssh("sudo /sbin/mount.nfs -V"),
            ValidationRule::exact("mount.nfs: (linux nfs-utils 1.3.0)"),
        ),
        Step::check(
            "path_bindmounted",
            VmCommand::ssh(r#"findmnt | grep "\[/var/lib/" | wc -l"#),
            ValidationRule::exact("4"),
        )
        .describe("Persistent /var/lib paths are bind mounted"),
        Step::run("stopping_vm", VmCommand::Stop).describe("Stop the VM"),
        Step::expect_state("status_after_stop", LifecycleState::Stopped),
        Step::settle("settle_after_stop").describe("Let the driver release the stopped VM"),
        Step::run(
            "restart",
            VmCommand::Start {
                show_libmachine_logs: true,
            },
        )
        .describe("Start the existing VM again"),
        Step::expect_state("status_after_restart", LifecycleState::Running),
        Step::check(
            "swapspace",
            VmCommand::ssh("free | tail -n 1 | awk '{print $2}'"),
            ValidationRule::PositiveNumber,
        )
        .describe("Swap space is still available after restart"),
        Step::run("delete_vm", VmCommand::Delete).describe("Remove the VM"),
        Step::expect_state("status_after_delete", LifecycleState::NotExist),
    ]
}

// SETUP

/// The disk image the suite boots from is missing
#[derive(Clone, Debug, Error)]
#[error("Skipping testing as no ISO found at '{}'", .iso_file.display())]
pub struct PreconditionMissing {
    pub iso_file: PathBuf,
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("could not query the version of the VM tool")]
    VersionQueryFailed(#[source] CommandFailure),
}

pub enum Gate {
    Open { version: String },
    Closed(PreconditionMissing),
}

// RUN

pub struct LifecycleSuite<E> {
    context: TestContext,
    executor: E,
    steps: Vec<Step>,
}

impl<E> LifecycleSuite<E>
where
    E: Executor,
{
    pub fn new(context: TestContext, executor: E) -> LifecycleSuite<E> {
        Self::with_steps(context, executor, lifecycle_steps())
    }

    pub fn with_steps(context: TestContext, executor: E, steps: Vec<Step>) -> LifecycleSuite<E> {
        LifecycleSuite {
            context,
            executor,
            steps,
        }
    }

    pub fn context(&self) -> &TestContext {
        &self.context
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Decide whether the suite can run at all
    ///
    /// The tool has to answer `version`. A missing disk image closes the
    /// gate, which skips every step rather than failing it.
    pub fn setup(&self) -> Result<Gate, SetupError> {
        let invocation = VmCommand::Version.invocation(&self.context);
        let version = self
            .executor
            .execute(&invocation)
            .map_err(SetupError::VersionQueryFailed)?;

        tracing::info!("################################################################");
        tracing::info!("vmlife version    : {}", env!("CARGO_PKG_VERSION"));
        tracing::info!("VM tool version   : {}", version.trim_end());
        tracing::info!("################################################################");

        if !self.context.is_runnable() {
            let missing = PreconditionMissing {
                iso_file: self.context.iso_file().to_path_buf(),
            };
            tracing::warn!("{}", missing);
            return Ok(Gate::Closed(missing));
        }

        Ok(Gate::Open { version })
    }

    /// Run every step in declaration order
    ///
    /// A failed step does not stop the run unless `fail_fast` is set, in
    /// which case the remaining steps are skipped. `on_step` sees each
    /// report as soon as the step is done.
    pub fn run<F>(&self, fail_fast: bool, mut on_step: F) -> Result<Vec<StepReport>, SetupError>
    where
        F: FnMut(usize, &StepReport),
    {
        let skip_reason = match self.setup()? {
            Gate::Open { version: _ } => None,
            Gate::Closed(missing) => Some(missing.to_string()),
        };

        let mut reports = Vec::with_capacity(self.steps.len());
        let mut any_failed = false;

        for (i, step) in self.steps.iter().enumerate() {
            let outcome = if let Some(reason) = &skip_reason {
                StepOutcome::Skipped(reason.clone())
            } else if fail_fast && any_failed {
                StepOutcome::Skipped(String::from(PREVIOUS_STEP_FAILED))
            } else {
                self.run_step(step)
            };

            any_failed |= outcome.is_failure();

            let report = StepReport {
                name: step.name,
                description: step.description,
                outcome,
            };
            on_step(i, &report);
            reports.push(report);
        }

        Ok(reports)
    }

    pub fn run_step(&self, step: &Step) -> StepOutcome {
        match &step.action {
            StepAction::Run {
                command,
                expectation,
            } => {
                let invocation = command.invocation(&self.context);
                let result = self
                    .executor
                    .execute(&invocation)
                    .map_err(StepError::from)
                    .and_then(|output| match expectation {
                        Some(rule) => rule.check(&output).map_err(StepError::from),
                        None => Ok(()),
                    });

                if let Err(err) = &result {
                    tracing::debug!("Step '{}' failed: {}", step.name, err);
                }

                StepOutcome::from(result)
            }
            StepAction::Settle => {
                let delay = self.context.settle_delay();
                if !delay.is_zero() {
                    tracing::info!("Waiting {:?} before the next start", delay);
                    thread::sleep(delay);
                }
                StepOutcome::Passed
            }
        }
    }
}
