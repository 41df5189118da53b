use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;
use vmlife::command::{CommandFailure, CommandResult, Executor, Invocation};
use vmlife::config::TestContext;
use vmlife::lifecycle::{LifecycleState, VmCommand};
use vmlife::step_result::{StepError, StepOutcome, StepReport, Tally};
use vmlife::suite::{self, Gate, LifecycleSuite, SetupError, Step};
use vmlife::validation::{Mismatch, ValidationRule};

// SECTION: scripted VM

/// Answers like the VM tool would, tracking the VM state in memory
struct FakeVm {
    state: RefCell<LifecycleState>,
    calls: RefCell<Vec<Vec<String>>>,
    overrides: Vec<(&'static str, CommandResult)>,
}

impl FakeVm {
    fn new() -> FakeVm {
        FakeVm {
            state: RefCell::new(LifecycleState::NotExist),
            calls: RefCell::new(vec![]),
            overrides: vec![],
        }
    }

    fn in_state(state: LifecycleState) -> FakeVm {
        let vm = Self::new();
        *vm.state.borrow_mut() = state;
        vm
    }

    /// Answer the subcommand `pattern`, or any remote command containing it
    fn respond(mut self, pattern: &'static str, exit_status: i32, stdout: &str) -> FakeVm {
        self.overrides.push((
            pattern,
            CommandResult {
                exit_status,
                stdout: stdout.to_owned(),
                stderr: if exit_status == 0 {
                    String::new()
                } else {
                    format!("Error running {}\n", pattern)
                },
            },
        ));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|x| x.join(" ")).collect()
    }

    fn subcommands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|x| x[0].clone()).collect()
    }
}

fn ok(stdout: &str) -> CommandResult {
    CommandResult {
        exit_status: 0,
        stdout: stdout.to_owned(),
        stderr: String::new(),
    }
}

fn err(stderr: &str) -> CommandResult {
    CommandResult {
        exit_status: 1,
        stdout: String::new(),
        stderr: stderr.to_owned(),
    }
}

impl Executor for FakeVm {
    fn run(&self, invocation: &Invocation) -> Result<CommandResult, CommandFailure> {
        self.calls.borrow_mut().push(invocation.arguments.clone());

        let args = invocation
            .arguments
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();

        let is_match = |pattern: &str| match args.as_slice() {
            ["ssh", "--", remote] => remote.contains(pattern),
            [subcommand, ..] => *subcommand == pattern,
            [] => false,
        };
        if let Some((_, result)) = self.overrides.iter().find(|(x, _)| is_match(*x)) {
            return Ok(result.clone());
        }

        let state = *self.state.borrow();
        let is_running = state == LifecycleState::Running;

        let result = match args.as_slice() {
            ["version"] => ok("minishift v1.0.0-beta.2\n"),
            ["status"] => ok(&format!("{}\n", state)),
            ["start", "--vm-driver", _, "--iso-url", ..] => {
                *self.state.borrow_mut() = LifecycleState::Running;
                CommandResult {
                    exit_status: 0,
                    stdout: String::from("Starting local OpenShift cluster...\n"),
                    stderr: String::from("-- Checking VM provisioning\n"),
                }
            }
            ["stop"] if is_running => {
                *self.state.borrow_mut() = LifecycleState::Stopped;
                ok("Stopping local OpenShift cluster...\nCluster stopped.\n")
            }
            ["delete", "--force"] if state != LifecycleState::NotExist => {
                *self.state.borrow_mut() = LifecycleState::NotExist;
                ok("Deleting the Minishift VM...\nMinishift VM deleted.\n")
            }
            ["ip"] if is_running => ok("192.168.42.10\n"),
            ["docker-env"] if is_running => ok(concat!(
                "export DOCKER_TLS_VERIFY=\"1\"\n",
                "export DOCKER_HOST=\"tcp://192.168.42.10:2376\"\n",
                "export DOCKER_CERT_PATH=\"/home/user/.minishift/certs\"\n",
                "# Run this command to configure your shell:\n",
                "# eval $(minishift docker-env)\n",
            )),
            ["ssh", "--", remote] if is_running => guest_command(remote),
            _ => err("Host is not running\n"),
        };

        Ok(result)
    }
}

fn guest_command(remote: &str) -> CommandResult {
    if remote == "echo hello" {
        ok("hello\n")
    } else if remote.contains("mount.cifs") {
        ok("mount.cifs version: 6.2\n")
    } else if remote.contains("sshfs") {
        ok("SSHFS version 2.5\nFUSE library version: 2.9.2\n")
    } else if remote.contains("mount.nfs") {
        ok("mount.nfs: (linux nfs-utils 1.3.0)\n")
    } else if remote.starts_with("findmnt") {
        ok("4\n")
    } else if remote.starts_with("free") {
        ok("1023996\n")
    } else {
        err(&format!("sh: {}: command not found\n", remote))
    }
}

// SECTION: helpers

fn context_with_iso(iso: &NamedTempFile) -> TestContext {
    TestContext::new(
        PathBuf::from("minishift"),
        "kvm",
        iso.path().to_path_buf(),
        Duration::ZERO,
    )
}

fn context_without_iso() -> TestContext {
    TestContext::new(
        PathBuf::from("minishift"),
        "kvm",
        PathBuf::from("/surely/missing/build/minishift-centos7.iso"),
        Duration::ZERO,
    )
}

fn run(suite: &LifecycleSuite<FakeVm>, fail_fast: bool) -> Vec<StepReport> {
    match suite.run(fail_fast, |_, _| {}) {
        Ok(reports) => reports,
        Err(err) => panic!("setup failed: {}", err),
    }
}

fn outcome<'a>(reports: &'a [StepReport], name: &str) -> &'a StepOutcome {
    &reports
        .iter()
        .find(|x| x.name == name)
        .unwrap_or_else(|| panic!("no step named {}", name))
        .outcome
}

fn assert_passed(reports: &[StepReport], name: &str) {
    let outcome = outcome(reports, name);
    assert!(
        matches!(outcome, StepOutcome::Passed),
        "{} did not pass: {:?}",
        name,
        outcome
    );
}

fn mismatch<'a>(reports: &'a [StepReport], name: &str) -> &'a Mismatch {
    match outcome(reports, name) {
        StepOutcome::Failed(StepError::OutputMismatch(mismatch)) => mismatch,
        other => panic!("expected {} to fail on its output, got {:?}", name, other),
    }
}

// SECTION: full run

#[test]
fn test_full_lifecycle_passes() {
    let iso = NamedTempFile::new().unwrap();
    let suite = LifecycleSuite::new(context_with_iso(&iso), FakeVm::new());

    let reports = run(&suite, false);

    assert_eq!(reports.len(), suite::lifecycle_steps().len());
    assert_eq!(
        Tally::of(&reports),
        Tally {
            passed: reports.len(),
            failed: 0,
            skipped: 0
        }
    );
    assert_eq!(*suite.executor().state.borrow(), LifecycleState::NotExist);
}

#[test]
fn test_steps_execute_in_declaration_order() {
    let iso = NamedTempFile::new().unwrap();
    let suite = LifecycleSuite::new(context_with_iso(&iso), FakeVm::new());

    let mut seen = vec![];
    suite
        .run(false, |i, report| seen.push((i, report.name)))
        .unwrap();

    let expected = suite
        .steps()
        .iter()
        .enumerate()
        .map(|(i, step)| (i, step.name))
        .collect::<Vec<_>>();
    assert_eq!(seen, expected);
}

#[test]
fn test_state_transitions_follow_lifecycle() {
    let iso = NamedTempFile::new().unwrap();
    let suite = LifecycleSuite::new(context_with_iso(&iso), FakeVm::new());

    run(&suite, false);

    let mutating = suite
        .executor()
        .subcommands()
        .into_iter()
        .filter(|x| ["start", "stop", "delete"].contains(&x.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(mutating, vec!["start", "stop", "start", "delete"]);
}

#[test]
fn test_restart_enables_libmachine_logs() {
    let iso = NamedTempFile::new().unwrap();
    let suite = LifecycleSuite::new(context_with_iso(&iso), FakeVm::new());

    run(&suite, false);

    let starts = suite
        .executor()
        .calls()
        .into_iter()
        .filter(|x| x.starts_with("start"))
        .collect::<Vec<_>>();
    let iso_url = format!("file://{}", iso.path().display());
    assert_eq!(
        starts,
        vec![
            format!("start --vm-driver kvm --iso-url {}", iso_url),
            format!("start --vm-driver kvm --iso-url {} --show-libmachine-logs", iso_url),
        ]
    );
}

// SECTION: scenarios

#[test]
fn test_boot_then_status_is_running() {
    let iso = NamedTempFile::new().unwrap();
    let suite = LifecycleSuite::new(context_with_iso(&iso), FakeVm::new());

    let boot = Step::run(
        "boot",
        VmCommand::Start {
            show_libmachine_logs: false,
        },
    );
    let status = Step::expect_state("status", LifecycleState::Running);

    assert!(matches!(suite.run_step(&boot), StepOutcome::Passed));
    assert!(matches!(suite.run_step(&status), StepOutcome::Passed));
}

#[test]
fn test_status_before_boot_is_never_running() {
    let iso = NamedTempFile::new().unwrap();

    for state in [LifecycleState::NotExist, LifecycleState::Stopped] {
        let suite = LifecycleSuite::new(context_with_iso(&iso), FakeVm::in_state(state));
        let status = Step::expect_state("status", LifecycleState::Running);

        match suite.run_step(&status) {
            StepOutcome::Failed(StepError::OutputMismatch(Mismatch::OutputMismatch {
                expected,
                got,
            })) => {
                assert_eq!(expected, "Running");
                assert_eq!(got, state.as_str());
            }
            other => panic!("expected a status mismatch, got {:?}", other),
        }
    }
}

#[test]
fn test_remote_echo_returns_hello() {
    let iso = NamedTempFile::new().unwrap();
    let suite = LifecycleSuite::new(
        context_with_iso(&iso),
        FakeVm::in_state(LifecycleState::Running),
    );

    let output = suite
        .executor()
        .execute(&VmCommand::ssh("echo hello").invocation(suite.context()))
        .unwrap();

    assert_eq!(output, "hello\n");
}

#[test]
fn test_docker_env_with_comments_exports_and_blanks_passes() {
    let iso = NamedTempFile::new().unwrap();
    let vm = FakeVm::new().respond("docker-env", 0, "# comment\nexport FOO=bar\n\n");
    let suite = LifecycleSuite::new(context_with_iso(&iso), vm);

    let reports = run(&suite, false);

    assert_passed(&reports, "docker_env_evaluable");
    assert!(Tally::of(&reports).is_success());
}

#[test]
fn test_docker_env_without_export_fails() {
    let iso = NamedTempFile::new().unwrap();
    let vm = FakeVm::new().respond("docker-env", 0, "FOO=bar\n");
    let suite = LifecycleSuite::new(context_with_iso(&iso), vm);

    let reports = run(&suite, false);

    assert_eq!(
        mismatch(&reports, "docker_env_evaluable"),
        &Mismatch::MalformedDirective {
            line_number: 1,
            line: String::from("FOO=bar"),
        }
    );
}

#[test]
fn test_mount_count_must_be_four() {
    let iso = NamedTempFile::new().unwrap();
    let vm = FakeVm::new().respond("findmnt", 0, "3\n");
    let suite = LifecycleSuite::new(context_with_iso(&iso), vm);

    let reports = run(&suite, false);

    assert_eq!(
        mismatch(&reports, "path_bindmounted"),
        &Mismatch::OutputMismatch {
            expected: String::from("4"),
            got: String::from("3"),
        }
    );
}

#[test]
fn test_status_after_delete_does_not_exist() {
    let iso = NamedTempFile::new().unwrap();
    let suite = LifecycleSuite::new(
        context_with_iso(&iso),
        FakeVm::in_state(LifecycleState::Running),
    );

    let delete = Step::run("delete", VmCommand::Delete);
    let status = Step::expect_state("status", LifecycleState::NotExist);

    assert!(matches!(suite.run_step(&delete), StepOutcome::Passed));
    assert!(matches!(suite.run_step(&status), StepOutcome::Passed));
}

#[test]
fn test_invalid_ip_has_its_own_diagnostic() {
    let iso = NamedTempFile::new().unwrap();
    let vm = FakeVm::new().respond("ip", 0, "Error getting IP\n");
    let suite = LifecycleSuite::new(context_with_iso(&iso), vm);

    let reports = run(&suite, false);

    assert_eq!(
        mismatch(&reports, "ip_of_vm"),
        &Mismatch::InvalidAddress {
            got: String::from("Error getting IP"),
        }
    );
}

#[test]
fn test_swap_lost_on_restart_fails() {
    let iso = NamedTempFile::new().unwrap();
    let vm = FakeVm::new().respond("free", 0, "0\n");
    let suite = LifecycleSuite::new(context_with_iso(&iso), vm);

    let reports = run(&suite, false);

    assert_eq!(
        mismatch(&reports, "swapspace"),
        &Mismatch::NotPositive {
            got: String::from("0"),
        }
    );
}

// SECTION: gating and failure propagation

#[test]
fn test_missing_iso_skips_every_step() {
    let suite = LifecycleSuite::new(context_without_iso(), FakeVm::new());

    let reports = run(&suite, false);

    assert_eq!(
        Tally::of(&reports),
        Tally {
            passed: 0,
            failed: 0,
            skipped: reports.len()
        }
    );
    for report in &reports {
        match &report.outcome {
            StepOutcome::Skipped(reason) => {
                assert!(reason.contains("no ISO found"), "{}", reason)
            }
            other => panic!("{} was not skipped: {:?}", report.name, other),
        }
    }
}

#[test]
fn test_missing_iso_runs_no_lifecycle_command() {
    let suite = LifecycleSuite::new(context_without_iso(), FakeVm::new());

    let reports = run(&suite, false);

    for (step, report) in suite.steps().iter().zip(&reports) {
        if step.mutates_vm() {
            assert!(report.outcome.is_skipped(), "{} was not skipped", step.name);
        }
    }
    assert_eq!(suite.executor().subcommands(), vec!["version"]);
}

#[test]
fn test_setup_reports_gate() {
    let iso = NamedTempFile::new().unwrap();

    let open = LifecycleSuite::new(context_with_iso(&iso), FakeVm::new());
    match open.setup() {
        Ok(Gate::Open { version }) => assert_eq!(version, "minishift v1.0.0-beta.2\n"),
        _ => panic!("expected the gate to be open"),
    }

    let closed = LifecycleSuite::new(context_without_iso(), FakeVm::new());
    match closed.setup() {
        Ok(Gate::Closed(missing)) => assert_eq!(
            missing.iso_file,
            PathBuf::from("/surely/missing/build/minishift-centos7.iso")
        ),
        _ => panic!("expected the gate to be closed"),
    }
}

#[test]
fn test_broken_tool_is_a_setup_error() {
    let iso = NamedTempFile::new().unwrap();
    let vm = FakeVm::new().respond("version", 127, "");
    let suite = LifecycleSuite::new(context_with_iso(&iso), vm);

    let result = suite.run(false, |_, _| {});

    assert!(matches!(
        result,
        Err(SetupError::VersionQueryFailed(CommandFailure::NonZeroExit {
            exit_status: 127,
            ..
        }))
    ));
    assert_eq!(suite.executor().subcommands(), vec!["version"]);
}

#[test]
fn test_failed_step_does_not_stop_the_run() {
    let iso = NamedTempFile::new().unwrap();
    let vm = FakeVm::new().respond("findmnt", 0, "3\n");
    let suite = LifecycleSuite::new(context_with_iso(&iso), vm);

    let reports = run(&suite, false);

    assert_eq!(
        Tally::of(&reports),
        Tally {
            passed: reports.len() - 1,
            failed: 1,
            skipped: 0
        }
    );
    assert_passed(&reports, "stopping_vm");
    assert_passed(&reports, "status_after_delete");
}

#[test]
fn test_failed_boot_cascades_into_later_steps() {
    let iso = NamedTempFile::new().unwrap();
    let vm = FakeVm::new().respond("start", 1, "");
    let suite = LifecycleSuite::new(context_with_iso(&iso), vm);

    let reports = run(&suite, false);

    assert!(matches!(
        outcome(&reports, "boot_vm_out_of_iso"),
        StepOutcome::Failed(StepError::CommandFailure(
            CommandFailure::NonZeroExit { .. }
        ))
    ));
    assert_eq!(
        mismatch(&reports, "status_after_start"),
        &Mismatch::OutputMismatch {
            expected: String::from("Running"),
            got: String::from("Does Not Exist"),
        }
    );
    assert!(matches!(
        outcome(&reports, "ssh_connection_to_vm"),
        StepOutcome::Failed(StepError::CommandFailure(_))
    ));
    // Nothing to delete, so teardown fails on its own while the final state is still correct
    assert!(outcome(&reports, "delete_vm").is_failure());
    assert_passed(&reports, "status_after_delete");
}

#[test]
fn test_fail_fast_skips_remaining_steps() {
    let iso = NamedTempFile::new().unwrap();
    let vm = FakeVm::new().respond("findmnt", 0, "3\n");
    let suite = LifecycleSuite::new(context_with_iso(&iso), vm);

    let reports = run(&suite, true);

    let position = reports
        .iter()
        .position(|x| x.name == "path_bindmounted")
        .unwrap();

    assert!(reports[..position].iter().all(|x| matches!(x.outcome, StepOutcome::Passed)));
    assert!(reports[position].outcome.is_failure());
    for report in &reports[position + 1..] {
        match &report.outcome {
            StepOutcome::Skipped(reason) => assert_eq!(reason, suite::PREVIOUS_STEP_FAILED),
            other => panic!("{} was not skipped: {:?}", report.name, other),
        }
    }
    assert!(!suite.executor().subcommands().contains(&String::from("stop")));
}

#[test]
fn test_custom_steps() {
    let iso = NamedTempFile::new().unwrap();
    let steps = vec![
        Step::expect_state("status_before_start", LifecycleState::NotExist),
        Step::run(
            "start",
            VmCommand::Start {
                show_libmachine_logs: false,
            },
        ),
        Step::check(
            "guest_kernel",
            VmCommand::ssh("uname -s"),
            ValidationRule::regex("^Linux$").unwrap(),
        ),
    ];
    let vm = FakeVm::new().respond("uname", 0, "Linux\n");
    let suite = LifecycleSuite::with_steps(context_with_iso(&iso), vm, steps);

    let reports = run(&suite, false);

    assert_eq!(reports.len(), 3);
    assert!(Tally::of(&reports).is_success());
}
