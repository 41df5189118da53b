use crate::command::Executor;
use crate::formats::tree::Node;
use crate::formats::{tap, tree};
use crate::step_result::{StepOutcome, StepReport, Tally};
use crate::suite::{LifecycleSuite, SetupError};
use colored::Colorize;
use itertools::Itertools;

pub struct ReportConfig {
    pub number_of_steps: usize,
    pub format: ReportFormat,
}

pub enum ReportFormat {
    Summary { show_all_steps: bool },
    Tap,
}

// RUN SUITE

pub fn run_suite<E>(
    suite: &LifecycleSuite<E>,
    report_config: &ReportConfig,
    fail_fast: bool,
) -> Result<Vec<StepReport>, SetupError>
where
    E: Executor,
{
    report_start(report_config);

    let result = suite.run(fail_fast, |i, report| {
        report_step(report_config, i, report);
    });

    match &result {
        Ok(reports) => report_summary(report_config, reports),
        Err(err) => report_setup_error(report_config, err),
    }

    result
}

// REPORTING

fn report_start(report_config: &ReportConfig) {
    match report_config.format {
        ReportFormat::Summary { show_all_steps: _ } => {
            summary_print_start(report_config.number_of_steps);
        }
        ReportFormat::Tap => {
            tap_print_start(report_config.number_of_steps);
        }
    }
}

fn report_step(report_config: &ReportConfig, index: usize, report: &StepReport) {
    match report_config.format {
        ReportFormat::Summary { show_all_steps: _ } => {
            summary_print_step(report);
        }
        ReportFormat::Tap => {
            let test_number_indent_level = report_config.number_of_steps.to_string().len();
            tap_print_step(index + 1, report, test_number_indent_level);
        }
    }
}

fn report_summary(report_config: &ReportConfig, reports: &[StepReport]) {
    match report_config.format {
        ReportFormat::Summary { show_all_steps } => {
            summary_print_summary(show_all_steps, reports);
        }
        ReportFormat::Tap => {}
    }
}

fn report_setup_error(report_config: &ReportConfig, err: &SetupError) {
    match report_config.format {
        ReportFormat::Summary { show_all_steps: _ } => {
            let SetupError::VersionQueryFailed(failure) = err;
            println!();
            println!();
            println!("❌ {}", err);
            println!("   {}", failure);
        }
        ReportFormat::Tap => {
            tap::print_bail_out(&err.to_string());
        }
    }
}

fn step_message(report: &StepReport) -> String {
    match report.description {
        Some(description) => format!("{} - {}", report.name, description),
        None => report.name.to_owned(),
    }
}

fn failure_diagnostics(report: &StepReport) -> String {
    match &report.outcome {
        StepOutcome::Failed(err) => {
            let tree = Node(err.to_string(), tree::tree_from_step_error(err));
            tree::draw_tree(&tree).unwrap_or_else(|_| String::from("Failed to draw tree\n"))
        }
        _ => String::new(),
    }
}

// SUMMARY HELPERS

fn summary_print_start(number_of_steps: usize) {
    println!("Running {} steps:", number_of_steps)
}

fn summary_print_step(report: &StepReport) {
    match report.outcome {
        StepOutcome::Passed => print!("."),
        StepOutcome::Failed(_) => print!("F"),
        StepOutcome::Skipped(_) => print!("S"),
    }
}

fn summary_print_summary(show_all_steps: bool, reports: &[StepReport]) {
    println!(); // Add newline to dots

    let mut is_any_step_printed = false;

    for report in reports {
        let is_interesting = match report.outcome {
            StepOutcome::Failed(_) => true,
            StepOutcome::Passed | StepOutcome::Skipped(_) => show_all_steps,
        };

        if is_interesting {
            if !is_any_step_printed {
                println!();
                is_any_step_printed = true;
            }

            summary_print_result(report);
        }
    }

    if !show_all_steps {
        summary_print_skip_reasons(reports);
    }

    let tally = Tally::of(reports);

    let status = if tally.is_success() {
        "OK".green()
    } else {
        "FAIL".red()
    };

    println!();
    println!(
        "Test result: {} ({} passed, {} failed, {} skipped)",
        status, tally.passed, tally.failed, tally.skipped,
    );
}

fn summary_print_result(report: &StepReport) {
    let message = step_message(report);

    match &report.outcome {
        StepOutcome::Passed => println!("✅ {}", message),
        StepOutcome::Skipped(reason) => println!("⏭️  {} ({})", message, reason.yellow()),
        StepOutcome::Failed(_) => print!("❌ {}\n{}", message, failure_diagnostics(report)),
    }
}

fn summary_print_skip_reasons(reports: &[StepReport]) {
    let reasons = reports
        .iter()
        .filter_map(|report| match &report.outcome {
            StepOutcome::Skipped(reason) => Some(reason.as_str()),
            _ => None,
        })
        .counts();

    for (reason, count) in reasons.into_iter().sorted() {
        println!();
        println!("⏭️  {} steps skipped: {}", count, reason.yellow());
    }
}

// TAP HELPERS

fn tap_print_start(number_of_steps: usize) {
    tap::print_version();
    tap::print_plan(1, number_of_steps);
}

fn tap_print_step(test_number: usize, report: &StepReport, indent_level: usize) {
    match &report.outcome {
        StepOutcome::Passed => tap::print_ok(test_number, report.name, indent_level),
        StepOutcome::Skipped(reason) => {
            tap::print_skip(test_number, report.name, reason, indent_level)
        }
        StepOutcome::Failed(_) => tap::print_not_ok(
            test_number,
            report.name,
            &failure_diagnostics(report),
            indent_level,
        ),
    }
}
