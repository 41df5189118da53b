mod cli;

use cli::OutputFormat;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use vmlife::command::ProcessExecutor;
use vmlife::config::{self, ConfigFile};
use vmlife::runner::{self, ReportConfig, ReportFormat};
use vmlife::step_result::Tally;
use vmlife::suite::LifecycleSuite;

const EXIT_CODE_SETUP_ERROR: u8 = 2;

fn main() -> ExitCode {
    let args = cli::parse();

    cli::logging::init_logging(args.verbose);

    let current_dir = match env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("Failed to get current directory: {}", err);
            return ExitCode::from(EXIT_CODE_SETUP_ERROR);
        }
    };

    let source = cli::report::config_source(args.config.as_deref(), &current_dir);

    let (config_file, config_dir) = match &args.config {
        Some(path) => match config::read_config_file(path) {
            Ok(config_file) => (config_file, config_dir(path, &current_dir)),
            Err(err) => {
                cli::report::print_config_error(&source, &err);
                return ExitCode::from(EXIT_CODE_SETUP_ERROR);
            }
        },
        None => (ConfigFile::default(), current_dir.clone()),
    };

    let context = match config::resolve_context(
        config_file,
        &config_dir,
        &args.overrides(),
        &current_dir,
    ) {
        Ok(context) => context,
        Err(err) => {
            cli::report::print_config_error(&source, &err);
            return ExitCode::from(EXIT_CODE_SETUP_ERROR);
        }
    };

    let suite = LifecycleSuite::new(context, ProcessExecutor::in_dir(&current_dir));

    let report_config = ReportConfig {
        number_of_steps: suite.steps().len(),
        format: match args.output_format {
            OutputFormat::Summary => ReportFormat::Summary {
                show_all_steps: args.show_all_steps,
            },
            OutputFormat::Tap => ReportFormat::Tap,
        },
    };

    match runner::run_suite(&suite, &report_config, args.fail_fast) {
        Ok(reports) => {
            if Tally::of(&reports).is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(_) => ExitCode::from(EXIT_CODE_SETUP_ERROR),
    }
}

fn config_dir(config_file: &Path, current_dir: &Path) -> PathBuf {
    match config_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => current_dir.join(parent),
        _ => current_dir.to_path_buf(),
    }
}
