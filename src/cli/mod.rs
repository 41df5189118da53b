pub mod logging;
pub mod report;

use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use vmlife::config::Overrides;

pub fn parse() -> Args {
    Args::parse()
}

/// Drive a VM through its lifecycle with its command line tool
#[derive(Parser)]
#[clap(bin_name = "vmlife")]
pub struct Args {
    /// Path to a TOML or YAML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Name of or path to the VM command line tool [default: minishift]
    #[arg(long)]
    pub cli_binary: Option<String>,

    /// VM driver passed to `start --vm-driver` [default: kvm]
    #[arg(long)]
    pub vm_driver: Option<String>,

    /// Path or glob pattern of the ISO to boot [default: build/minishift-centos7.iso]
    #[arg(long)]
    pub iso: Option<String>,

    /// Seconds to wait after stopping the VM before starting it again [default: 60]
    #[arg(long)]
    pub settle_seconds: Option<u64>,

    /// Options: summary, tap
    #[arg(long, default_value = "summary")]
    pub output_format: OutputFormat,

    /// Show all steps in summary, regardless of step status
    #[arg(long)]
    pub show_all_steps: bool,

    /// Skip the remaining steps after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Enable debug logging, including the stderr of failed commands
    #[arg(long)]
    pub verbose: bool,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            cli_binary: self.cli_binary.clone(),
            vm_driver: self.vm_driver.clone(),
            iso: self.iso.clone(),
            settle_seconds: self.settle_seconds,
        }
    }
}

#[derive(Clone)]
pub enum OutputFormat {
    Summary,
    Tap,
}

impl FromStr for OutputFormat {
    type Err = &'static str;

    fn from_str(format: &str) -> Result<Self, Self::Err> {
        match format {
            "summary" => Ok(Self::Summary),
            "tap" => Ok(Self::Tap),
            _ => Err("Invalid output format"),
        }
    }
}
