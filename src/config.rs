use crate::utils::file;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::env;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CLI_BINARY: &str = "minishift";
pub const DEFAULT_VM_DRIVER: &str = "kvm";
pub const DEFAULT_ISO: &str = "build/minishift-centos7.iso";
pub const DEFAULT_SETTLE_SECONDS: u64 = 60;

/// Where a local build of the tool puts its binary
pub const BUILD_BIN_DIR: &str = "build/bin";

// TEST CONTEXT

/// Configuration of one suite run
///
/// Resolved once before the first step and read-only afterwards.
#[derive(Clone, Debug)]
pub struct TestContext {
    cli_binary: PathBuf,
    vm_driver: String,
    iso_file: PathBuf,
    settle_delay: Duration,
    runnable: bool,
}

impl TestContext {
    pub fn new<D>(
        cli_binary: PathBuf,
        vm_driver: D,
        iso_file: PathBuf,
        settle_delay: Duration,
    ) -> TestContext
    where
        D: Into<String>,
    {
        let runnable = iso_file.is_file();

        TestContext {
            cli_binary,
            vm_driver: vm_driver.into(),
            iso_file,
            settle_delay,
            runnable,
        }
    }

    pub fn cli_binary(&self) -> &Path {
        &self.cli_binary
    }

    pub fn vm_driver(&self) -> &str {
        &self.vm_driver
    }

    pub fn iso_file(&self) -> &Path {
        &self.iso_file
    }

    pub fn iso_url(&self) -> String {
        format!("file://{}", self.iso_file.display())
    }

    /// Pause between stopping the VM and booting it again
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Whether the disk image was present when the context was resolved
    pub fn is_runnable(&self) -> bool {
        self.runnable
    }
}

// READ CONFIG FILE

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file")]
    FailedToReadFile(#[source] io::Error),
    #[error("failed to parse config file: {0}")]
    FailedToParseToml(#[source] toml::de::Error),
    #[error("failed to parse config file: {0}")]
    FailedToParseYaml(#[source] serde_yaml::Error),
    #[error("invalid configuration")]
    Invalid(BTreeSet<ConfigValidationError>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> ConfigFormat {
        match path.extension().and_then(|x| x.to_str()) {
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Toml,
        }
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    cli_binary: Option<ConfigValue<String>>,
    vm_driver: Option<ConfigValue<String>>,
    iso: Option<ConfigValue<String>>,
    settle_seconds: Option<ConfigValue<u64>>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(untagged)]
enum ConfigValue<T> {
    Literal(T),
    WrappedLiteral { value: T },
    ReadFromFile { file: String },
    FetchFromEnv { env: String },
}

pub fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::FailedToReadFile)?;
    parse_config(&content, ConfigFormat::from_path(path))
}

pub fn parse_config(content: &str, format: ConfigFormat) -> Result<ConfigFile, ConfigError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(ConfigError::FailedToParseToml),
        ConfigFormat::Yaml => {
            // An empty YAML document is a valid, empty config
            if content.trim().is_empty() {
                return Ok(ConfigFile::default());
            }
            serde_yaml::from_str(content).map_err(ConfigError::FailedToParseYaml)
        }
    }
}

// RESOLVE CONTEXT

/// Values given on the command line, relative to the working directory
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub cli_binary: Option<String>,
    pub vm_driver: Option<String>,
    pub iso: Option<String>,
    pub settle_seconds: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigValidationError {
    MissingExternalFile(String),
    MissingEnvVar(String),
    FailedToParseString { field: &'static str, value: String },
    CliBinaryNotFound(String),
    InvalidIsoPattern(String),
}

impl Display for ConfigValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingExternalFile(file_path) => {
                write!(f, "Missing external file '{}'", file_path)
            }
            Self::MissingEnvVar(var_name) => {
                write!(f, "Missing environment variable '{}'", var_name)
            }
            Self::FailedToParseString { field, value } => {
                write!(f, "Failed to parse '{}' for the field '{}'", value, field)
            }
            Self::CliBinaryNotFound(program) => {
                write!(f, "The program '{}' was not found", program)
            }
            Self::InvalidIsoPattern(pattern) => {
                write!(f, "The image pattern '{}' is invalid", pattern)
            }
        }
    }
}

/// Build the context for a run
///
/// Command line values win over config file values, which win over the
/// defaults. Relative config file values are resolved against `config_dir`,
/// everything else against `current_dir`.
pub fn resolve_context(
    config: ConfigFile,
    config_dir: &Path,
    overrides: &Overrides,
    current_dir: &Path,
) -> Result<TestContext, ConfigError> {
    let mut validation_errors = BTreeSet::new();

    let (cli_binary_name, cli_binary_dir) = pick_value(
        &mut validation_errors,
        "cli_binary",
        overrides.cli_binary.clone(),
        config.cli_binary,
        DEFAULT_CLI_BINARY.to_owned(),
        config_dir,
        current_dir,
    );

    let (vm_driver, _) = pick_value(
        &mut validation_errors,
        "vm_driver",
        overrides.vm_driver.clone(),
        config.vm_driver,
        DEFAULT_VM_DRIVER.to_owned(),
        config_dir,
        current_dir,
    );

    let (iso, iso_dir) = pick_value(
        &mut validation_errors,
        "iso",
        overrides.iso.clone(),
        config.iso,
        DEFAULT_ISO.to_owned(),
        config_dir,
        current_dir,
    );

    let (settle_seconds, _) = pick_value(
        &mut validation_errors,
        "settle_seconds",
        overrides.settle_seconds,
        config.settle_seconds,
        DEFAULT_SETTLE_SECONDS,
        config_dir,
        current_dir,
    );

    let bin_dir = cli_binary_dir.join(BUILD_BIN_DIR);
    let cli_binary = match file::find_executable_path_in(&cli_binary_name, &bin_dir, cli_binary_dir)
    {
        Ok(path) => path,
        Err(_) => {
            validation_errors.insert(ConfigValidationError::CliBinaryNotFound(cli_binary_name));
            PathBuf::new()
        }
    };

    let iso_path = file::resolve_path(&iso, iso_dir);
    let iso_file = match file::first_match(&iso_path) {
        Ok(Some(found)) => found,
        Ok(None) => iso_path,
        Err(_) => {
            validation_errors.insert(ConfigValidationError::InvalidIsoPattern(iso));
            iso_path
        }
    };

    if !validation_errors.is_empty() {
        return Err(ConfigError::Invalid(validation_errors));
    }

    Ok(TestContext::new(
        cli_binary,
        vm_driver,
        iso_file,
        Duration::from_secs(settle_seconds),
    ))
}

fn pick_value<'a, T>(
    validation_errors: &mut BTreeSet<ConfigValidationError>,
    field: &'static str,
    override_value: Option<T>,
    config_value: Option<ConfigValue<T>>,
    default: T,
    config_dir: &'a Path,
    current_dir: &'a Path,
) -> (T, &'a Path)
where
    T: FromStr,
{
    if let Some(value) = override_value {
        return (value, current_dir);
    }

    match config_value.map(|x| x.read(field, config_dir)) {
        Some(Ok(value)) => (value, config_dir),
        Some(Err(err)) => {
            validation_errors.insert(err);
            (default, current_dir)
        }
        None => (default, current_dir),
    }
}

impl<T> ConfigValue<T>
where
    T: FromStr,
{
    fn read(self, field: &'static str, config_dir: &Path) -> Result<T, ConfigValidationError> {
        match self {
            Self::Literal(value) => Ok(value),
            Self::WrappedLiteral { value } => Ok(value),
            Self::ReadFromFile { file: file_path } => {
                let content = fs::read_to_string(config_dir.join(&file_path))
                    .map_err(|_err| ConfigValidationError::MissingExternalFile(file_path))?;
                parse_string(field, content.trim_end())
            }
            Self::FetchFromEnv { env: var_name } => {
                let content = env::var(&var_name)
                    .map_err(|_err| ConfigValidationError::MissingEnvVar(var_name))?;
                parse_string(field, &content)
            }
        }
    }
}

fn parse_string<T>(field: &'static str, value: &str) -> Result<T, ConfigValidationError>
where
    T: FromStr,
{
    value
        .parse()
        .map_err(|_err| ConfigValidationError::FailedToParseString {
            field,
            value: value.to_owned(),
        })
}
