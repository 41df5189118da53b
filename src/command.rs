use itertools::Itertools;
use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// A program together with its argument list
///
/// Arguments are handed to the program as-is, so nothing is interpreted by a
/// host shell. Pipelines meant for a remote shell are passed as one argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub arguments: Vec<String>,
}

impl Invocation {
    pub fn new<P>(program: P) -> Invocation
    where
        P: Into<PathBuf>,
    {
        Invocation {
            program: program.into(),
            arguments: vec![],
        }
    }

    pub fn arg<S>(mut self, argument: S) -> Invocation
    where
        S: Into<String>,
    {
        self.arguments.push(argument.into());
        self
    }

    pub fn args<I, S>(mut self, arguments: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let program = quote_argument(&self.program.to_string_lossy());
        if self.arguments.is_empty() {
            write!(f, "{}", program)
        } else {
            let arguments = self.arguments.iter().map(|x| quote_argument(x)).join(" ");
            write!(f, "{} {}", program, arguments)
        }
    }
}

fn quote_argument(argument: &str) -> String {
    let is_plain = !argument.is_empty()
        && argument
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c));

    if is_plain {
        argument.to_owned()
    } else {
        format!("'{}'", argument.replace('\'', r"'\''"))
    }
}

/// Everything observed from one finished invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        self.exit_status == 0
    }
}

#[derive(Debug, Error)]
pub enum CommandFailure {
    #[error("failed to run `{command}`: {source}")]
    FailedToSpawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("`{command}` wrote output that is not valid UTF-8")]
    FailedToDecodeUtf8 { command: String },
    #[error("`{command}` was terminated without an exit code")]
    MissingExitCode { command: String },
    #[error("`{command}` exited with status {exit_status}")]
    NonZeroExit {
        command: String,
        exit_status: i32,
        stderr: String,
    },
}

impl CommandFailure {
    pub fn command(&self) -> &str {
        match self {
            Self::FailedToSpawn { command, .. } => command,
            Self::FailedToDecodeUtf8 { command } => command,
            Self::MissingExitCode { command } => command,
            Self::NonZeroExit { command, .. } => command,
        }
    }
}

/// Runs invocations on behalf of the suite
///
/// Implementors only have to provide [`Executor::run`]. The exit status
/// contract lives in [`Executor::execute`], which every step goes through.
pub trait Executor {
    fn run(&self, invocation: &Invocation) -> Result<CommandResult, CommandFailure>;

    /// Run the invocation once and return its standard output
    ///
    /// A non-zero exit status is a failure carrying the captured stderr.
    /// Stderr next to a zero exit status is only logged.
    fn execute(&self, invocation: &Invocation) -> Result<String, CommandFailure> {
        let command = invocation.to_string();
        tracing::info!("Executing command : {}", command);

        let result = self.run(invocation)?;

        if !result.is_success() {
            tracing::debug!("Error: {}", result.stderr.trim_end());
            return Err(CommandFailure::NonZeroExit {
                command,
                exit_status: result.exit_status,
                stderr: result.stderr,
            });
        }

        if !result.stderr.trim().is_empty() {
            tracing::warn!(
                "`{}` succeeded but wrote to stderr: {}",
                command,
                result.stderr.trim_end()
            );
        }

        Ok(result.stdout)
    }
}

/// Spawns real child processes
pub struct ProcessExecutor {
    current_dir: Option<PathBuf>,
}

impl ProcessExecutor {
    pub fn new() -> ProcessExecutor {
        ProcessExecutor { current_dir: None }
    }

    pub fn in_dir<P>(current_dir: P) -> ProcessExecutor
    where
        P: AsRef<Path>,
    {
        ProcessExecutor {
            current_dir: Some(current_dir.as_ref().to_path_buf()),
        }
    }
}

impl Executor for ProcessExecutor {
    fn run(&self, invocation: &Invocation) -> Result<CommandResult, CommandFailure> {
        let command = invocation.to_string();

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.arguments);
        if let Some(current_dir) = &self.current_dir {
            cmd.current_dir(current_dir);
        }
        cmd.stdin(Stdio::null());

        // `output` drains both pipes concurrently
        let output = cmd
            .output()
            .map_err(|source| CommandFailure::FailedToSpawn {
                command: command.clone(),
                source,
            })?;

        let exit_status = output
            .status
            .code()
            .ok_or_else(|| CommandFailure::MissingExitCode {
                command: command.clone(),
            })?;

        let stdout = decode_utf8(output.stdout, &command)?;
        let stderr = decode_utf8(output.stderr, &command)?;

        Ok(CommandResult {
            exit_status,
            stdout,
            stderr,
        })
    }
}

fn decode_utf8(buf: Vec<u8>, command: &str) -> Result<String, CommandFailure> {
    String::from_utf8(buf).map_err(|_err| CommandFailure::FailedToDecodeUtf8 {
        command: command.to_owned(),
    })
}
