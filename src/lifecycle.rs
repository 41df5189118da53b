use crate::command::Invocation;
use crate::config::TestContext;
use std::fmt::{self, Display, Formatter};

/// Externally observable state of the VM, as printed by `status`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    NotExist,
    Running,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotExist => "Does Not Exist",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
        }
    }
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}


/// The part of the VM tool's command line surface the suite drives
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VmCommand {
    Version,
    Start { show_libmachine_logs: bool },
    Status,
    Ssh(String),
    Ip,
    DockerEnv,
    Stop,
    Delete,
}

impl VmCommand {
    pub fn ssh<S>(remote_command: S) -> VmCommand
    where
        S: Into<String>,
    {
        Self::Ssh(remote_command.into())
    }

    pub fn arguments(&self, context: &TestContext) -> Vec<String> {
        match self {
            Self::Version => vec!["version".into()],
            Self::Start {
                show_libmachine_logs,
            } => {
                let mut args: Vec<String> = vec![
                    "start".into(),
                    "--vm-driver".into(),
                    context.vm_driver().into(),
                    "--iso-url".into(),
                    context.iso_url(),
                ];
                if *show_libmachine_logs {
                    args.push("--show-libmachine-logs".into());
                }
                args
            }
            Self::Status => vec!["status".into()],
            Self::Ssh(remote_command) => {
                vec!["ssh".into(), "--".into(), remote_command.clone()]
            }
            Self::Ip => vec!["ip".into()],
            Self::DockerEnv => vec!["docker-env".into()],
            Self::Stop => vec!["stop".into()],
            Self::Delete => vec!["delete".into(), "--force".into()],
        }
    }

    pub fn invocation(&self, context: &TestContext) -> Invocation {
        Invocation::new(context.cli_binary()).args(self.arguments(context))
    }

    /// Whether the command changes the VM's lifecycle state
    pub fn mutates_vm(&self) -> bool {
        matches!(self, Self::Start { .. } | Self::Stop | Self::Delete)
    }
}
