//! Command execution
//!
//! Every interaction with the host cluster goes through one primitive:
//! run a management tool as a subprocess with a controlled environment and
//! capture what it printed. The executor never retries; retry policy
//! belongs to callers.

use crate::error::ClientError;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Variables the host platform injects into every pod. They would make the
/// provisioning CLI target the host's in-cluster config instead of the
/// requested credentials.
pub const CLUSTER_ENV_KEYS: [&str; 3] = [
    "KUBERNETES_SERVICE_HOST",
    "KUBERNETES_SERVICE_PORT",
    "KUBERNETES_PORT",
];

/// Variable naming the credentials file for both tools.
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Management tools kubehatch drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Cluster-orchestration CLI
    Kubectl,
    /// Virtual-cluster provisioning CLI
    Vcluster,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kubectl => write!(f, "kubectl"),
            Self::Vcluster => write!(f, "vcluster"),
        }
    }
}

/// One subprocess call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run
    pub tool: Tool,
    /// Arguments after the program name
    pub args: Vec<String>,
    /// Directory the process starts in; inherited when `None`
    pub working_dir: Option<PathBuf>,
    /// Credentials file exported as `KUBECONFIG`
    pub kubeconfig: Option<PathBuf>,
    /// Drop [`CLUSTER_ENV_KEYS`] from the inherited environment
    pub strip_cluster_env: bool,
}

impl Invocation {
    /// Call of `tool` with `args` in the inherited directory and environment.
    pub fn new<I, S>(tool: Tool, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool,
            args: args.into_iter().map(Into::into).collect(),
            working_dir: None,
            kubeconfig: None,
            strip_cluster_env: false,
        }
    }

    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_kubeconfig(mut self, kubeconfig: Option<&Path>) -> Self {
        self.kubeconfig = kubeconfig.map(Path::to_path_buf);
        self
    }

    #[must_use]
    pub fn strip_cluster_env(mut self) -> Self {
        self.strip_cluster_env = true;
        self
    }

    /// Human readable command line, for logs.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.tool.to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Whether the arguments contain `needle` as a contiguous run.
    #[must_use]
    pub fn has_args(&self, needle: &[&str]) -> bool {
        needle.is_empty()
            || self
                .args
                .windows(needle.len())
                .any(|w| w.iter().zip(needle).all(|(a, b)| a == b))
    }
}

/// What a subprocess printed and how it exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
    /// Exit status as printed by the OS
    pub status: String,
}

impl CommandOutput {
    /// Successful run printing `stdout`.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
            success: true,
            status: "exit status: 0".to_string(),
        }
    }

    /// Failed run printing `stderr`.
    pub fn failed(stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: stderr.into(),
            success: false,
            status: "exit status: 1".to_string(),
        }
    }

    /// Stdout followed by stderr, lossily decoded, for diagnostics.
    #[must_use]
    pub fn combined(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        text
    }
}

/// Executes [`Invocation`]s.
///
/// Only a failure to start the process is an `Err`; a non-zero exit is
/// reported through [`CommandOutput::success`].
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ClientError>;
}

/// Drop every variable whose key is in `excluded`.
pub fn filter_env<I, K, V>(env: I, excluded: &[&str]) -> Vec<(K, V)>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<OsStr>,
{
    env.into_iter()
        .filter(|(key, _)| !excluded.iter().any(|x| key.as_ref() == OsStr::new(x)))
        .collect()
}

/// Environment for `invocation` derived from `env`: cluster variables
/// stripped when requested, `KUBECONFIG` overridden when a credentials path
/// is given.
pub fn process_env<I>(env: I, invocation: &Invocation) -> Vec<(OsString, OsString)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut vars: Vec<(OsString, OsString)> = if invocation.strip_cluster_env {
        filter_env(env, &CLUSTER_ENV_KEYS)
    } else {
        env.into_iter().collect()
    };
    if let Some(path) = &invocation.kubeconfig {
        vars = filter_env(vars, &[KUBECONFIG_ENV]);
        vars.push((OsString::from(KUBECONFIG_ENV), path.clone().into_os_string()));
    }
    vars
}

/// Runs tools as real subprocesses.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    kubectl_bin: String,
    vcluster_bin: String,
}

impl ProcessRunner {
    pub fn new(kubectl_bin: impl Into<String>, vcluster_bin: impl Into<String>) -> Self {
        Self {
            kubectl_bin: kubectl_bin.into(),
            vcluster_bin: vcluster_bin.into(),
        }
    }

    fn program(&self, tool: Tool) -> &str {
        match tool {
            Tool::Kubectl => &self.kubectl_bin,
            Tool::Vcluster => &self.vcluster_bin,
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new("kubectl", "vcluster")
    }
}

#[async_trait::async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ClientError> {
        let program = self.program(invocation.tool);
        let mut cmd = Command::new(program);
        cmd.args(&invocation.args)
            .env_clear()
            .envs(process_env(std::env::vars_os(), invocation))
            .stdin(Stdio::null());
        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }

        debug!(
            "Executing: {} (in {})",
            invocation.command_line(),
            invocation
                .working_dir
                .as_deref()
                .map_or_else(|| ".".to_string(), |d| d.display().to_string())
        );

        let output = cmd.output().await.map_err(|source| ClientError::Spawn {
            tool: program.to_string(),
            source,
        })?;

        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
