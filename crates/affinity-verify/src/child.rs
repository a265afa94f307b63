//! Probe process launch and verification
//!
//! Each verification spawns the probe with the scenario's environment,
//! reads its status line through [`read_status`], and only then reaps the
//! process. A probe that misses the read deadline, or fails to exit within
//! the exit deadline, is killed so it cannot stall the run.

use affinity_core::{MaskString, AFFINITY_MASK_ENV, HIERARCHY_ENV};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::protocol::{read_status, ReadError, DEFAULT_READ_TIMEOUT_MS};
use crate::verdict::Verdict;

/// How long to wait for the probe to exit after its status was read
pub const DEFAULT_EXIT_TIMEOUT_MS: u64 = 10_000;

/// Probe invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeCommand {
    /// Probe executable
    pub program: PathBuf,
    /// Arguments passed before the driver identity
    pub args: Vec<String>,
    /// Variable carrying the affinity mask
    pub mask_env: String,
    /// Variable carrying the device hierarchy mode
    pub hierarchy_env: String,
    /// Deadline for each status line read, in milliseconds
    pub read_timeout_ms: u64,
    /// Deadline for the probe to exit once reading is done, in milliseconds
    pub exit_timeout_ms: u64,
    /// Kill the probe when the read deadline elapses
    pub kill_on_timeout: bool,
}

impl ProbeCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            mask_env: AFFINITY_MASK_ENV.to_string(),
            hierarchy_env: HIERARCHY_ENV.to_string(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            exit_timeout_ms: DEFAULT_EXIT_TIMEOUT_MS,
            kill_on_timeout: true,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn exit_timeout(&self) -> Duration {
        Duration::from_millis(self.exit_timeout_ms)
    }
}

/// Checks a driver's device count by running the probe in a child process
pub struct ChildVerifier {
    probe: ProbeCommand,
}

impl ChildVerifier {
    pub fn new(probe: ProbeCommand) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &ProbeCommand {
        &self.probe
    }

    /// Verify that the driver exposes `expected` devices under `mask`
    pub async fn verify(&self, mask: &MaskString, expected: usize, driver: &str) -> Verdict {
        let env = [(self.probe.mask_env.clone(), mask.as_str().to_string())];
        self.verify_env(&env, expected, driver).await
    }

    /// Verify with arbitrary environment assignments for the probe
    ///
    /// The mask and hierarchy variables are cleared from the inherited
    /// environment first so only the assignments given here apply.
    pub async fn verify_env(
        &self,
        env: &[(String, String)],
        expected: usize,
        driver: &str,
    ) -> Verdict {
        let mut child = match self.spawn(env, driver) {
            Ok(child) => child,
            Err(e) => {
                warn!(
                    program = %self.probe.program.display(),
                    error = %e,
                    "Failed to launch probe"
                );
                return Verdict::LaunchFailed {
                    reason: e.to_string(),
                };
            }
        };

        let read_timeout = self.probe.read_timeout();
        let report = match child.stdout.take() {
            Some(stdout) => {
                let mut reader = BufReader::new(stdout);
                read_status(&mut reader, read_timeout).await
            }
            None => Err(ReadError::Empty),
        };

        let verdict = match report {
            Ok(report) if report.status.is_success() => {
                if report.status.count == expected {
                    Verdict::Pass {
                        count: report.status.count,
                    }
                } else {
                    Verdict::CountMismatch {
                        expected,
                        observed: report.status.count,
                    }
                }
            }
            Ok(report) => Verdict::ChildReported {
                diagnostic: report.diagnostic.unwrap_or_default(),
            },
            Err(ReadError::Timeout(after)) => Verdict::Timeout {
                after_ms: after.as_millis() as u64,
            },
            Err(e @ ReadError::Malformed(_)) => Verdict::MalformedStatus {
                reason: e.to_string(),
            },
            Err(e) => Verdict::ReadFailed {
                reason: e.to_string(),
            },
        };

        if matches!(verdict, Verdict::Timeout { .. }) && self.probe.kill_on_timeout {
            warn!(pid = ?child.id(), "Probe missed read deadline, killing it");
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "Probe already exited");
            }
        }

        self.reap(&mut child).await;
        verdict
    }

    fn spawn(&self, env: &[(String, String)], driver: &str) -> std::io::Result<Child> {
        let mut command = Command::new(&self.probe.program);
        command
            .args(&self.probe.args)
            .arg(driver)
            .env_remove(&self.probe.mask_env)
            .env_remove(&self.probe.hierarchy_env)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn()?;
        debug!(
            program = %self.probe.program.display(),
            pid = ?child.id(),
            env = ?env,
            "Spawned probe"
        );
        Ok(child)
    }

    /// Wait for the probe to exit, killing it once the exit deadline passes
    async fn reap(&self, child: &mut Child) {
        let exit_timeout = self.probe.exit_timeout();
        match timeout(exit_timeout, child.wait()).await {
            Ok(Ok(status)) => debug!(status = %status, "Probe exited"),
            Ok(Err(e)) => warn!(error = %e, "Failed waiting for probe"),
            Err(_) => {
                info!(
                    timeout_ms = self.probe.exit_timeout_ms,
                    "Probe did not exit in time, killing it"
                );
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill probe");
                }
            }
        }
    }
}
