//! Worker Node - Host Probe
//!
//! The only place that touches `/proc`, spawns helper commands or asks the
//! OS for memory totals and the host name. Everything else parses what is
//! handed back here.

use std::fs;
use std::future::Future;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use sysinfo::System;
use tokio::process::Command;

#[cfg(test)]
pub mod fake;

const PROC_STAT: &str = "/proc/stat";

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}: {output}")]
    Exit {
        program: String,
        status: ExitStatus,
        output: String,
    },

    #[error("{program} did not finish within {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("malformed {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    #[error("memory totals unavailable")]
    Memory,

    #[error("host name unavailable")]
    Hostname,
}

impl ProbeError {
    pub fn parse(what: &'static str, detail: impl Into<String>) -> Self {
        Self::Parse {
            what,
            detail: detail.into(),
        }
    }
}

/// Physical memory totals, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemInfo {
    pub total: u64,
    pub available: u64,
}

impl MemInfo {
    /// `1 - available / total`, `None` for a zero total.
    pub fn usage(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(1.0 - self.available as f64 / self.total as f64)
    }
}

/// Source of raw host readings.
pub trait Probe {
    /// Contents of `/proc/stat`.
    fn proc_stat(&self) -> Result<String, ProbeError>;

    /// Current memory totals.
    fn memory(&mut self) -> Result<MemInfo, ProbeError>;

    /// Stdout of `program args...`; a non-zero exit is an error carrying
    /// whatever the command printed.
    fn command(
        &self,
        program: &str,
        args: &[&str],
    ) -> impl Future<Output = Result<String, ProbeError>> + Send;

    fn hostname(&self) -> Result<String, ProbeError>;
}

/// Probe backed by the local machine.
pub struct HostProbe {
    system: System,
    command_timeout: Duration,
}

impl HostProbe {
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            system: System::new(),
            command_timeout,
        }
    }
}

impl Probe for HostProbe {
    fn proc_stat(&self) -> Result<String, ProbeError> {
        fs::read_to_string(PROC_STAT).map_err(|source| ProbeError::Read {
            path: PROC_STAT,
            source,
        })
    }

    fn memory(&mut self) -> Result<MemInfo, ProbeError> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return Err(ProbeError::Memory);
        }
        Ok(MemInfo {
            total,
            available: self.system.available_memory(),
        })
    }

    fn command(
        &self,
        program: &str,
        args: &[&str],
    ) -> impl Future<Output = Result<String, ProbeError>> + Send {
        let program = program.to_string();
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let after = self.command_timeout;

        async move {
            let mut command = Command::new(&program);
            command.args(&args).kill_on_drop(true);

            let output = match tokio::time::timeout(after, command.output()).await {
                Ok(Ok(output)) => output,
                Ok(Err(source)) => return Err(ProbeError::Spawn { program, source }),
                Err(_) => return Err(ProbeError::Timeout { program, after }),
            };

            if !output.status.success() {
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                return Err(ProbeError::Exit {
                    program,
                    status: output.status,
                    output: combined.trim().to_string(),
                });
            }

            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
    }

    fn hostname(&self) -> Result<String, ProbeError> {
        System::host_name().ok_or(ProbeError::Hostname)
    }
}
