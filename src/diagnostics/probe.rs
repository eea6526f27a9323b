//! Process memory probe
//!
//! Reports the resident-memory percentage of the current process as the OS
//! prints it. The text is opaque to the harness and only ever printed.

use crate::error::{LeakprobeError, Result};
use std::process::Command;

/// Source of the resident-memory metric
#[cfg_attr(test, mockall::automock)]
pub trait MemoryProbe {
    /// Resident memory percentage, e.g. `"0.9"`
    fn resident_percent(&self) -> Result<String>;
}

/// Probe backed by `ps -o %mem= -p <pid>`
#[derive(Debug, Clone)]
pub struct PsProbe {
    pid: u32,
}

impl Default for PsProbe {
    fn default() -> Self {
        Self::current()
    }
}

impl PsProbe {
    /// Probe the running process
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
        }
    }

    pub fn for_pid(pid: u32) -> Self {
        Self { pid }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl MemoryProbe for PsProbe {
    fn resident_percent(&self) -> Result<String> {
        let output = Command::new("ps")
            .args(["-o", "%mem=", "-p", &self.pid.to_string()])
            .output()?;

        if !output.status.success() {
            return Err(LeakprobeError::Probe(format!(
                "ps exited with {} for pid {}",
                output.status, self.pid
            )));
        }

        parse_ps_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Last non-empty line of `ps` output, trimmed
fn parse_ps_output(stdout: &str) -> Result<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
        .ok_or_else(|| LeakprobeError::Probe("ps printed no memory column".to_string()))
}
