//! Device command collaborator.
//!
//! The engine never talks to a device directly. It hands one command line at a time to a
//! [`DeviceCommander`] and waits for the verdict.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command as ProcessCommand;
use tracing::{debug, warn};

use crate::error::DeviceError;

/// Verdict for one dispatched command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// Whether the command succeeded on the device.
    pub success: bool,
    /// Failure description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchResult {
    /// A successful result.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A failed result with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Executes command lines on a device.
#[async_trait]
pub trait DeviceCommander: Send + Sync {
    /// Run one command line and report the result.
    async fn dispatch_command(
        &self,
        device_id: &str,
        project_path: &Path,
        line: &str,
    ) -> Result<DispatchResult, DeviceError>;

    /// Refresh the device screen state. Best-effort: callers ignore failures.
    async fn refresh_screen(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Configuration for [`ProcessCommander`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommanderConfig {
    /// Runner executable.
    pub program: PathBuf,
    /// Arguments placed before every generated argument list (e.g. when `program` is a wrapper).
    pub base_args: Vec<String>,
    /// Arguments for a screen refresh. Empty disables refreshing.
    pub refresh_args: Vec<String>,
}

impl Default for ProcessCommanderConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("tke"),
            base_args: Vec::new(),
            refresh_args: Vec::new(),
        }
    }
}

/// Collaborator backed by the `tke` command-line runner.
///
/// Each dispatch runs `<program> --project <path> --device <id> run step <line>` and reads a
/// JSON [`DispatchResult`] from stdout. The exit code is not consulted: the runner prints JSON
/// for failures as well.
#[derive(Debug, Clone, Default)]
pub struct ProcessCommander {
    config: ProcessCommanderConfig,
}

impl ProcessCommander {
    /// Create a commander.
    pub fn new(config: ProcessCommanderConfig) -> Self {
        Self { config }
    }

    /// Configuration.
    pub fn config(&self) -> &ProcessCommanderConfig {
        &self.config
    }

    fn program_name(&self) -> String {
        self.config.program.display().to_string()
    }
}

#[async_trait]
impl DeviceCommander for ProcessCommander {
    async fn dispatch_command(
        &self,
        device_id: &str,
        project_path: &Path,
        line: &str,
    ) -> Result<DispatchResult, DeviceError> {
        debug!(program = %self.program_name(), device = device_id, line, "dispatching step");
        let output = ProcessCommand::new(&self.config.program)
            .args(&self.config.base_args)
            .arg("--project")
            .arg(project_path)
            .args(["--device", device_id, "run", "step", line])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| DeviceError::Spawn {
                program: self.program_name(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!(stderr = %stderr.trim(), "runner wrote to stderr");
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(stdout.trim()).map_err(|err| DeviceError::InvalidOutput {
            message: err.to_string(),
            stdout: stdout.into_owned(),
        })
    }

    async fn refresh_screen(&self) -> Result<(), DeviceError> {
        if self.config.refresh_args.is_empty() {
            return Ok(());
        }
        let status = ProcessCommand::new(&self.config.program)
            .args(&self.config.base_args)
            .args(&self.config.refresh_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| DeviceError::Spawn {
                program: self.program_name(),
                source,
            })?;
        if !status.success() {
            return Err(DeviceError::Io(std::io::Error::other(format!(
                "screen refresh exited with {status}"
            ))));
        }
        Ok(())
    }
}
