//! Access to the router's configuration.
//!
//! On Keenetic devices with Entware, `ndmc -c "<command>"` runs a single CLI
//! command against the live configuration. [`NdmcRouter`] uses it both to
//! read the running configuration and to apply planned commands.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::command::Command;
use crate::error::{Result, SyncError};

/// Default location of the router CLI client.
const DEFAULT_NDMC: &str = "ndmc";

/// Persists the running configuration to flash.
const SAVE_COMMAND: &str = "system configuration save";

/// Reads and changes the router configuration.
#[async_trait]
pub trait Router: Send + Sync {
    /// Returns the current running configuration as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read.
    async fn running_config(&self) -> Result<String>;

    /// Applies `commands` in order.
    ///
    /// # Errors
    ///
    /// Returns an error on the first command the router rejects.
    async fn apply(&self, commands: &[Command]) -> Result<()>;
}

/// Router driven through the `ndmc` command-line client.
#[derive(Debug, Clone)]
pub struct NdmcRouter {
    binary: PathBuf,
    save: bool,
}

impl NdmcRouter {
    /// Uses `ndmc` from `PATH` and saves the configuration after applying.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_NDMC),
            save: true,
        }
    }

    /// Uses a specific `ndmc` binary (useful for testing).
    #[must_use]
    pub fn binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Skips `system configuration save` after applying.
    #[must_use]
    pub const fn without_save(mut self) -> Self {
        self.save = false;
        self
    }

    async fn exec(&self, line: &str) -> Result<String> {
        let output = tokio::process::Command::new(&self.binary)
            .arg("-c")
            .arg(line)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        Err(SyncError::Router {
            command: line.to_string(),
            message,
        })
    }
}

impl Default for NdmcRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Router for NdmcRouter {
    async fn running_config(&self) -> Result<String> {
        self.exec("show running-config").await
    }

    async fn apply(&self, commands: &[Command]) -> Result<()> {
        for command in commands {
            let line = command.to_string();
            self.exec(&line).await?;
            tracing::debug!(group = command.group(), command = %line, "Applied router command");
        }
        if self.save && !commands.is_empty() {
            self.exec(SAVE_COMMAND).await?;
        }
        tracing::info!(commands = commands.len(), "Applied router commands");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_an_io_error() {
        let router = NdmcRouter::new().binary("/nonexistent/ndmc");
        assert!(matches!(router.running_config().await, Err(SyncError::Io(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_reports_its_line() {
        let router = NdmcRouter::new().binary("false").without_save();
        let err = router
            .apply(&[Command::RemoveGroup {
                group: "domain-list0".into(),
            }])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Router { ref command, .. } if command == "no object-group fqdn domain-list0"
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reads_stdout_of_show_command() {
        let router = NdmcRouter::new().binary("echo");
        let text = router.running_config().await.unwrap();
        assert_eq!(text.trim(), "-c show running-config");
    }
}
