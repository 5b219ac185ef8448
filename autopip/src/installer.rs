//! Package installation through pip
//!
//! Real installs and the non-mutating existence check (`pip install --dry-run`)
//! both go through the configured interpreter as `<python> -m pip ...`.

use async_trait::async_trait;
use std::process::{Output, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Error type for installer operations
#[derive(Debug, Error)]
pub enum InstallError {
    /// pip (or the interpreter running it) cannot be used at all. Fatal.
    #[error("Package manager unavailable: {0}")]
    ManagerUnavailable(String),

    /// pip ran and refused or failed the install. Recoverable.
    #[error("Failed to install {package}: {reason}")]
    Rejected { package: String, reason: String },

    #[error("Failed to execute pip: {0}")]
    Io(#[from] std::io::Error),
}

/// Installs packages and answers whether a package name exists in the index
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Install `package`; `module` is the import that required it
    async fn install(&self, package: &str, module: &str) -> Result<(), InstallError>;

    /// Dry-run check: does this exact package name resolve in the index?
    async fn exists(&self, package: &str) -> Result<bool, InstallError>;
}

/// pip driven through `<python> -m pip`
#[derive(Debug, Clone)]
pub struct PipInstaller {
    python: String,
    extra_args: Vec<String>,
}

impl PipInstaller {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            extra_args: Vec::new(),
        }
    }

    /// Extra arguments appended to every real install (e.g. `--user`)
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn pip(&self) -> Command {
        let mut cmd = Command::new(&self.python);
        cmd.arg("-m").arg("pip");
        cmd.env("PIP_DISABLE_PIP_VERSION_CHECK", "1");
        cmd.env("PYTHONDONTWRITEBYTECODE", "1");
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<Output, InstallError> {
        let output = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InstallError::ManagerUnavailable(format!(
                        "interpreter '{}' not found",
                        self.python
                    ))
                } else {
                    InstallError::Io(e)
                }
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No module named pip") {
            return Err(InstallError::ManagerUnavailable(format!(
                "pip is not installed for '{}'",
                self.python
            )));
        }

        Ok(output)
    }

    pub fn install_args(&self, package: &str) -> Vec<String> {
        let mut args = vec!["install".to_string()];
        args.extend(self.extra_args.iter().cloned());
        args.push(package.to_string());
        args
    }

    pub fn dry_run_args(package: &str) -> Vec<String> {
        ["install", "--dry-run", "--no-deps", "--quiet", package]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

#[async_trait]
impl PackageInstaller for PipInstaller {
    async fn install(&self, package: &str, module: &str) -> Result<(), InstallError> {
        info!("Installing {} for module '{}'", package, module);

        let mut cmd = self.pip();
        cmd.args(self.install_args(package));
        let output = self.run(cmd).await?;

        if output.status.success() {
            debug!("Successfully installed {}", package);
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("pip install {} failed: {}", package, stderr.trim());
            Err(InstallError::Rejected {
                package: package.to_string(),
                reason: failure_reason(&stderr, output.status.code()),
            })
        }
    }

    async fn exists(&self, package: &str) -> Result<bool, InstallError> {
        let mut cmd = self.pip();
        cmd.args(Self::dry_run_args(package));
        let output = self.run(cmd).await?;

        debug!(
            "Dry-run check for {}: {}",
            package,
            if output.status.success() { "found" } else { "not found" }
        );
        Ok(output.status.success())
    }
}

/// Last meaningful line of pip's stderr, or the exit code when pip said nothing
fn failure_reason(stderr: &str, code: Option<i32>) -> String {
    stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| !l.starts_with("[notice]"))
        .last()
        .map(str::to_string)
        .unwrap_or_else(|| match code {
            Some(c) => format!("pip exited with status {}", c),
            None => "pip was terminated by a signal".to_string(),
        })
}
