//! Per-module resolve-and-install loop
//!
//! Each imported module is classified, mapped to a package, installed, and
//! on failure handed to the AI fallback. Every module ends either resolved
//! (skipped because present, or installed) or unresolved with exactly one
//! warning line; one module's failure never stops the others. The only
//! error that escapes [`Orchestrator::run`] is an unusable package manager.

use crate::classify::{Classifier, ModuleKind, ProbeError};
use crate::fallback::{AiFallbackResolver, FallbackContext, FallbackSession, Suggestion};
use crate::imports::ImportSet;
use crate::installer::{InstallError, PackageInstaller};
use crate::output::Reporter;
use crate::packages::StaticMap;
use crate::prompt::Confirmer;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that abort the whole run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Package manager unavailable: {0}")]
    ManagerUnavailable(String),
}

/// How one install or validation step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Installed,
    RejectedByIndex,
    InstallFailed(String),
}

/// One candidate package tried for a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionAttempt {
    pub module: String,
    pub package: String,
    pub outcome: AttemptOutcome,
}

/// Terminal state of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOutcome {
    /// Nothing to do: stdlib or already importable
    Skipped(ModuleKind),
    /// `package` was installed for the module
    Done { package: String },
    /// Every path failed; the run continues
    Unresolved { reason: String },
}

/// Everything that happened while resolving one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReport {
    pub module: String,
    pub outcome: ModuleOutcome,
    pub attempts: Vec<ResolutionAttempt>,
    pub ai_queries: usize,
}

/// Aggregate over a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub stdlib: usize,
    pub already_installed: usize,
    /// (module, package) pairs installed during this run
    pub installed: Vec<(String, String)>,
    pub unresolved: Vec<String>,
    pub reports: Vec<ModuleReport>,
}

impl RunSummary {
    fn record(&mut self, report: ModuleReport) {
        match &report.outcome {
            ModuleOutcome::Skipped(ModuleKind::StdLib) => self.stdlib += 1,
            ModuleOutcome::Skipped(_) => self.already_installed += 1,
            ModuleOutcome::Done { package } => {
                self.installed.push((report.module.clone(), package.clone()))
            }
            ModuleOutcome::Unresolved { .. } => self.unresolved.push(report.module.clone()),
        }
        self.reports.push(report);
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Wires classification, mapping, installation and the AI fallback together
pub struct Orchestrator {
    classifier: Classifier,
    static_map: StaticMap,
    installer: Arc<dyn PackageInstaller>,
    fallback: Option<AiFallbackResolver>,
    confirmer: Box<dyn Confirmer>,
    reporter: Reporter,
}

impl Orchestrator {
    pub fn new(
        classifier: Classifier,
        static_map: StaticMap,
        installer: Arc<dyn PackageInstaller>,
        confirmer: Box<dyn Confirmer>,
        reporter: Reporter,
    ) -> Self {
        Self {
            classifier,
            static_map,
            installer,
            fallback: None,
            confirmer,
            reporter,
        }
    }

    /// Enable the AI fallback
    pub fn with_fallback(mut self, fallback: AiFallbackResolver) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Resolve every module in order and print the summary
    pub async fn run(&self, imports: &ImportSet) -> Result<RunSummary, RunError> {
        self.reporter.found_imports(imports);

        let mut summary = RunSummary::default();
        for module in imports {
            let report = self.resolve_module(module).await?;
            debug!("{} -> {:?}", module, report.outcome);
            summary.record(report);
        }

        self.reporter.summary(&summary);
        Ok(summary)
    }

    /// Drive a single module to a terminal outcome
    pub async fn resolve_module(&self, module: &str) -> Result<ModuleReport, RunError> {
        let mut report = ModuleReport {
            module: module.to_string(),
            outcome: ModuleOutcome::Unresolved {
                reason: String::new(),
            },
            attempts: Vec::new(),
            ai_queries: 0,
        };

        let kind = match self.classifier.classify(module).await {
            Ok(kind) => kind,
            Err(ProbeError::InterpreterUnavailable(exe)) => {
                return Err(RunError::ManagerUnavailable(format!(
                    "Python interpreter '{}' not found",
                    exe
                )))
            }
            Err(e) => {
                return Ok(self.unresolved(report, format!("could not probe the interpreter: {}", e)))
            }
        };

        match kind {
            ModuleKind::StdLib => {
                self.reporter.stdlib(module);
                report.outcome = ModuleOutcome::Skipped(kind);
                return Ok(report);
            }
            ModuleKind::Installed => {
                self.reporter.already_installed(module);
                report.outcome = ModuleOutcome::Skipped(kind);
                return Ok(report);
            }
            ModuleKind::Missing => {}
        }

        let package = self.static_map.resolve(module);
        self.reporter.installing(&package, module);
        if self.try_install(&package, module, &mut report.attempts).await? {
            report.outcome = ModuleOutcome::Done { package };
            return Ok(report);
        }

        let Some(fallback) = &self.fallback else {
            return Ok(self.unresolved(
                report,
                format!("installing '{}' failed and the AI fallback is disabled", package),
            ));
        };

        let mut session = fallback.session(module);
        let outcome = self
            .ai_fallback(&mut session, module, &package, &mut report.attempts)
            .await;
        report.ai_queries = session.queries_issued();

        match outcome? {
            ModuleOutcome::Unresolved { reason } => Ok(self.unresolved(report, reason)),
            outcome => {
                report.outcome = outcome;
                Ok(report)
            }
        }
    }

    /// The AI half of the loop, entered after the direct install failed.
    ///
    /// A new name from the service needs the user's consent; a replacement
    /// for a package that exists but fails to install does not.
    async fn ai_fallback(
        &self,
        session: &mut FallbackSession<'_>,
        module: &str,
        direct_package: &str,
        attempts: &mut Vec<ResolutionAttempt>,
    ) -> Result<ModuleOutcome, RunError> {
        let suggestion = split_install_error(
            session
                .suggest(FallbackContext::Initial, attempts, &self.reporter)
                .await,
        )?;

        let candidate = match suggestion {
            Ok(Suggestion::Valid(candidate)) => candidate,
            Ok(other) => return Ok(unresolved_from(other)),
            Err(reason) => return Ok(ModuleOutcome::Unresolved { reason }),
        };

        let failing = if candidate == direct_package {
            // the index knows it, the install already failed
            candidate
        } else {
            let prompt = format!("Install '{}' instead of '{}'?", candidate, module);
            if !self.confirmer.confirm(&prompt) {
                info!("User declined '{}' for '{}'", candidate, module);
                return Ok(ModuleOutcome::Unresolved {
                    reason: format!("declined the AI suggestion '{}'", candidate),
                });
            }
            self.reporter.installing(&candidate, module);
            if self.try_install(&candidate, module, attempts).await? {
                return Ok(ModuleOutcome::Done { package: candidate });
            }
            candidate
        };

        self.reporter.exists_but_fails(&failing);
        let replacement = split_install_error(
            session
                .suggest(
                    FallbackContext::ExistsButFails(failing.clone()),
                    attempts,
                    &self.reporter,
                )
                .await,
        )?;

        let replacement = match replacement {
            Ok(Suggestion::Valid(replacement)) => replacement,
            Ok(other) => return Ok(unresolved_from(other)),
            Err(reason) => return Ok(ModuleOutcome::Unresolved { reason }),
        };

        let already_failed = attempts.iter().any(|a| {
            a.package == replacement && matches!(a.outcome, AttemptOutcome::InstallFailed(_))
        });
        if already_failed {
            return Ok(ModuleOutcome::Unresolved {
                reason: format!(
                    "the AI replacement '{}' already failed to install",
                    replacement
                ),
            });
        }

        self.reporter.installing(&replacement, module);
        if self.try_install(&replacement, module, attempts).await? {
            Ok(ModuleOutcome::Done {
                package: replacement,
            })
        } else {
            Ok(ModuleOutcome::Unresolved {
                reason: format!("the AI replacement '{}' failed to install", replacement),
            })
        }
    }

    /// Install and record the attempt. `Ok(false)` is a recoverable failure.
    async fn try_install(
        &self,
        package: &str,
        module: &str,
        attempts: &mut Vec<ResolutionAttempt>,
    ) -> Result<bool, RunError> {
        let result = self.installer.install(package, module).await;
        let outcome = match result {
            Ok(()) => {
                self.reporter.installed(package);
                AttemptOutcome::Installed
            }
            Err(InstallError::ManagerUnavailable(msg)) => {
                return Err(RunError::ManagerUnavailable(msg))
            }
            Err(InstallError::Rejected { reason, .. }) => {
                self.reporter.install_failed(package, module, &reason);
                AttemptOutcome::InstallFailed(reason)
            }
            Err(e) => {
                let reason = e.to_string();
                self.reporter.install_failed(package, module, &reason);
                AttemptOutcome::InstallFailed(reason)
            }
        };

        let installed = outcome == AttemptOutcome::Installed;
        attempts.push(ResolutionAttempt {
            module: module.to_string(),
            package: package.to_string(),
            outcome,
        });
        Ok(installed)
    }

    fn unresolved(&self, mut report: ModuleReport, reason: String) -> ModuleReport {
        self.reporter.unresolved(&report.module, &reason);
        report.outcome = ModuleOutcome::Unresolved { reason };
        report
    }
}

/// A dead package manager during a dry-run check is fatal; any other
/// installer error only sinks the current module.
fn split_install_error(
    result: Result<Suggestion, InstallError>,
) -> Result<Result<Suggestion, String>, RunError> {
    match result {
        Ok(suggestion) => Ok(Ok(suggestion)),
        Err(InstallError::ManagerUnavailable(msg)) => Err(RunError::ManagerUnavailable(msg)),
        Err(e) => Ok(Err(format!("package index check failed: {}", e))),
    }
}

fn unresolved_from(suggestion: Suggestion) -> ModuleOutcome {
    let reason = match suggestion {
        Suggestion::Valid(package) => format!("unexpected valid suggestion '{}'", package),
        Suggestion::Rejected(package) => {
            format!("the AI suggestion '{}' is not a real PyPI package", package)
        }
        Suggestion::Unusable => "no valid package name found in the AI suggestion".to_string(),
        Suggestion::BudgetExhausted => "AI query limit reached".to_string(),
    };
    ModuleOutcome::Unresolved { reason }
}
