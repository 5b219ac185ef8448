//! AI-assisted package name resolution
//!
//! When the direct install of a module's package fails, the completion
//! service is asked for the exact PyPI name. Every candidate is checked with
//! a pip dry-run before anyone tries to install it, and a module never costs
//! more than [`MAX_AI_QUERIES`] requests.

use crate::installer::{InstallError, PackageInstaller};
use crate::llm::{ChatMessage, LlmProvider};
use crate::orchestrator::{AttemptOutcome, ResolutionAttempt};
use crate::output::Reporter;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Hard cap on completion requests per module
pub const MAX_AI_QUERIES: usize = 3;

const SYSTEM_INSTRUCTION: &str = "You are a Python packaging assistant. \
When asked for a package, respond ONLY with a valid 'pip install <package>' command \
using the exact PyPI package name. Do not invent names like 'python-<pkg>'.";

lazy_static! {
    static ref PIP_INSTALL_RE: Regex =
        Regex::new(r"pip\s+install\s+([A-Za-z0-9][A-Za-z0-9._\-]*)").unwrap();
}

/// What already went wrong, phrased for the completion service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackContext {
    /// The direct install failed
    Initial,
    /// The previous answer was not a real package
    PreviousInvalid,
    /// The named package exists but does not install
    ExistsButFails(String),
}

impl FallbackContext {
    pub fn instruction(&self) -> String {
        match self {
            FallbackContext::Initial => "Suggest a valid PyPI package replacement.".to_string(),
            FallbackContext::PreviousInvalid => {
                "Your last answer was invalid. Give only a valid PyPI package name.".to_string()
            }
            FallbackContext::ExistsButFails(package) => format!(
                "The package '{}' exists but fails to install. Suggest the modern supported replacement.",
                package
            ),
        }
    }
}

/// Build the two-message conversation for one query
pub fn build_messages(module: &str, context: &FallbackContext) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_INSTRUCTION),
        ChatMessage::user(format!(
            "The Python module '{}' failed. {}\nWhich exact PyPI package should be installed? Reply only with: pip install <package>",
            module,
            context.instruction()
        )),
    ]
}

/// Pull the package name out of a `pip install <name>` reply.
///
/// Only the first `pip install` occurrence counts; trailing sentence
/// punctuation is dropped. Anything else is `None`.
pub fn extract_package_from_reply(reply: &str) -> Option<String> {
    let caps = PIP_INSTALL_RE.captures(reply)?;
    let name = caps
        .get(1)?
        .as_str()
        .trim_end_matches(|c| c == '.' || c == '-' || c == '_');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Result of asking for (and validating) a package name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    /// Exists in the index according to the dry-run check
    Valid(String),
    /// The last candidate was rejected by the dry-run check
    Rejected(String),
    /// No candidate could be extracted, or the service failed
    Unusable,
    /// The per-module query budget is spent
    BudgetExhausted,
}

enum Reply {
    Candidate(String),
    NoMatch,
    Failed,
    Exhausted,
}

enum Checked {
    Valid(String),
    Rejected(String),
    NoMatch,
    Failed,
    Exhausted,
}

impl From<Checked> for Suggestion {
    fn from(checked: Checked) -> Self {
        match checked {
            Checked::Valid(package) => Suggestion::Valid(package),
            Checked::Rejected(package) => Suggestion::Rejected(package),
            Checked::NoMatch | Checked::Failed => Suggestion::Unusable,
            Checked::Exhausted => Suggestion::BudgetExhausted,
        }
    }
}

/// Shared handles for AI-assisted resolution
pub struct AiFallbackResolver {
    provider: Arc<dyn LlmProvider>,
    installer: Arc<dyn PackageInstaller>,
}

impl AiFallbackResolver {
    pub fn new(provider: Arc<dyn LlmProvider>, installer: Arc<dyn PackageInstaller>) -> Self {
        Self {
            provider,
            installer,
        }
    }

    /// Start resolving one module with a fresh query budget
    pub fn session(&self, module: &str) -> FallbackSession<'_> {
        FallbackSession {
            resolver: self,
            module: module.to_string(),
            queries: 0,
        }
    }
}

/// Query state for a single module
pub struct FallbackSession<'a> {
    resolver: &'a AiFallbackResolver,
    module: String,
    queries: usize,
}

impl FallbackSession<'_> {
    pub fn queries_issued(&self) -> usize {
        self.queries
    }

    /// Ask for a package under `context` and validate it with a dry-run.
    ///
    /// For [`FallbackContext::Initial`] an invalid or unreadable answer gets
    /// one follow-up query with [`FallbackContext::PreviousInvalid`]; a failed
    /// request does not. Index rejections are appended to `attempts`.
    pub async fn suggest(
        &mut self,
        context: FallbackContext,
        attempts: &mut Vec<ResolutionAttempt>,
        reporter: &Reporter,
    ) -> Result<Suggestion, InstallError> {
        let checked = self.check(&context, attempts, reporter).await?;

        if context == FallbackContext::Initial {
            let retry = match &checked {
                Checked::Rejected(package) => {
                    reporter.invalid_suggestion(package);
                    true
                }
                Checked::NoMatch => {
                    reporter.unreadable_suggestion(&self.module);
                    true
                }
                _ => false,
            };
            if retry {
                let second = self
                    .check(&FallbackContext::PreviousInvalid, attempts, reporter)
                    .await?;
                return Ok(second.into());
            }
        }

        Ok(checked.into())
    }

    async fn check(
        &mut self,
        context: &FallbackContext,
        attempts: &mut Vec<ResolutionAttempt>,
        reporter: &Reporter,
    ) -> Result<Checked, InstallError> {
        let package = match self.ask(context, reporter).await {
            Reply::Candidate(package) => package,
            Reply::NoMatch => return Ok(Checked::NoMatch),
            Reply::Failed => return Ok(Checked::Failed),
            Reply::Exhausted => return Ok(Checked::Exhausted),
        };

        if self.resolver.installer.exists(&package).await? {
            Ok(Checked::Valid(package))
        } else {
            attempts.push(ResolutionAttempt {
                module: self.module.clone(),
                package: package.clone(),
                outcome: AttemptOutcome::RejectedByIndex,
            });
            Ok(Checked::Rejected(package))
        }
    }

    async fn ask(&mut self, context: &FallbackContext, reporter: &Reporter) -> Reply {
        if self.queries >= MAX_AI_QUERIES {
            debug!("AI query budget spent for '{}'", self.module);
            return Reply::Exhausted;
        }
        self.queries += 1;

        let messages = build_messages(&self.module, context);
        match self.resolver.provider.complete(messages).await {
            Ok(reply) => {
                debug!(
                    "AI reply #{} for '{}' from {}: {}",
                    self.queries,
                    self.module,
                    self.resolver.provider.model(),
                    reply
                );
                reporter.ai_suggestion(&reply);
                match extract_package_from_reply(&reply) {
                    Some(package) => Reply::Candidate(package),
                    None => Reply::NoMatch,
                }
            }
            Err(e) => {
                warn!("AI request for '{}' failed: {}", self.module, e);
                reporter.ai_request_failed(&self.module, &e.to_string());
                Reply::Failed
            }
        }
    }
}
