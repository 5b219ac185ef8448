//! autopip
//!
//! Reads a Python script, works out which of its imports are neither in the
//! standard library nor installed, and installs the matching PyPI packages.
//! Names that do not install directly are resolved with help from an
//! OpenAI-compatible completion service, validated with a pip dry-run first.

pub mod classify;
pub mod config;
pub mod fallback;
pub mod imports;
pub mod installer;
pub mod llm;
pub mod orchestrator;
pub mod output;
pub mod packages;
pub mod prompt;
pub mod secrets;

pub use classify::{Classifier, Interpreter, ModuleKind, PythonInterpreter};
pub use config::AutopipConfig;
pub use fallback::{AiFallbackResolver, MAX_AI_QUERIES};
pub use imports::{extract_imports, ImportSet};
pub use installer::{InstallError, PackageInstaller, PipInstaller};
pub use llm::{LlmProvider, OpenAiCompatibleProvider};
pub use orchestrator::{ModuleOutcome, ModuleReport, Orchestrator, RunError, RunSummary};
pub use output::Reporter;
pub use packages::StaticMap;
pub use prompt::{Confirmer, DialoguerConfirmer, FixedAnswer};
pub use secrets::SecretStore;
