//! autopip - install what a Python script imports
//!
//! # Usage
//!
//! ```bash
//! # Install the missing packages for a script
//! autopip my_script.py
//!
//! # Non-interactive: accept AI suggestions without prompting
//! autopip --yes my_script.py
//!
//! # Only the static map, no completion service
//! autopip --no-ai my_script.py
//! ```

use anyhow::Context;
use autopip::classify::ProbeError;
use autopip::fallback::AiFallbackResolver;
use autopip::llm::{LlmError, LlmProviderConfig, OpenAiCompatibleProvider};
use autopip::{
    extract_imports, AutopipConfig, Classifier, Confirmer, DialoguerConfirmer, FixedAnswer,
    Orchestrator, PipInstaller, PythonInterpreter, Reporter, RunError, SecretStore, StaticMap,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "autopip")]
#[command(version)]
#[command(about = "Install the PyPI packages a Python script needs", long_about = None)]
struct Cli {
    /// Python script whose imports should be resolved
    script: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Python interpreter to probe and install with
    #[arg(long, value_name = "EXE", env = "AUTOPIP_PYTHON")]
    python: Option<String>,

    /// Accept AI-suggested substitutes without asking
    #[arg(short = 'y', long)]
    yes: bool,

    /// Disable the AI fallback
    #[arg(long)]
    no_ai: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_directive = if cli.verbose { "autopip=debug" } else { "autopip=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let Some(script) = cli.script.clone() else {
        println!("Usage: autopip <your_script.py>");
        return ExitCode::from(1);
    };

    let reporter = Reporter::stdout();
    match run(&cli, &script, reporter).await {
        Ok(code) => code,
        Err(e) => {
            Reporter::stdout().error(&format!("{:#}", e));
            ExitCode::from(1)
        }
    }
}

async fn run(cli: &Cli, script: &Path, reporter: Reporter) -> anyhow::Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => AutopipConfig::load(path)?,
        None => {
            let (config, used) = AutopipConfig::discover(&AutopipConfig::default_paths())?;
            if let Some(path) = used {
                info!("Using configuration: {}", path.display());
            }
            config
        }
    };
    if let Some(python) = &cli.python {
        config.python.executable = python.clone();
    }
    if cli.no_ai {
        config.ai.enabled = false;
    }
    debug!("Effective configuration: {:?}", config);

    let imports = extract_imports(script)
        .with_context(|| format!("Cannot determine the imports of {}", script.display()))?;

    let script_dir = script
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let interpreter =
        Arc::new(PythonInterpreter::new(&config.python.executable).with_work_dir(script_dir));

    let installer = Arc::new(
        PipInstaller::new(&config.python.executable)
            .with_extra_args(config.python.extra_pip_args.clone()),
    );
    let fallback = build_fallback(&config, installer.clone(), &reporter)?;

    let classifier = match Classifier::new(interpreter).await {
        Ok(classifier) => classifier,
        Err(ProbeError::InterpreterUnavailable(exe)) => {
            print_pip_guidance(&reporter, &format!("Python interpreter '{}' not found", exe));
            return Ok(ExitCode::from(1));
        }
        Err(e) => return Err(e).context("Failed to query the Python interpreter"),
    };

    let confirmer: Box<dyn Confirmer> = if cli.yes {
        Box::new(FixedAnswer(true))
    } else {
        Box::new(DialoguerConfirmer::new())
    };

    let mut orchestrator = Orchestrator::new(
        classifier,
        StaticMap::with_overrides(config.packages.clone()),
        installer,
        confirmer,
        reporter,
    );
    if let Some(fallback) = fallback {
        orchestrator = orchestrator.with_fallback(fallback);
    }

    match orchestrator.run(&imports).await {
        Ok(summary) => {
            info!(
                "Run finished: {} installed, {} unresolved",
                summary.installed.len(),
                summary.unresolved.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(RunError::ManagerUnavailable(msg)) => {
            print_pip_guidance(orchestrator.reporter(), &msg);
            Ok(ExitCode::from(1))
        }
    }
}

/// `None` when AI is disabled or no usable credential is available
fn build_fallback(
    config: &AutopipConfig,
    installer: Arc<PipInstaller>,
    reporter: &Reporter,
) -> anyhow::Result<Option<AiFallbackResolver>> {
    if !config.ai.enabled {
        debug!("AI fallback disabled by configuration");
        return Ok(None);
    }

    let secrets_path = SecretStore::default_path(Path::new("."));
    let secrets = match SecretStore::load(&secrets_path) {
        Ok(secrets) => secrets,
        Err(e) => {
            warn!("{}", e);
            reporter.warning(&format!(
                "Cannot use {}; AI fallback disabled",
                secrets_path.display()
            ));
            return Ok(None);
        }
    };

    let provider_config = LlmProviderConfig {
        base_url: config.ai.base_url.clone(),
        model: config.ai.model.clone(),
        api_key: secrets.get(&config.ai.api_key_env),
        max_tokens: config.ai.max_tokens,
        temperature: config.ai.temperature,
        timeout_seconds: Some(config.ai.timeout_seconds),
    };

    match OpenAiCompatibleProvider::new(provider_config) {
        Ok(provider) => Ok(Some(AiFallbackResolver::new(Arc::new(provider), installer))),
        Err(LlmError::MissingApiKey) => {
            reporter.warning(&format!(
                "{} is not set; AI fallback disabled",
                config.ai.api_key_env
            ));
            Ok(None)
        }
        Err(e) => Err(e).context("Failed to set up the completion client"),
    }
}

fn print_pip_guidance(reporter: &Reporter, message: &str) {
    reporter.error(message);
    reporter.error("pip is not usable in this environment. Run:");
    reporter.error("   python -m ensurepip --upgrade");
    reporter.error("   python -m pip install --upgrade pip");
}
