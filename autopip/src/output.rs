//! Human-readable status lines on standard output

use crate::imports::ImportSet;
use crate::orchestrator::RunSummary;
use colored::Colorize;
use std::io::Write;
use std::sync::Mutex;

/// Writes one status line per event
pub struct Reporter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Reporter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Discards everything
    pub fn sink() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    fn line(&self, text: String) {
        if let Ok(mut out) = self.out.lock() {
            // a closed stdout must not abort the run
            let _ = writeln!(out, "{}", text);
            let _ = out.flush();
        }
    }

    pub fn found_imports(&self, imports: &ImportSet) {
        let names: Vec<&str> = imports.iter().map(String::as_str).collect();
        self.line(format!(
            "{} Found imports: {}",
            "🔍".cyan(),
            if names.is_empty() {
                "(none)".to_string()
            } else {
                names.join(", ")
            }
        ));
    }

    pub fn stdlib(&self, module: &str) {
        self.line(format!("{} {} is part of the Python stdlib", "✓".green(), module));
    }

    pub fn already_installed(&self, module: &str) {
        self.line(format!("{} {} already installed", "✓".green(), module));
    }

    pub fn installing(&self, package: &str, module: &str) {
        self.line(format!(
            "{} Installing {} for module '{}'...",
            "📦".cyan(),
            package.bold(),
            module
        ));
    }

    pub fn installed(&self, package: &str) {
        self.line(format!("{} Installed {}", "✓".green(), package.bold()));
    }

    pub fn install_failed(&self, package: &str, module: &str, reason: &str) {
        self.line(format!(
            "{} Failed to install {} for module '{}': {}",
            "✗".red(),
            package,
            module,
            reason
        ));
    }

    pub fn ai_suggestion(&self, reply: &str) {
        self.line(format!("{} AI suggests: {}", "🤖".cyan(), reply.trim()));
    }

    pub fn ai_request_failed(&self, module: &str, error: &str) {
        self.line(format!(
            "{} AI request for '{}' failed: {}",
            "⚠".yellow(),
            module,
            error
        ));
    }

    pub fn invalid_suggestion(&self, package: &str) {
        self.line(format!(
            "{} '{}' is not a real PyPI package. Asking AI again...",
            "⚠".yellow(),
            package
        ));
    }

    pub fn unreadable_suggestion(&self, module: &str) {
        self.line(format!(
            "{} AI reply for '{}' contained no 'pip install <package>'. Asking AI again...",
            "⚠".yellow(),
            module
        ));
    }

    pub fn exists_but_fails(&self, package: &str) {
        self.line(format!(
            "{} '{}' exists but failed to install. Asking AI for a replacement...",
            "⚠".yellow(),
            package
        ));
    }

    /// The single terminating line for a module that could not be resolved
    pub fn unresolved(&self, module: &str, reason: &str) {
        self.line(format!(
            "{} Skipping '{}': {}",
            "⚠".yellow(),
            module,
            reason
        ));
    }

    pub fn warning(&self, message: &str) {
        self.line(format!("{} {}", "⚠".yellow(), message));
    }

    pub fn error(&self, message: &str) {
        self.line(format!("{} {}", "✗".red(), message));
    }

    pub fn summary(&self, summary: &RunSummary) {
        self.line(String::new());
        self.line(format!(
            "{} {} stdlib, {} already installed, {} installed, {} unresolved",
            "Summary:".bold().underline(),
            summary.stdlib,
            summary.already_installed,
            summary.installed.len(),
            summary.unresolved.len()
        ));
        for (module, package) in &summary.installed {
            self.line(format!("  {} {} -> {}", "•".cyan(), module, package));
        }
        for module in &summary.unresolved {
            self.line(format!("  {} {} (unresolved)", "•".yellow(), module));
        }
    }
}
