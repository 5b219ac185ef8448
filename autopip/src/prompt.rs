//! Yes/no confirmation before installing a substitute package

use dialoguer::{theme::ColorfulTheme, Confirm};
use tracing::warn;

/// Answers a yes/no question
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Interactive terminal prompt. Only an explicit "y" installs: a bare Enter,
/// a closed stdin or a non-interactive stdin all count as "no".
#[derive(Debug, Default)]
pub struct DialoguerConfirmer {
    default_answer: bool,
}

impl DialoguerConfirmer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer taken on a bare Enter
    pub fn default_answer(&self) -> bool {
        self.default_answer
    }

    fn build<'a>(&self, theme: &'a ColorfulTheme, prompt: &str) -> Confirm<'a> {
        Confirm::with_theme(theme)
            .with_prompt(prompt)
            .default(self.default_answer)
            .show_default(true)
    }
}

impl Confirmer for DialoguerConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        let theme = ColorfulTheme::default();
        self.build(&theme, prompt).interact().unwrap_or_else(|e| {
            warn!("Confirmation prompt failed: {}", e);
            false
        })
    }
}

/// Always gives the same answer (`--yes`, tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirmer for FixedAnswer {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_answer() {
        assert!(FixedAnswer(true).confirm("Install?"));
        assert!(!FixedAnswer(false).confirm("Install?"));
    }

    #[test]
    fn test_bare_enter_declines() {
        assert!(!DialoguerConfirmer::new().default_answer());
        assert!(!DialoguerConfirmer::default().default_answer());
    }
}
