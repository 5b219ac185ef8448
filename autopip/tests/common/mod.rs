//! In-memory stand-ins for the interpreter, pip, the completion service and
//! the terminal prompt.

#![allow(dead_code)]

use async_trait::async_trait;
use autopip::classify::{Interpreter, ProbeError};
use autopip::fallback::AiFallbackResolver;
use autopip::installer::{InstallError, PackageInstaller};
use autopip::llm::{ChatMessage, LlmError, LlmProvider};
use autopip::{Classifier, Confirmer, Orchestrator, Reporter, StaticMap};
use std::collections::{HashSet, VecDeque};
use std::io::Write;
use std::sync::{Arc, Mutex};

pub struct FakeInterpreter {
    pub stdlib: HashSet<String>,
    pub importable: HashSet<String>,
    pub probes: Mutex<Vec<String>>,
}

impl FakeInterpreter {
    pub fn new(stdlib: &[&str], importable: &[&str]) -> Self {
        Self {
            stdlib: stdlib.iter().map(|s| s.to_string()).collect(),
            importable: importable.iter().map(|s| s.to_string()).collect(),
            probes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Interpreter for FakeInterpreter {
    async fn stdlib_modules(&self) -> Result<HashSet<String>, ProbeError> {
        Ok(self.stdlib.clone())
    }

    async fn is_importable(&self, module: &str) -> Result<bool, ProbeError> {
        self.probes.lock().unwrap().push(module.to_string());
        Ok(self.importable.contains(module))
    }
}

/// pip stand-in: `installable` install fine, `index` (a superset) pass the dry-run
#[derive(Default)]
pub struct FakeInstaller {
    pub installable: HashSet<String>,
    pub index: HashSet<String>,
    pub unavailable: bool,
    pub installs: Mutex<Vec<String>>,
    pub dry_runs: Mutex<Vec<String>>,
}

impl FakeInstaller {
    pub fn new(installable: &[&str], index_only: &[&str]) -> Self {
        let installable: HashSet<String> = installable.iter().map(|s| s.to_string()).collect();
        let mut index = installable.clone();
        index.extend(index_only.iter().map(|s| s.to_string()));
        Self {
            installable,
            index,
            ..Default::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub fn installs(&self) -> Vec<String> {
        self.installs.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackageInstaller for FakeInstaller {
    async fn install(&self, package: &str, _module: &str) -> Result<(), InstallError> {
        if self.unavailable {
            return Err(InstallError::ManagerUnavailable(
                "pip is not installed for 'python3'".to_string(),
            ));
        }
        self.installs.lock().unwrap().push(package.to_string());
        if self.installable.contains(package) {
            Ok(())
        } else {
            Err(InstallError::Rejected {
                package: package.to_string(),
                reason: format!("ERROR: No matching distribution found for {}", package),
            })
        }
    }

    async fn exists(&self, package: &str) -> Result<bool, InstallError> {
        if self.unavailable {
            return Err(InstallError::ManagerUnavailable(
                "pip is not installed for 'python3'".to_string(),
            ));
        }
        self.dry_runs.lock().unwrap().push(package.to_string());
        Ok(self.index.contains(package))
    }
}

/// Replays canned replies in order, then answers with prose forever
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(
                vec![Err(LlmError::Status {
                    status: 401,
                    body: "unauthorized".to_string(),
                })]
                .into(),
            ),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn user_message(&self, index: usize) -> String {
        self.requests.lock().unwrap()[index][1].content.clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(messages);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("I cannot help with that.".to_string()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Fixed answer that remembers every question it was asked
pub struct RecordingConfirmer {
    answer: bool,
    pub prompts: Arc<Mutex<Vec<String>>>,
}

impl RecordingConfirmer {
    pub fn new(answer: bool) -> (Self, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                answer,
                prompts: prompts.clone(),
            },
            prompts,
        )
    }
}

impl Confirmer for RecordingConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer
    }
}

/// Cloneable in-memory stdout
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }

    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.text()
            .lines()
            .filter(|l| l.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub struct Harness {
    pub interpreter: Arc<FakeInterpreter>,
    pub installer: Arc<FakeInstaller>,
    pub provider: Option<Arc<ScriptedProvider>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub output: SharedBuffer,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub async fn new(
        interpreter: FakeInterpreter,
        installer: FakeInstaller,
        provider: Option<ScriptedProvider>,
        answer: bool,
    ) -> Self {
        Self::with_map(interpreter, installer, provider, answer, StaticMap::builtin()).await
    }

    pub async fn with_map(
        interpreter: FakeInterpreter,
        installer: FakeInstaller,
        provider: Option<ScriptedProvider>,
        answer: bool,
        static_map: StaticMap,
    ) -> Self {
        colored::control::set_override(false);

        let interpreter = Arc::new(interpreter);
        let installer = Arc::new(installer);
        let provider = provider.map(Arc::new);
        let (confirmer, prompts) = RecordingConfirmer::new(answer);
        let output = SharedBuffer::default();

        let classifier = Classifier::new(interpreter.clone()).await.unwrap();
        let mut orchestrator = Orchestrator::new(
            classifier,
            static_map,
            installer.clone(),
            Box::new(confirmer),
            Reporter::new(Box::new(output.clone())),
        );
        if let Some(provider) = &provider {
            orchestrator = orchestrator
                .with_fallback(AiFallbackResolver::new(provider.clone(), installer.clone()));
        }

        Self {
            interpreter,
            installer,
            provider,
            prompts,
            output,
            orchestrator,
        }
    }

    pub fn ai_requests(&self) -> usize {
        self.provider.as_ref().map_or(0, |p| p.request_count())
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

pub fn import_set(names: &[&str]) -> autopip::ImportSet {
    names.iter().map(|s| s.to_string()).collect()
}
