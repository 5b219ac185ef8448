//! Module classification against the running Python interpreter
//!
//! A module is `StdLib` when the interpreter ships it, `Installed` when
//! `importlib.util.find_spec` can locate it, and `Missing` otherwise.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Classification of a single imported module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    StdLib,
    Installed,
    Missing,
}

/// Error type for interpreter probes
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Python interpreter '{0}' not found")]
    InterpreterUnavailable(String),

    #[error("Failed to run {executable}: {source}")]
    Io {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected interpreter output: {0}")]
    BadOutput(String),
}

/// Query surface of a Python interpreter
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Names of the standard-library modules for this interpreter version
    async fn stdlib_modules(&self) -> Result<HashSet<String>, ProbeError>;

    /// Whether `import <module>` would currently succeed
    async fn is_importable(&self, module: &str) -> Result<bool, ProbeError>;
}

const STDLIB_PROBE: &str = r#"import sys
print("%d.%d" % sys.version_info[:2])
print(1 if hasattr(sys, "stdlib_module_names") else 0)
for name in sorted(set(getattr(sys, "stdlib_module_names", ())) | set(sys.builtin_module_names)):
    print(name)
"#;

const IMPORTABLE_PROBE: &str = r#"import importlib.util, sys
try:
    found = importlib.util.find_spec(sys.argv[1]) is not None
except Exception:
    found = False
sys.exit(0 if found else 1)
"#;

/// Interpreter backed by a real `python` executable
#[derive(Debug, Clone)]
pub struct PythonInterpreter {
    executable: String,
    /// Directory the probes run from, so modules next to the script resolve
    work_dir: Option<PathBuf>,
}

impl PythonInterpreter {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            work_dir: None,
        }
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.executable);
        if let Some(dir) = &self.work_dir {
            cmd.current_dir(dir);
        }
        cmd.env("PYTHONDONTWRITEBYTECODE", "1");
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> ProbeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProbeError::InterpreterUnavailable(self.executable.clone())
        } else {
            ProbeError::Io {
                executable: self.executable.clone(),
                source: e,
            }
        }
    }
}

#[async_trait]
impl Interpreter for PythonInterpreter {
    async fn stdlib_modules(&self) -> Result<HashSet<String>, ProbeError> {
        let output = self
            .command()
            .arg("-c")
            .arg(STDLIB_PROBE)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(ProbeError::BadOutput(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_stdlib_probe(&stdout)
    }

    async fn is_importable(&self, module: &str) -> Result<bool, ProbeError> {
        let status = self
            .command()
            .arg("-c")
            .arg(IMPORTABLE_PROBE)
            .arg(module)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;

        Ok(status.success())
    }
}

/// Parse the output of `STDLIB_PROBE`: version line, flag line, then one name per line.
fn parse_stdlib_probe(stdout: &str) -> Result<HashSet<String>, ProbeError> {
    let mut lines = stdout.lines();
    let version = lines
        .next()
        .ok_or_else(|| ProbeError::BadOutput("empty stdlib probe output".to_string()))?;
    let has_names = match lines.next() {
        Some("1") => true,
        Some("0") => false,
        other => {
            return Err(ProbeError::BadOutput(format!(
                "unexpected stdlib flag line: {:?}",
                other
            )))
        }
    };

    let mut modules: HashSet<String> = lines
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    if !has_names {
        debug!(
            "Python {} has no sys.stdlib_module_names, using bundled list",
            version
        );
        modules.extend(FALLBACK_STDLIB_MODULES.iter().map(|m| m.to_string()));
    }

    Ok(modules)
}

/// Classifies modules using a stdlib snapshot taken once per run
pub struct Classifier {
    stdlib: HashSet<String>,
    interpreter: Arc<dyn Interpreter>,
}

impl Classifier {
    /// Take the stdlib snapshot from the interpreter
    pub async fn new(interpreter: Arc<dyn Interpreter>) -> Result<Self, ProbeError> {
        let stdlib = interpreter.stdlib_modules().await?;
        debug!("Loaded {} stdlib module names", stdlib.len());
        Ok(Self {
            stdlib,
            interpreter,
        })
    }

    pub fn is_stdlib(&self, module: &str) -> bool {
        self.stdlib.contains(module)
    }

    pub async fn classify(&self, module: &str) -> Result<ModuleKind, ProbeError> {
        if self.is_stdlib(module) {
            return Ok(ModuleKind::StdLib);
        }
        if self.interpreter.is_importable(module).await? {
            Ok(ModuleKind::Installed)
        } else {
            Ok(ModuleKind::Missing)
        }
    }
}

/// Top-level standard-library modules of CPython 3.9, for interpreters
/// that predate `sys.stdlib_module_names`.
pub const FALLBACK_STDLIB_MODULES: &[&str] = &[
    "__future__", "_thread", "abc", "aifc", "argparse", "array", "ast", "asynchat",
    "asyncio", "asyncore", "atexit", "audioop", "base64", "bdb", "binascii", "binhex",
    "bisect", "builtins", "bz2", "cProfile", "calendar", "cgi", "cgitb", "chunk", "cmath",
    "cmd", "code", "codecs", "codeop", "collections", "colorsys", "compileall",
    "concurrent", "configparser", "contextlib", "contextvars", "copy", "copyreg", "crypt",
    "csv", "ctypes", "curses", "dataclasses", "datetime", "dbm", "decimal", "difflib",
    "dis", "distutils", "doctest", "email", "encodings", "ensurepip", "enum", "errno",
    "faulthandler", "fcntl", "filecmp", "fileinput", "fnmatch", "formatter", "fractions",
    "ftplib", "functools", "gc", "getopt", "getpass", "gettext", "glob", "graphlib", "grp",
    "gzip", "hashlib", "heapq", "hmac", "html", "http", "imaplib", "imghdr", "imp",
    "importlib", "inspect", "io", "ipaddress", "itertools", "json", "keyword", "lib2to3",
    "linecache", "locale", "logging", "lzma", "mailbox", "mailcap", "marshal", "math",
    "mimetypes", "mmap", "modulefinder", "msilib", "msvcrt", "multiprocessing", "netrc",
    "nis", "nntplib", "numbers", "operator", "optparse", "os", "ossaudiodev", "parser",
    "pathlib", "pdb", "pickle", "pickletools", "pipes", "pkgutil", "platform", "plistlib",
    "poplib", "posix", "pprint", "profile", "pstats", "pty", "pwd", "py_compile",
    "pyclbr", "pydoc", "queue", "quopri", "random", "re", "readline", "reprlib",
    "resource", "rlcompleter", "runpy", "sched", "secrets", "select", "selectors",
    "shelve", "shlex", "shutil", "signal", "site", "smtpd", "smtplib", "sndhdr", "socket",
    "socketserver", "spwd", "sqlite3", "ssl", "stat", "statistics", "string",
    "stringprep", "struct", "subprocess", "sunau", "symbol", "symtable", "sys",
    "sysconfig", "syslog", "tabnanny", "tarfile", "telnetlib", "tempfile", "termios",
    "textwrap", "threading", "time", "timeit", "tkinter", "token", "tokenize", "trace",
    "traceback", "tracemalloc", "tty", "turtle", "turtledemo", "types", "typing",
    "unicodedata", "unittest", "urllib", "uu", "uuid", "venv", "warnings", "wave",
    "weakref", "webbrowser", "winreg", "winsound", "wsgiref", "xdrlib", "xml", "xmlrpc",
    "zipapp", "zipfile", "zipimport", "zlib", "zoneinfo",
];

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeInterpreter {
        importable: Vec<&'static str>,
    }

    #[async_trait]
    impl Interpreter for FakeInterpreter {
        async fn stdlib_modules(&self) -> Result<HashSet<String>, ProbeError> {
            Ok(["os", "sys", "json"].iter().map(|s| s.to_string()).collect())
        }

        async fn is_importable(&self, module: &str) -> Result<bool, ProbeError> {
            Ok(self.importable.iter().any(|m| *m == module))
        }
    }

    #[test]
    fn test_parse_stdlib_probe_modern() {
        let out = "3.12\n1\nos\nsys\n_thread\n";
        let modules = parse_stdlib_probe(out).unwrap();
        assert_eq!(modules.len(), 3);
        assert!(modules.contains("_thread"));
    }

    #[test]
    fn test_parse_stdlib_probe_legacy_adds_fallback() {
        let out = "3.8\n0\nsys\n";
        let modules = parse_stdlib_probe(out).unwrap();
        assert!(modules.contains("sys"));
        assert!(modules.contains("asyncio"));
        assert!(modules.contains("xml"));
    }

    #[test]
    fn test_parse_stdlib_probe_rejects_garbage() {
        assert!(parse_stdlib_probe("").is_err());
        assert!(parse_stdlib_probe("3.12\nyes\n").is_err());
    }

    #[tokio::test]
    async fn test_classify() {
        let interp = Arc::new(FakeInterpreter {
            importable: vec!["requests"],
        });
        let classifier = Classifier::new(interp).await.unwrap();

        assert_eq!(classifier.classify("os").await.unwrap(), ModuleKind::StdLib);
        assert_eq!(
            classifier.classify("requests").await.unwrap(),
            ModuleKind::Installed
        );
        assert_eq!(classifier.classify("bs4").await.unwrap(), ModuleKind::Missing);
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let interp = PythonInterpreter::new("autopip-no-such-python-binary");
        match interp.is_importable("os").await {
            Err(ProbeError::InterpreterUnavailable(name)) => {
                assert_eq!(name, "autopip-no-such-python-binary")
            }
            other => panic!("Expected InterpreterUnavailable, got {:?}", other),
        }
    }
}
