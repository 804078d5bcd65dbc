mod escape;
mod factory;
mod health;
mod python;
mod quickjs;
mod wrapper;

pub use escape::escape_json;
pub use factory::create_adapter;
pub use health::{check_all, run_probe, HealthProbe};
pub use python::{PythonAdapter, PYTHON_PROBE};
pub use quickjs::{QuickJsAdapter, QUICKJS_PROBE};
pub use wrapper::{prefix_lines, WrappedProgram};

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ScriptletError};
use crate::sandbox::ExecutionResult;

/// Task id used when the caller does not supply one.
pub const UNKNOWN_TASK_ID: &str = "UnknownID";

/// Scripting languages with a sandboxed interpreter image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// CPython compiled to WASI
    #[value(alias = "py")]
    Python,
    /// QuickJS compiled to WASI
    #[value(name = "quickjs", aliases = ["js", "javascript"])]
    #[serde(alias = "js", alias = "javascript")]
    QuickJs,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Python, Language::QuickJs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::QuickJs => "quickjs",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One script to run, with the data it receives.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    script: String,
    args: Vec<String>,
    input_data: Value,
    task_id: String,
}

impl ExecutionRequest {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            args: Vec::new(),
            input_data: Value::Null,
            task_id: UNKNOWN_TASK_ID.to_string(),
        }
    }

    /// Extra arguments. Recorded in failure logs; the interpreters never see them.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_input(mut self, input_data: Value) -> Self {
        self.input_data = input_data;
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn input_data(&self) -> &Value {
        &self.input_data
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

/// The argument vector for one executor call: interpreter image first, the
/// wrapped program last.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    argv: Vec<String>,
}

impl InvocationSpec {
    pub(crate) fn new(image: &Path, args: Vec<String>, program: WrappedProgram) -> Self {
        let mut argv = Vec::with_capacity(args.len() + 2);
        argv.push(image.display().to_string());
        argv.extend(args);
        argv.push(program.into_source());
        Self { argv }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn image(&self) -> &str {
        &self.argv[0]
    }

    /// The generated program text.
    pub fn script(&self) -> &str {
        self.argv.last().map(String::as_str).unwrap_or_default()
    }
}

/// Log a failed invocation. Failures of the sandboxed process are the
/// script's fault and logged as warnings; anything else is an error.
pub(crate) fn log_invocation_failure(
    message: &str,
    invocation: &InvocationSpec,
    request: &ExecutionRequest,
    elapsed: Duration,
    error: &ScriptletError,
) {
    if error.is_sandbox_failure() {
        tracing::warn!(
            task_id = request.task_id(),
            image = invocation.image(),
            elapsed_ms = elapsed.as_millis() as u64,
            script = %invocation.script(),
            args = ?request.args(),
            error = %error,
            "{}", message
        );
    } else {
        tracing::error!(
            task_id = request.task_id(),
            image = invocation.image(),
            elapsed_ms = elapsed.as_millis() as u64,
            args = ?request.args(),
            error = %error,
            "{}", message
        );
    }
}

/// Trait for per-language script adapters.
///
/// An adapter turns a raw script into a self-contained program that keeps
/// printed output on stdout and logging on stderr, then runs it through a
/// [`crate::sandbox::SandboxExecutor`]. Executor failures are returned to the
/// caller unchanged.
#[async_trait]
pub trait LanguageAdapter: Send + Sync {
    fn language(&self) -> Language;

    /// Generate the program for `script` with `input_data` embedded.
    fn wrap(&self, script: &str, input_data: &Value) -> Result<WrappedProgram>;

    /// Run a request to completion.
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult>;

    /// Fixed script and expected streams for [`LanguageAdapter::health_check`].
    fn probe(&self) -> HealthProbe;

    /// Run the probe script. Never fails; problems are logged and reported as
    /// `false`.
    async fn health_check(&self) -> bool {
        run_probe(self, &self.probe()).await
    }
}
