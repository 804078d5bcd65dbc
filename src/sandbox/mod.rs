mod traits;
mod wasmer;
mod workspace;

pub use traits::SandboxExecutor;
pub use wasmer::{locate_wasmer, WasmerExecutor};
pub use workspace::Workspace;
pub(crate) use workspace::release_logged;

use serde::{Deserialize, Serialize};

/// Captured output of one sandboxed invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{ExecutionResult, SandboxExecutor};
    use crate::error::{Result, ScriptletError};

    type Inspect = Box<dyn Fn(&[String]) + Send + Sync>;

    /// Executor double that records every argument vector it receives.
    pub struct RecordingExecutor {
        outcome: std::result::Result<ExecutionResult, (Option<i32>, String)>,
        inspect: Option<Inspect>,
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingExecutor {
        pub fn succeeding(stdout: &str, stderr: &str) -> Self {
            Self {
                outcome: Ok(ExecutionResult {
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                }),
                inspect: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(exit_code: i32, stderr: &str) -> Self {
            Self {
                outcome: Err((Some(exit_code), stderr.to_string())),
                inspect: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Run `inspect` against the argument vector while the "process" is live.
        pub fn with_inspect(mut self, inspect: impl Fn(&[String]) + Send + Sync + 'static) -> Self {
            self.inspect = Some(Box::new(inspect));
            self
        }

        pub fn last_call(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .last()
                .cloned()
                .expect("executor was never called")
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SandboxExecutor for RecordingExecutor {
        fn name(&self) -> &str {
            "recording"
        }

        async fn run(&self, args: &[String]) -> Result<ExecutionResult> {
            self.calls.lock().unwrap().push(args.to_vec());
            if let Some(inspect) = &self.inspect {
                inspect(args);
            }
            match &self.outcome {
                Ok(result) => Ok(result.clone()),
                Err((exit_code, stderr)) => Err(ScriptletError::SandboxExecution {
                    exit_code: *exit_code,
                    stdout: String::new(),
                    stderr: stderr.clone(),
                }),
            }
        }
    }

    /// Runs the interpreter arguments (everything after `--`) with a program
    /// installed on the host, standing in for the sandboxed image.
    pub struct HostInterpreter {
        program: String,
    }

    impl HostInterpreter {
        /// `check_args` must make `program` exit successfully without doing
        /// anything else (qjs has no `--version`).
        pub fn detect(program: &str, check_args: &[&str]) -> Option<Self> {
            let works = std::process::Command::new(program)
                .args(check_args)
                .output()
                .map(|output| output.status.success())
                .unwrap_or(false);
            works.then(|| Self {
                program: program.to_string(),
            })
        }
    }

    #[async_trait]
    impl SandboxExecutor for HostInterpreter {
        fn name(&self) -> &str {
            "host"
        }

        async fn run(&self, args: &[String]) -> Result<ExecutionResult> {
            let start = args
                .iter()
                .position(|arg| arg == "--")
                .map_or(1, |separator| separator + 1);

            let output = tokio::process::Command::new(&self.program)
                .args(&args[start..])
                .stdin(std::process::Stdio::null())
                .output()
                .await
                .map_err(|source| ScriptletError::SandboxLaunch {
                    binary: self.program.clone(),
                    source,
                })?;

            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if !output.status.success() {
                return Err(ScriptletError::SandboxExecution {
                    exit_code: output.status.code(),
                    stdout,
                    stderr,
                });
            }
            Ok(ExecutionResult { stdout, stderr })
        }
    }
}
