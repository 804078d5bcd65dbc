use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::types::PythonConfig;
use crate::error::Result;
use crate::language::escape::escape_json;
use crate::language::health::HealthProbe;
use crate::language::wrapper::WrappedProgram;
use crate::language::{
    log_invocation_failure, ExecutionRequest, InvocationSpec, Language, LanguageAdapter,
};
use crate::sandbox::{release_logged, ExecutionResult, SandboxExecutor, Workspace};

/// Name the library directory is mapped to inside the sandbox.
const GUEST_LIB_DIR: &str = "lib";

const PREAMBLE_HEAD: &str = "import sys,json\ninputData = json.loads(";

const PREAMBLE_TAIL: &str = r#")
def log(*args, **kwargs):
  print(*args, file=sys.stderr, **kwargs)

def script_fun():
"#;

const EPILOGUE: &str = r#"

result = script_fun()
if result is not None:
  if isinstance(result, str):
    sys.stdout.write(result)
  else:
    sys.stdout.write(json.dumps(result))
"#;

/// Closes a function body that holds no statements.
const EMPTY_BODY: &str = "\n  pass";

/// Exercises `log`, `print` and a string return.
pub const PYTHON_PROBE: HealthProbe = HealthProbe {
    script: r"
      log('log')
      print('print\n',end='')
      return 'result'
      ",
    expected_stdout: "print\nresult",
    expected_stderr: "log\n",
};

/// Runs scripts with python.wasm.
///
/// The script becomes the body of `script_fun()`; `inputData` holds the
/// decoded input, `print` writes to stdout and `log` to stderr. The interpreter
/// imports its standard library from a private copy of the configured library
/// directory, created per execution and removed afterwards.
pub struct PythonAdapter {
    binary: PathBuf,
    lib_dir: PathBuf,
    executor: Arc<dyn SandboxExecutor>,
}

impl PythonAdapter {
    pub fn new(config: &PythonConfig, executor: Arc<dyn SandboxExecutor>) -> Self {
        Self {
            binary: config.binary.clone(),
            lib_dir: config.lib_dir.clone(),
            executor,
        }
    }

    /// Build the wasmer arguments for `program` with `lib_path` mapped to `lib`.
    ///
    /// Interpreter flags: `-B` skips writing .pyc files, `-q` skips the
    /// startup banner, `-c` runs the program text.
    pub fn build_invocation(&self, program: WrappedProgram, lib_path: &Path) -> InvocationSpec {
        let args = vec![
            format!("--mapdir={}:{}", GUEST_LIB_DIR, lib_path.display()),
            "--".to_string(),
            "-B".to_string(),
            "-q".to_string(),
            "-c".to_string(),
        ];
        InvocationSpec::new(&self.binary, args, program)
    }

    async fn invoke(
        &self,
        program: WrappedProgram,
        workspace: &Workspace,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult> {
        let invocation = self.build_invocation(program, workspace.path());
        let started = Instant::now();

        match self.executor.run(invocation.argv()).await {
            Ok(result) => {
                info!(
                    task_id = request.task_id(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    stdout_len = result.stdout.len(),
                    stderr_len = result.stderr.len(),
                    "executePython succeeded"
                );
                debug!(stdout = %result.stdout, stderr = %result.stderr, "Python output");
                Ok(result)
            }
            Err(error) => {
                log_invocation_failure(
                    "executePython failed",
                    &invocation,
                    request,
                    started.elapsed(),
                    &error,
                );
                Err(error)
            }
        }
    }
}

#[async_trait]
impl LanguageAdapter for PythonAdapter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn wrap(&self, script: &str, input_data: &Value) -> Result<WrappedProgram> {
        let literal = escape_json(input_data)?;
        let preamble = format!("{}{}{}", PREAMBLE_HEAD, literal, PREAMBLE_TAIL);
        if has_statements(script) {
            Ok(WrappedProgram::assemble(&preamble, script, EPILOGUE))
        } else {
            let epilogue = format!("{}{}", EMPTY_BODY, EPILOGUE);
            Ok(WrappedProgram::assemble(&preamble, script, &epilogue))
        }
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let program = self.wrap(request.script(), request.input_data())?;

        let workspace = Workspace::provision(&self.lib_dir).await?;
        let outcome = self.invoke(program, &workspace, request).await;
        release_logged(workspace).await;

        outcome
    }

    fn probe(&self) -> HealthProbe {
        PYTHON_PROBE
    }
}

/// False when every line is blank or a comment, which Python rejects as a
/// function body.
fn has_statements(script: &str) -> bool {
    script.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with('#')
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::ScriptletError;
    use crate::sandbox::testing::{HostInterpreter, RecordingExecutor};
    use serde_json::json;
    use tempfile::TempDir;

    fn library_fixture() -> TempDir {
        let lib = tempfile::tempdir().unwrap();
        std::fs::write(lib.path().join("os.py"), "# os\n").unwrap();
        lib
    }

    fn adapter(lib: &Path, executor: Arc<dyn SandboxExecutor>) -> PythonAdapter {
        let config = PythonConfig {
            binary: PathBuf::from("wasm/python/bin/python.wasm"),
            lib_dir: lib.to_path_buf(),
        };
        PythonAdapter::new(&config, executor)
    }

    fn mapped_dir(argv: &[String]) -> PathBuf {
        let mapdir = argv[1].strip_prefix("--mapdir=lib:").unwrap();
        PathBuf::from(mapdir)
    }

    #[test]
    fn test_wrap_layout() {
        let lib = library_fixture();
        let executor = Arc::new(RecordingExecutor::succeeding("", ""));
        let python = adapter(lib.path(), executor);

        let program = python
            .wrap("x = inputData['n']\nreturn x * 2", &json!({"n": 21}))
            .unwrap();
        let lines: Vec<&str> = program.source().split('\n').collect();

        assert_eq!(lines[0], "import sys,json");
        assert_eq!(lines[1], r#"inputData = json.loads("{\"n\":21}")"#);
        assert_eq!(lines[5], "def script_fun():");
        assert_eq!(program.body_line_offset(), 6);
        assert_eq!(lines[6], "  x = inputData['n']");
        assert_eq!(lines[7], "  return x * 2");
        assert_eq!(program.script_line(8), Some(2));
        assert!(program.source().ends_with("sys.stdout.write(json.dumps(result))\n"));
    }

    #[test]
    fn test_empty_body_gets_pass() {
        let lib = library_fixture();
        let python = adapter(lib.path(), Arc::new(RecordingExecutor::succeeding("", "")));

        let empty = python.wrap("", &Value::Null).unwrap();
        assert!(empty.source().contains("def script_fun():\n  \n  pass\n"));
        assert_eq!(empty.body_line_offset(), 6);

        let commented = python.wrap("# nothing yet\n", &Value::Null).unwrap();
        assert!(commented
            .source()
            .contains("  # nothing yet\n  \n  pass\n\nresult = script_fun()"));
        assert_eq!(commented.script_line(7), Some(1));

        let indented = python.wrap("    return 1", &Value::Null).unwrap();
        assert!(!indented.source().contains("pass"));
    }

    #[tokio::test]
    async fn test_invocation_arguments() {
        let lib = library_fixture();
        let executor = Arc::new(RecordingExecutor::succeeding("out", "err"));
        let python = adapter(lib.path(), executor.clone());

        let result = python
            .execute(&ExecutionRequest::new("return 1"))
            .await
            .unwrap();
        assert_eq!(result.stdout, "out");
        assert_eq!(result.stderr, "err");

        let argv = executor.last_call();
        assert_eq!(argv.len(), 7);
        assert_eq!(argv[0], "wasm/python/bin/python.wasm");
        assert!(argv[1].starts_with("--mapdir=lib:"));
        assert_eq!(argv[2..6], ["--", "-B", "-q", "-c"].map(String::from));
        assert!(argv[6].starts_with("import sys,json\ninputData = json.loads(\"null\")"));
        assert!(argv[6].contains("\n  return 1\n"));
    }

    #[tokio::test]
    async fn test_workspace_lives_for_invocation_only() {
        let lib = library_fixture();
        let seen = Arc::new(Mutex::new(None));
        let seen_in_run = seen.clone();
        let executor = Arc::new(RecordingExecutor::succeeding("", "").with_inspect(
            move |argv: &[String]| {
                let dir = mapped_dir(argv);
                assert!(dir.join("os.py").is_file());
                *seen_in_run.lock().unwrap() = Some(dir);
            },
        ));
        let python = adapter(lib.path(), executor);

        python
            .execute(&ExecutionRequest::new("return None"))
            .await
            .unwrap();

        let dir = seen.lock().unwrap().clone().unwrap();
        assert_ne!(dir, lib.path());
        assert!(!dir.exists());
        assert!(lib.path().join("os.py").exists());
    }

    #[tokio::test]
    async fn test_failure_is_propagated_and_workspace_removed() {
        let lib = library_fixture();
        let executor = Arc::new(RecordingExecutor::failing(1, "SyntaxError: invalid syntax"));
        let python = adapter(lib.path(), executor.clone());

        let err = python
            .execute(&ExecutionRequest::new("return (").with_task_id("t-1"))
            .await
            .unwrap_err();

        match err {
            ScriptletError::SandboxExecution {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(stderr, "SyntaxError: invalid syntax");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(executor.call_count(), 1);
        assert!(!mapped_dir(&executor.last_call()).exists());
    }

    #[tokio::test]
    async fn test_missing_library_skips_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(RecordingExecutor::succeeding("", ""));
        let python = adapter(&dir.path().join("missing"), executor.clone());

        let err = python
            .execute(&ExecutionRequest::new("return 1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptletError::Provisioning { .. }));
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn test_each_execution_gets_a_fresh_workspace() {
        let lib = library_fixture();
        let executor = Arc::new(RecordingExecutor::succeeding("", ""));
        let python = adapter(lib.path(), executor.clone());

        let request = ExecutionRequest::new("return 1");
        let (first, second) = tokio::join!(python.execute(&request), python.execute(&request));
        assert_eq!(first.unwrap(), second.unwrap());

        let calls = executor.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_ne!(mapped_dir(&calls[0]), mapped_dir(&calls[1]));
        assert_eq!(calls[0][6], calls[1][6]);
    }

    /// Runs the generated programs with the host's python3, when there is one.
    mod host {
        use super::*;

        async fn run(script: &str, input: Value) -> Option<Result<ExecutionResult>> {
            let interpreter = HostInterpreter::detect("python3", &["--version"])?;
            let lib = library_fixture();
            let python = adapter(lib.path(), Arc::new(interpreter));
            Some(
                python
                    .execute(&ExecutionRequest::new(script).with_input(input))
                    .await,
            )
        }

        #[tokio::test]
        async fn test_probe_streams() {
            let Some(result) = run(PYTHON_PROBE.script, Value::Null).await else {
                return;
            };
            let result = result.unwrap();
            assert_eq!(result.stdout, PYTHON_PROBE.expected_stdout);
            assert_eq!(result.stderr, PYTHON_PROBE.expected_stderr);
        }

        #[tokio::test]
        async fn test_no_return_adds_nothing() {
            let Some(result) = run("print('a')\nprint('b', end='')", Value::Null).await else {
                return;
            };
            assert_eq!(result.unwrap().stdout, "a\nb");
        }

        #[tokio::test]
        async fn test_structured_return_is_json() {
            let Some(result) = run("return {'items': [1, 2], 'ok': True}", Value::Null).await
            else {
                return;
            };
            assert_eq!(result.unwrap().stdout, r#"{"items": [1, 2], "ok": true}"#);
        }

        #[tokio::test]
        async fn test_empty_string_return() {
            let Some(result) = run("log('x', 'y')\nreturn ''", Value::Null).await else {
                return;
            };
            let result = result.unwrap();
            assert_eq!(result.stdout, "");
            assert_eq!(result.stderr, "x y\n");
        }

        #[tokio::test]
        async fn test_script_without_statements_runs() {
            for script in ["", "# nothing yet", "\n   # indented comment\n"] {
                let Some(result) = run(script, Value::Null).await else {
                    return;
                };
                let result = result.unwrap();
                assert_eq!(result.stdout, "", "{script:?}");
                assert_eq!(result.stderr, "", "{script:?}");
            }
        }

        #[tokio::test]
        async fn test_input_data_is_bound() {
            let input = json!({"name": "quote \" and\nnewline", "values": [1, 2, 3]});
            let Some(result) = run(
                "return inputData['name'] + '|' + str(sum(inputData['values']))",
                input,
            )
            .await
            else {
                return;
            };
            assert_eq!(result.unwrap().stdout, "quote \" and\nnewline|6");
        }

        #[tokio::test]
        async fn test_script_error_is_execution_error() {
            let Some(result) = run("raise ValueError('bad')", Value::Null).await else {
                return;
            };
            match result.unwrap_err() {
                ScriptletError::SandboxExecution { stderr, .. } => {
                    assert!(stderr.contains("ValueError: bad"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }
}
