use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::types::QuickJsConfig;
use crate::error::Result;
use crate::language::escape::escape_json;
use crate::language::health::HealthProbe;
use crate::language::wrapper::WrappedProgram;
use crate::language::{
    log_invocation_failure, ExecutionRequest, InvocationSpec, Language, LanguageAdapter,
};
use crate::sandbox::{ExecutionResult, SandboxExecutor};

const PREAMBLE_HEAD: &str = "const $ = JSON.parse(";

// Every console method and the global `log` write a line to stderr; `print`
// writes to stdout without a newline.
const PREAMBLE_TAIL: &str = r#");
console.error = function(...args) {
  std.err.puts(args.join(' '));
  std.err.puts('\n');
};
console.log = console.error;
console.warn = console.error;
console.info = console.error;
console.debug = console.error;
globalThis.log = console.error;
globalThis.print = function(...args) {
  std.out.puts(args.join(' '));
};
let result = (function() {
"#;

const EPILOGUE: &str = r#"
})();
if (result != null) {
  const text = typeof result === 'string' ? result : JSON.stringify(result);
  if (text !== undefined) {
    std.out.puts(text);
  }
}
"#;

/// Exercises every log alias, `print` and a string return.
pub const QUICKJS_PROBE: HealthProbe = HealthProbe {
    script: r#"
      console.log('console.log');
      log('log');
      console.error('console.error');
      print("print\n");
      return 'result';
      "#,
    expected_stdout: "print\nresult",
    expected_stderr: "console.log\nlog\nconsole.error\n",
};

/// Runs scripts with quickjs.wasm.
///
/// The script becomes the body of an immediately invoked function; `$` holds
/// the decoded input.
pub struct QuickJsAdapter {
    binary: PathBuf,
    executor: Arc<dyn SandboxExecutor>,
}

impl QuickJsAdapter {
    pub fn new(config: &QuickJsConfig, executor: Arc<dyn SandboxExecutor>) -> Self {
        Self {
            binary: config.binary.clone(),
            executor,
        }
    }

    /// Build the wasmer arguments for `program`.
    ///
    /// `--std` exposes the `std` module (and with it `std.out`/`std.err`),
    /// `-e` evaluates the program text.
    pub fn build_invocation(&self, program: WrappedProgram) -> InvocationSpec {
        let args = vec!["--".to_string(), "--std".to_string(), "-e".to_string()];
        InvocationSpec::new(&self.binary, args, program)
    }
}

#[async_trait]
impl LanguageAdapter for QuickJsAdapter {
    fn language(&self) -> Language {
        Language::QuickJs
    }

    fn wrap(&self, script: &str, input_data: &Value) -> Result<WrappedProgram> {
        let literal = escape_json(input_data)?;
        let preamble = format!("{}{}{}", PREAMBLE_HEAD, literal, PREAMBLE_TAIL);
        Ok(WrappedProgram::assemble(&preamble, script, EPILOGUE))
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let program = self.wrap(request.script(), request.input_data())?;
        let invocation = self.build_invocation(program);
        let started = Instant::now();

        match self.executor.run(invocation.argv()).await {
            Ok(result) => {
                info!(
                    task_id = request.task_id(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    stdout_len = result.stdout.len(),
                    stderr_len = result.stderr.len(),
                    "executeQuickJs succeeded"
                );
                debug!(stdout = %result.stdout, stderr = %result.stderr, "QuickJS output");
                Ok(result)
            }
            Err(error) => {
                log_invocation_failure(
                    "executeQuickJs failed",
                    &invocation,
                    request,
                    started.elapsed(),
                    &error,
                );
                Err(error)
            }
        }
    }

    fn probe(&self) -> HealthProbe {
        QUICKJS_PROBE
    }
}
