use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::types::ScriptletConfig;
use crate::language::factory::create_adapter;
use crate::language::{ExecutionRequest, Language, LanguageAdapter};
use crate::sandbox::SandboxExecutor;

/// A fixed script and the exact streams it must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthProbe {
    pub script: &'static str,
    pub expected_stdout: &'static str,
    pub expected_stderr: &'static str,
}

/// Run `probe` through `adapter` and compare both streams exactly.
///
/// Mismatches and failures are logged and reported as `false`; this never
/// returns an error.
pub async fn run_probe<A>(adapter: &A, probe: &HealthProbe) -> bool
where
    A: LanguageAdapter + ?Sized,
{
    let language = adapter.language();
    let request =
        ExecutionRequest::new(probe.script).with_task_id(format!("healthcheck-{}", language));

    match adapter.execute(&request).await {
        Ok(result)
            if result.stdout == probe.expected_stdout
                && result.stderr == probe.expected_stderr =>
        {
            info!(language = %language, "Healthcheck passed");
            true
        }
        Ok(result) => {
            warn!(
                language = %language,
                stdout = ?result.stdout,
                stderr = ?result.stderr,
                expected_stdout = ?probe.expected_stdout,
                expected_stderr = ?probe.expected_stderr,
                "Unexpected healthcheck result"
            );
            false
        }
        Err(e) => {
            error!(language = %language, error = %e, "Unexpected healthcheck error");
            false
        }
    }
}

/// Run the probe of every language, in [`Language::ALL`] order.
pub async fn check_all(
    config: &ScriptletConfig,
    executor: Arc<dyn SandboxExecutor>,
) -> Vec<(Language, bool)> {
    let mut results = Vec::with_capacity(Language::ALL.len());
    for language in Language::ALL {
        let adapter = create_adapter(language, config, executor.clone());
        results.push((language, adapter.health_check().await));
    }
    results
}
