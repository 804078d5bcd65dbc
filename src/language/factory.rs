use std::sync::Arc;

use crate::config::types::ScriptletConfig;
use crate::language::{Language, LanguageAdapter, PythonAdapter, QuickJsAdapter};
use crate::sandbox::SandboxExecutor;

/// Create the adapter for `language`, sharing `executor`.
pub fn create_adapter(
    language: Language,
    config: &ScriptletConfig,
    executor: Arc<dyn SandboxExecutor>,
) -> Box<dyn LanguageAdapter> {
    match language {
        Language::Python => Box::new(PythonAdapter::new(&config.python, executor)),
        Language::QuickJs => Box::new(QuickJsAdapter::new(&config.quickjs, executor)),
    }
}
