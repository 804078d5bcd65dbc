use async_trait::async_trait;

use crate::error::Result;
use crate::sandbox::ExecutionResult;

/// Trait for the process that actually runs an interpreter image.
///
/// Implementations take a complete argument vector (interpreter image first)
/// and return the captured streams. A nonzero exit or a launch failure is an
/// error; callers never inspect exit codes themselves.
#[async_trait]
pub trait SandboxExecutor: Send + Sync {
    /// Returns the executor name (e.g., "wasmer")
    fn name(&self) -> &str;

    /// Run the argument vector to completion
    async fn run(&self, args: &[String]) -> Result<ExecutionResult>;
}
