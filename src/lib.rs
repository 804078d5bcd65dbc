pub mod cli;
pub mod config;
pub mod error;
pub mod language;
pub mod sandbox;

pub use error::{Result, ScriptletError};
pub use language::{ExecutionRequest, Language, LanguageAdapter};
pub use sandbox::{ExecutionResult, SandboxExecutor};
