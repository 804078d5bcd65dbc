use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptletError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Script preparation errors
    #[error("Input data cannot be embedded in a script: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to provision workspace from {path}: {source}")]
    Provisioning {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Sandbox errors
    #[error("Sandbox initialization failed: {0}")]
    SandboxInit(String),

    #[error("wasmer binary not found: {path}")]
    WasmerNotFound { path: String },

    #[error("Failed to launch {binary}: {source}")]
    SandboxLaunch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Sandboxed process exited with {}: {stderr}", describe_exit(.exit_code))]
    SandboxExecution {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Sandbox timeout after {seconds} seconds")]
    SandboxTimeout { seconds: u64 },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScriptletError {
    /// Whether the failure came from the sandboxed process itself rather than
    /// from preparing it.
    pub fn is_sandbox_failure(&self) -> bool {
        matches!(
            self,
            Self::SandboxExecution { .. } | Self::SandboxLaunch { .. } | Self::SandboxTimeout { .. }
        )
    }
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ScriptletError>;
