use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::cli::args::{ConfigAction, ConfigArgs, HealthArgs, InitArgs, OutputFormat, RunArgs};
use crate::config::loader::get_config_path;
use crate::config::types::{ScriptletConfig, WasmerConfig};
use crate::error::{Result, ScriptletError};
use crate::language::{check_all, create_adapter, ExecutionRequest};
use crate::sandbox::{ExecutionResult, SandboxExecutor, WasmerExecutor};

/// Run one script and print its streams.
pub async fn run(args: RunArgs, config: ScriptletConfig, format: OutputFormat) -> Result<()> {
    let script = match (&args.script, &args.file) {
        (Some(script), _) => script.clone(),
        (None, Some(path)) => read_text(path)?,
        (None, None) => {
            return Err(ScriptletError::InvalidInput(
                "a script or --file is required".to_string(),
            ))
        }
    };

    let input = match (&args.input, &args.input_file) {
        (Some(json), _) => parse_input(json)?,
        (None, Some(path)) => parse_input(&read_text(path)?)?,
        (None, None) => Value::Null,
    };

    let mut request = ExecutionRequest::new(script)
        .with_args(args.args)
        .with_input(input);
    if let Some(task_id) = args.task_id {
        request = request.with_task_id(task_id);
    }

    info!(language = %args.lang, task_id = request.task_id(), "Running script");

    let executor = create_executor(&config.wasmer).await?;
    let adapter = create_adapter(args.lang, &config, executor);
    let result = adapter.execute(&request).await?;

    output_execution_result(&result, format);
    Ok(())
}

/// Run the healthcheck probes. Exits with status 1 if any fails.
pub async fn health(args: HealthArgs, config: ScriptletConfig, format: OutputFormat) -> Result<()> {
    let executor = create_executor(&config.wasmer).await?;

    let results = match args.lang {
        Some(language) => {
            let adapter = create_adapter(language, &config, executor);
            vec![(language, adapter.health_check().await)]
        }
        None => check_all(&config, executor).await,
    };

    match format {
        OutputFormat::Text => {
            for (language, healthy) in &results {
                println!("{:<10} {}", language, if *healthy { "ok" } else { "FAILED" });
            }
        }
        OutputFormat::Json => {
            let report: serde_json::Map<String, Value> = results
                .iter()
                .map(|(language, healthy)| (language.to_string(), Value::Bool(*healthy)))
                .collect();
            println!("{}", Value::Object(report));
        }
    }

    if results.iter().any(|(_, healthy)| !healthy) {
        std::process::exit(1);
    }
    Ok(())
}

pub async fn init(args: InitArgs) -> Result<()> {
    let config_path = get_config_path();

    if config_path.exists() && !args.force {
        println!("Configuration already exists at: {}", config_path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml_str = toml::to_string_pretty(&ScriptletConfig::default())
        .map_err(|e| ScriptletError::Config(e.to_string()))?;
    std::fs::write(&config_path, toml_str)?;

    println!("Created configuration at: {}", config_path.display());
    println!("\nQuick start:");
    println!("  # Run a Python snippet with input data");
    println!("  scriptlet run --lang python --input '{{\"n\": 2}}' \"return inputData['n'] * 21\"");
    println!();
    println!("  # Run a JavaScript snippet from a file");
    println!("  scriptlet run --lang quickjs --file script.js");
    println!();
    println!("  # Check the interpreter images");
    println!("  scriptlet health");

    Ok(())
}

pub async fn config(args: ConfigArgs, config: ScriptletConfig) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&config)
                .map_err(|e| ScriptletError::Config(e.to_string()))?;
            println!("{}", toml_str);
        }
        ConfigAction::Path => {
            println!("{}", get_config_path().display());
        }
    }
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn create_executor(config: &WasmerConfig) -> Result<Arc<dyn SandboxExecutor>> {
    let executor = WasmerExecutor::new(config).await?;
    info!(binary = %executor.binary().display(), "Sandbox executor ready");
    Ok(Arc::new(executor))
}

fn read_text(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    Ok(std::fs::read_to_string(path)?)
}

fn parse_input(json: &str) -> Result<Value> {
    serde_json::from_str(json)
        .map_err(|e| ScriptletError::InvalidInput(format!("input is not valid JSON: {}", e)))
}

fn output_execution_result(result: &ExecutionResult, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            print!("{}", result.stdout);
            eprint!("{}", result.stderr);
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "stdout": result.stdout,
                    "stderr": result.stderr,
                })
            );
        }
    }
}
