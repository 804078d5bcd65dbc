use clap::Parser;

use scriptlet::cli::args::{Cli, Commands, GlobalOpts};
use scriptlet::cli::commands;
use scriptlet::config::loader::load_config;
use scriptlet::config::types::ScriptletConfig;
use scriptlet::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.global_opts.verbose);

    // Load configuration (file + environment + CLI overrides)
    let mut config = load_config(cli.global_opts.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli.global_opts);
    let format = cli.global_opts.format.clone();

    // Dispatch to subcommand handler
    match cli.command {
        Commands::Run(args) => {
            commands::run(args, config, format).await?;
        }
        Commands::Health(args) => {
            commands::health(args, config, format).await?;
        }
        Commands::Init(args) => {
            commands::init(args).await?;
        }
        Commands::Config(args) => {
            commands::config(args, config).await?;
        }
    }

    Ok(())
}

fn apply_cli_overrides(config: &mut ScriptletConfig, opts: &GlobalOpts) {
    if let Some(path) = &opts.python_bin {
        config.python.binary = path.clone();
    }
    if let Some(path) = &opts.python_lib {
        config.python.lib_dir = path.clone();
    }
    if let Some(path) = &opts.quickjs_bin {
        config.quickjs.binary = path.clone();
    }
    if let Some(path) = &opts.wasmer {
        config.wasmer.binary = Some(path.clone());
    }
}

fn init_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Script output goes to stdout, so diagnostics must not.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
