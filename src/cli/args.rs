use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::language::Language;

#[derive(Parser, Debug)]
#[clap(name = "scriptlet")]
#[clap(version, about = "Run Python and JavaScript snippets in a Wasmer sandbox")]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(flatten)]
    pub global_opts: GlobalOpts,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalOpts {
    /// Configuration file path
    #[clap(short, long, global = true, env = "SCRIPTLET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[clap(long, global = true, default_value = "text", value_enum)]
    pub format: OutputFormat,

    /// Python interpreter image (overrides PYTHON_PATH and the config file)
    #[clap(long, global = true)]
    pub python_bin: Option<PathBuf>,

    /// Python library directory (overrides PYTHON_LIB_PATH and the config file)
    #[clap(long, global = true)]
    pub python_lib: Option<PathBuf>,

    /// QuickJS interpreter image (overrides QUICKJS_PATH and the config file)
    #[clap(long, global = true)]
    pub quickjs_bin: Option<PathBuf>,

    /// wasmer CLI to run images with
    #[clap(long, global = true)]
    pub wasmer: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a script and print its output and log streams
    Run(RunArgs),

    /// Check that each interpreter image still honours the output contract
    Health(HealthArgs),

    /// Initialize a new scriptlet configuration
    Init(InitArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Script language
    #[clap(long, short = 'l', value_enum)]
    pub lang: Language,

    /// Script text (the body of the implicit function)
    #[clap(required_unless_present = "file", conflicts_with = "file")]
    pub script: Option<String>,

    /// Read the script from a file ("-" for stdin)
    #[clap(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Input data as JSON
    #[clap(long, short = 'i', conflicts_with = "input_file")]
    pub input: Option<String>,

    /// Read input data JSON from a file
    #[clap(long)]
    pub input_file: Option<PathBuf>,

    /// Label used in logs for this execution
    #[clap(long)]
    pub task_id: Option<String>,

    /// Extra arguments recorded with the request
    #[clap(last = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Only check this language
    #[clap(long, short = 'l', value_enum)]
    pub lang: Option<Language>,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force overwrite existing configuration
    #[clap(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[clap(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
}

#[derive(Debug, Clone, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
