//! costplan cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; costplan ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List resource instances with their evaluated attributes
    ///
    /// Reads HCL from stdin unless any other source is provided (via --input-*)
    #[command(alias = "res")]
    Resources(ResourcesCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct ResourcesCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub variables: VariableArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Maximum depth of nested module calls
    #[clap(long = "max-module-depth", default_value_t = costplan::evaluator::DEFAULT_MAX_MODULE_DEPTH)]
    pub max_module_depth: usize,

    /// Largest accepted `count` of a single block
    #[clap(long = "max-count", default_value_t = costplan::evaluator::DEFAULT_MAX_COUNT)]
    pub max_count: usize,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// Load the module in the work directory
    #[clap(short = 'w', long = "input-workdir")]
    pub workdir: bool,

    /// Load a file
    #[clap(short = 'f', long = "input-file")]
    pub files: Vec<PathBuf>,

    /// Load the module in the given directory
    #[clap(short = 'd', long = "input-dir")]
    pub directories: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct VariableArgs {
    /// Set a root module variable (name=value)
    ///
    /// The value is parsed as an expression, anything that does
    /// not parse is taken as a string.
    #[clap(long = "var")]
    pub vars: Vec<String>,

    /// Load root module variables from a .tfvars file
    #[clap(long = "var-file")]
    pub var_files: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Loaded top-level syntax nodes
    Documents,
    /// Block tree with addresses
    Blocks,
}
