use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::BackendKind;

#[derive(Debug, Parser)]
#[command(
    name = "midt-pipeline",
    version,
    about = "First-level MIDT fMRI pipeline: timing, motion confounds, model fit"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Process every configured session
    Run(RunArgs),
    /// Check a configuration file and report what a run would do
    Validate(ValidateArgs),
    /// Write a template configuration file
    InitConfig(InitConfigArgs),
    /// List the default contrasts
    Contrasts,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, help = "Configuration file (.yaml, .yml or .json)")]
    pub config: PathBuf,

    #[arg(long, help = "Worker threads per stage (overrides the config)")]
    pub threads: Option<usize>,

    #[arg(long, value_enum, help = "Model-fit backend (overrides the config)")]
    pub backend: Option<BackendArg>,

    #[arg(long, help = "Also write the run summary as JSON to this file")]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[arg(long, help = "Configuration file (.yaml, .yml or .json)")]
    pub config: PathBuf,
}

#[derive(Debug, Args)]
pub struct InitConfigArgs {
    #[arg(long, default_value = "config.yaml")]
    pub out: PathBuf,

    #[arg(long, default_value_t = false, help = "Overwrite an existing file")]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    DesignOnly,
    Command,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::DesignOnly => BackendKind::DesignOnly,
            BackendArg::Command => BackendKind::Command,
        }
    }
}
