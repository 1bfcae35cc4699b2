use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{load::LoadArgs, query::QueryArgs, report::ReportArgs};

#[derive(Debug, Parser)]
#[command(name = "cinemart", version, about = "Movie-catalog mart and analytics")]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Load(LoadArgs),
    Report(ReportArgs),
    Query(QueryArgs),
}
