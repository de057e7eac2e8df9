use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Verbose mode (-v, --verbose)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example config file
    Init {
        /// Where to write the config
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
    },

    /// Summarise scheduler logs against their SLOs
    Run {
        /// Path to the config file
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Draw CDF curves in the terminal
        #[arg(long)]
        plot: bool,

        /// Only write the artifacts, don't print the summary tables
        #[arg(short, long)]
        quiet: bool,
    },
}

pub fn parse() -> Args {
    Args::parse()
}
