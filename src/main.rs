/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use colored::Colorize;
use std::path::Path;
use tailscope::{
    clap_args::{self, Commands},
    config::Config,
    render,
};
use tracing::{info, subscriber::set_global_default, Subscriber};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TAILSCOPE_LOG";

fn get_subscriber(env_filter: &str) -> impl Subscriber + Sync + Send {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(env_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish()
}

fn init_subscriber(subscriber: impl Subscriber + Sync + Send) -> anyhow::Result<()> {
    set_global_default(subscriber)?;
    Ok(())
}

fn init_config(path: &Path) {
    match Config::write_example_to_file(path) {
        Ok(_) => println!("{} {}", path.display(), "created!".green()),
        Err(err) => println!("{}\n{}", "Error creating config.".red(), err),
    }
}

fn run(config_path: &Path, plot: bool, quiet: bool) -> anyhow::Result<()> {
    let config = Config::try_from_path(config_path)?;
    info!("Loaded config from {}", config_path.display());

    let report = tailscope::run(&config)?;
    let written = report.write_artifacts(&config.output_dir())?;

    if !quiet {
        render::print_summary(&report, &config.palette);
        if plot {
            render::plot_distributions(&report, &config.palette);
        }

        println!("\n{}", "Generated files:".green());
        for path in written {
            println!("  {}", path.display());
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = clap_args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    init_subscriber(get_subscriber(level))?;

    match args.command {
        Commands::Init { path } => init_config(&path),
        Commands::Run {
            config,
            plot,
            quiet,
        } => run(&config, plot, quiet)?,
    }

    Ok(())
}
