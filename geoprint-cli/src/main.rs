use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod error;
mod job;

use config::Config;
use error::{print_error_and_exit, CliError};
use job::Overrides;

#[derive(Parser)]
#[command(name = "geoprint")]
#[command(about = "GeoPrint - map print compositor")]
#[command(version)]
#[command(long_about = "
GeoPrint turns a map view (rendered layer canvases plus a layer tree) into a
printable PDF with a cropped map, scale bar, coordinate readout and legend.

Examples:
  geoprint print --job job.json --output map.pdf
  geoprint print --job job.json --output map.pdf --dpi 300 --paper a3 --orientation landscape
  geoprint legend --job job.json
  geoprint config --example > geoprint.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads to use for legend fetches and probes
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Composite a print job into a PDF
    Print {
        /// Print job file (JSON)
        #[arg(long, required = true)]
        job: PathBuf,

        /// Output PDF file
        #[arg(short, long, required = true)]
        output: PathBuf,

        /// Output resolution (72, 96, 150 or 300)
        #[arg(long)]
        dpi: Option<u32>,

        /// Paper size (a4, a3, letter, legal)
        #[arg(long)]
        paper: Option<String>,

        /// Page orientation (portrait, landscape)
        #[arg(long)]
        orientation: Option<String>,

        /// Title printed in the header
        #[arg(long)]
        title: Option<String>,

        /// Leave the legend out
        #[arg(long)]
        no_legend: bool,

        /// Keep every visible layer in the legend, even without content in the selection
        #[arg(long)]
        no_filter: bool,

        /// Cancel the print after this many seconds
        #[arg(long)]
        deadline: Option<u64>,

        /// Print a JSON summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// List the layers the legend would show
    Legend {
        /// Print job file (JSON)
        #[arg(long, required = true)]
        job: PathBuf,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration or generate an example
    Config {
        /// Print the default configuration
        #[arg(long)]
        example: bool,

        /// Write the default configuration to a file
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    let threads = cli.threads.unwrap_or(config.general.threads);
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to set thread count")?;
    }

    match cli.command {
        Commands::Print { job, output, dpi, paper, orientation, title, no_legend, no_filter, deadline, summary } => {
            let args = commands::print::PrintArgs {
                job,
                output,
                overrides: Overrides { dpi, paper, orientation, title, no_legend },
                no_filter,
                deadline_secs: deadline,
                summary,
            };
            commands::print::execute(&config, args)?;
        }

        Commands::Legend { job, json } => {
            commands::legend::execute(&job, json)?;
        }

        Commands::Config { example, write } => {
            commands::config::execute(&config, example, write)?;
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    if let Err(err) = run(cli) {
        let err = CliError::from_anyhow(err);
        if err.is_silent() {
            log::info!("Print cancelled");
            std::process::exit(130);
        }
        print_error_and_exit(&err);
    }
}
