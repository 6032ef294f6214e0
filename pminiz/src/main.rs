//! pminiz - parallel block-oriented file compressor/decompressor.
//!
//! ```bash
//! pminiz c ./data            # compress every file under ./data
//! pminiz d ./data 8          # decompress with 8 codec workers per process
//! pminiz c ./data --block-size 4194304 -v
//! ```

mod cli;
#[cfg(feature = "mpi")]
mod mpi_main;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::Args;
use pminiz_core::Verbosity;
#[cfg(feature = "mpi")]
use pminiz_core::transport::Transport;
use tracing_subscriber::EnvFilter;

fn init_logging(verbosity: Verbosity) {
    let level = match verbosity {
        Verbosity::Silent => None,
        Verbosity::ErrorsOnly => Some("error"),
        Verbosity::Verbose => Some("info"),
    };
    let Some(level) = level else { return };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbosity());
    let cfg = args.job_config()?;

    #[cfg(feature = "mpi")]
    {
        let (_universe, transport) = pminiz_core::transport::MpiTransport::init();
        if transport.world_size() > 1 {
            return mpi_main::run(&cfg, &args.path, &transport);
        }
    }

    let start = std::time::Instant::now();
    let report = pminiz_core::run(&cfg, &[args.path.clone()]);
    let elapsed = start.elapsed();

    if cfg.verbosity >= Verbosity::ErrorsOnly {
        eprintln!(
            "{} files processed, {} failed, {:.2?} elapsed",
            report.succeeded,
            report.failed.len(),
            elapsed
        );
    }

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
