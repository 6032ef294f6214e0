//! Inter-node entry point, only compiled with the `mpi` feature and only
//! taken when launched under an MPI runtime with more than one rank. Rank 0
//! runs the coordinator (§4.F/§4.F'); every other rank runs the worker
//! shell (§4.G) until the sentinel tag arrives.

use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use pminiz_core::config::{JobConfig, Mode};
use pminiz_core::transport::MpiTransport;
use pminiz_core::{coordinator, naming, worker_shell, BlzError};
use rayon::prelude::*;
use walkdir::WalkDir;

pub fn run(cfg: &JobConfig, root: &Path, transport: &MpiTransport) -> Result<ExitCode> {
    use pminiz_core::transport::Transport;

    if transport.rank() == 0 {
        let files: Vec<_> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| match cfg.mode {
                Mode::Compress => !naming::is_compressed(p),
                Mode::Decompress => naming::is_compressed(p),
            })
            .collect();

        let sizes: Vec<u64> = files
            .iter()
            .map(|p| std::fs::metadata(p).map(|m| m.len()).unwrap_or(0))
            .collect();
        coordinator::broadcast_file_sizes(transport, &sizes)?;

        // Iteration over files is additionally parallel over a small
        // thread pool (§5), so sends/receives/disk writes belonging to
        // different files overlap rather than running strictly one file
        // at a time.
        let pool_size = files.len().clamp(1, num_cpus::get());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(pool_size)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build coordinator file pool: {e}"))?;

        let failed = AtomicUsize::new(0);
        let outcome: std::result::Result<(), anyhow::Error> = pool.install(|| {
            files.par_iter().enumerate().try_for_each(|(id, path)| {
                match run_one_file(cfg, transport, id as i32, path) {
                    Ok(()) => Ok(()),
                    Err(err) => {
                        tracing::error!(path = %path.display(), error = %err, "inter-node file failed");
                        if is_transport_failure(&err) {
                            // §7: a transport failure in the coordinator is
                            // fatal to the whole job, not just this file —
                            // bail out instead of folding it into `failed`.
                            return Err(err);
                        }
                        failed.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }
                }
            })
        });

        if let Err(err) = outcome {
            return Err(err.context("transport failure in coordinator; aborting job"));
        }

        coordinator::send_sentinel(transport)?;

        Ok(if failed.load(Ordering::Relaxed) == 0 {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    } else {
        let workers = cfg.workers.unwrap_or_else(num_cpus::get);
        worker_shell::run(transport, cfg.mode, cfg.block_size, workers, cfg.compression_level)?;
        Ok(ExitCode::SUCCESS)
    }
}

/// True if `err` is (or wraps) a `BlzError::TransportFailed`.
fn is_transport_failure(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<BlzError>(), Some(BlzError::TransportFailed { .. }))
}

fn run_one_file(
    cfg: &JobConfig,
    transport: &dyn pminiz_core::transport::Transport,
    file_id: i32,
    path: &Path,
) -> anyhow::Result<()> {
    let data = std::fs::read(path)?;
    match cfg.mode {
        Mode::Compress => {
            let container = coordinator::compress_file_distributed(transport, cfg, file_id, &data)?;
            let out = naming::disambiguate(&naming::compressed_name(path), |p| p.exists());
            std::fs::write(out, container)?;
        }
        Mode::Decompress => {
            let restored = coordinator::decompress_file_distributed(transport, file_id, &data)?;
            let out = naming::disambiguate(&naming::decompressed_name(path), |p| p.exists());
            std::fs::write(out, restored)?;
        }
    }
    Ok(())
}
