//! Inter-node message-passing transport (§6 "Transport contract").
//!
//! The coordinator and worker shell only ever see this trait, never a
//! concrete MPI type, so a default build works entirely in local
//! (single-process) mode and the `mpi` feature is purely additive.

use crate::error::{BlzError, Result};

/// Tag reserved for the end-of-job sentinel sent from the coordinator to
/// every worker once every file has been dispatched.
pub const SENTINEL_TAG: i32 = i32::MAX;

/// Wildcard source for `probe`/`exchange`, matching any rank.
pub const ANY_SOURCE: i32 = -1;

/// One leg of a batched `exchange` call.
pub enum TransportOp {
    /// Post a send of `data` to `dest` under `tag`.
    Send { dest: i32, tag: i32, data: Vec<u8> },
    /// Post a receive of exactly `len` bytes from `source` under `tag`.
    /// `len` is normally obtained from a prior `probe` call.
    Recv { source: i32, tag: i32, len: usize },
}

/// The result of one `TransportOp`, in the same order the ops were given.
pub enum TransportOutcome {
    Sent,
    Received(Vec<u8>),
}

/// The abstract transport used between the inter-node coordinator and the
/// worker shell. Ranks and tags are plain integers; tag `SENTINEL_TAG` is
/// reserved for end-of-job.
pub trait Transport: Send + Sync {
    fn rank(&self) -> i32;
    fn world_size(&self) -> i32;

    /// Returns `(source, tag, byte_count)` for the next incoming message
    /// without consuming it, blocking until one is available.
    fn probe(&self, source: i32) -> Result<(i32, i32, usize)>;

    /// Posts every op in `ops` before waiting on any of them, so several
    /// shards can be in flight to different workers at once instead of
    /// each transfer blocking the next one's send (§5 "asynchronous
    /// send/receive"). Returns one `TransportOutcome` per op, in order.
    fn exchange(&self, ops: Vec<TransportOp>) -> Result<Vec<TransportOutcome>>;

    /// Convenience wrapper around `exchange` for a single send.
    fn send(&self, dest: i32, tag: i32, data: Vec<u8>) -> Result<()> {
        self.exchange(vec![TransportOp::Send { dest, tag, data }])?;
        Ok(())
    }

    /// Convenience wrapper around `exchange` for a single receive of a
    /// known length (typically obtained from `probe`).
    fn recv(&self, source: i32, tag: i32, len: usize) -> Result<Vec<u8>> {
        match self.exchange(vec![TransportOp::Recv { source, tag, len }])?.pop() {
            Some(TransportOutcome::Received(buf)) => Ok(buf),
            _ => Err(BlzError::transport("exchange of a single Recv op did not yield a Received outcome")),
        }
    }
}

/// Single-process transport: `world_size() == 1`, rank `0`. Used whenever
/// the process was not launched under an MPI runtime — the job dispatcher
/// then never engages the coordinator or worker shell at all, so none of
/// these methods are expected to be called in that mode.
pub struct LocalTransport;

impl Transport for LocalTransport {
    fn rank(&self) -> i32 {
        0
    }

    fn world_size(&self) -> i32 {
        1
    }

    fn probe(&self, _source: i32) -> Result<(i32, i32, usize)> {
        Err(BlzError::transport(
            "LocalTransport has no peers to probe (world_size == 1)",
        ))
    }

    fn exchange(&self, _ops: Vec<TransportOp>) -> Result<Vec<TransportOutcome>> {
        Err(BlzError::transport(
            "LocalTransport has no peers to exchange with (world_size == 1)",
        ))
    }
}

#[cfg(feature = "mpi")]
mod mpi_transport {
    use super::*;
    use mpi::request::{scope, WaitGuard};
    use mpi::traits::*;

    /// MPI-backed transport (rsmpi), used when the process is launched
    /// under an MPI runtime with `world_size() > 1`. Rank 0 runs the
    /// coordinator; every other rank runs the worker shell.
    pub struct MpiTransport {
        world: mpi::topology::SimpleCommunicator,
    }

    impl MpiTransport {
        /// Initializes the MPI runtime. Must be called at most once per
        /// process; the returned guard keeps MPI initialized for as long
        /// as the transport is alive.
        pub fn init() -> (mpi::environment::Universe, Self) {
            let universe = mpi::initialize().expect("MPI_Init failed");
            let world = universe.world();
            (universe, MpiTransport { world })
        }
    }

    impl Transport for MpiTransport {
        fn rank(&self) -> i32 {
            self.world.rank()
        }

        fn world_size(&self) -> i32 {
            self.world.size()
        }

        fn probe(&self, source: i32) -> Result<(i32, i32, usize)> {
            let process = if source == ANY_SOURCE {
                self.world.any_process()
            } else {
                self.world.process_at_rank(source)
            };
            let status = process.matched_probe().1;
            let count = status.count(mpi::datatype::u8::equivalent_datatype()) as usize;
            Ok((status.source_rank(), status.tag(), count))
        }

        /// Posts every send and every receive in `ops` with
        /// `immediate_send_with_tag`/`immediate_receive_into_with_tag`
        /// before waiting on any of them, mirroring
        /// `original_source/MPI_minizip.cpp`'s pattern of filling an
        /// `MPI_Isend`/`MPI_Irecv` array across a loop and only then
        /// draining it with `MPI_Wait`.
        fn exchange(&self, ops: Vec<TransportOp>) -> Result<Vec<TransportOutcome>> {
            let mut recv_bufs: Vec<Option<Vec<u8>>> = ops
                .iter()
                .map(|op| match op {
                    TransportOp::Recv { len, .. } => Some(vec![0u8; *len]),
                    TransportOp::Send { .. } => None,
                })
                .collect();

            scope(|s| {
                let mut send_guards = Vec::new();
                let mut recv_guards = Vec::new();

                for (op, recv_buf) in ops.iter().zip(recv_bufs.iter_mut()) {
                    match op {
                        TransportOp::Send { dest, tag, data } => {
                            let process = self.world.process_at_rank(*dest);
                            let request = process.immediate_send_with_tag(s, data.as_slice(), *tag);
                            send_guards.push(WaitGuard::from(request));
                        }
                        TransportOp::Recv { source, tag, .. } => {
                            let process = if *source == ANY_SOURCE {
                                self.world.any_process()
                            } else {
                                self.world.process_at_rank(*source)
                            };
                            let buf = recv_buf.as_mut().expect("recv buffer allocated above");
                            let request = process.immediate_receive_into_with_tag(s, buf.as_mut_slice(), *tag);
                            recv_guards.push(WaitGuard::from(request));
                        }
                    }
                }

                // Every guard's Drop blocks on its own request's MPI_Wait;
                // all sends and receives above are already posted by the
                // time either Vec starts dropping, so they run concurrently
                // rather than being serialized one at a time.
                drop(recv_guards);
                drop(send_guards);
            });

            Ok(ops
                .into_iter()
                .zip(recv_bufs.into_iter())
                .map(|(op, recv_buf)| match op {
                    TransportOp::Send { .. } => TransportOutcome::Sent,
                    TransportOp::Recv { .. } => TransportOutcome::Received(recv_buf.expect("recv buffer allocated above")),
                })
                .collect())
        }
    }
}

#[cfg(feature = "mpi")]
pub use mpi_transport::MpiTransport;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_transport_reports_single_rank_world() {
        let t = LocalTransport;
        assert_eq!(t.rank(), 0);
        assert_eq!(t.world_size(), 1);
    }

    #[test]
    fn local_transport_refuses_peer_operations() {
        let t = LocalTransport;
        assert!(t.probe(0).is_err());
        assert!(t
            .exchange(vec![TransportOp::Send {
                dest: 0,
                tag: 0,
                data: vec![1]
            }])
            .is_err());
    }
}
