//! Per-file shared state for one in-flight shard (§3 "Block buffer", §5).
//!
//! Holds the shard's immutable source bytes plus one write-once slot per
//! block. Workers write disjoint slots with no locking beyond `OnceLock`'s
//! own (uncontended, since each slot is written exactly once); the
//! completion counter's `fetch_add(Release)` / `load(Acquire)` pair is the
//! fence that makes those writes visible to the gatherer once it observes
//! the transition to `block_count`. This is the safe re-architecture of the
//! source's raw-pointer-plus-counter design described in spec.md §9: one
//! owning handle per file, workers get a send-once handle to a single slot,
//! and ownership of the whole array passes to the gatherer on completion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// A byte source shared across worker threads: a memory-mapped file for
/// local compression, or a received shard for inter-node mode.
pub type SharedBytes = Arc<dyn AsRef<[u8]> + Send + Sync>;

pub struct BlockBuffer {
    source: SharedBytes,
    slots: Box<[OnceLock<Vec<u8>>]>,
    completed: AtomicUsize,
    block_count: usize,
}

impl BlockBuffer {
    pub fn new(source: SharedBytes, block_count: usize) -> Self {
        let slots = (0..block_count).map(|_| OnceLock::new()).collect();
        BlockBuffer {
            source,
            slots,
            completed: AtomicUsize::new(0),
            block_count,
        }
    }

    pub fn source(&self) -> &[u8] {
        self.source.as_ref().as_ref()
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Records block `index`'s output bytes and advances the completion
    /// counter. Returns `true` exactly when this call is the one that moves
    /// the counter to `block_count` (i.e. the file just finished). At most
    /// one task exists per (file, block index) at any instant, so `set`
    /// should never observe an already-filled slot; that would indicate a
    /// dispatcher bug, so it is treated as unreachable rather than
    /// silently overwritten.
    pub fn store(&self, index: usize, bytes: Vec<u8>) -> bool {
        assert!(index < self.block_count, "block index out of range");
        self.slots[index]
            .set(bytes)
            .unwrap_or_else(|_| panic!("block {index} completed twice"));
        let previous = self.completed.fetch_add(1, Ordering::Release);
        previous + 1 == self.block_count
    }

    /// Valid only after `store` has returned `true` for the last block
    /// (i.e. after the file is observed complete via an `Acquire` load).
    pub fn finished_blocks(&self) -> Vec<&[u8]> {
        debug_assert_eq!(self.completed.load(Ordering::Acquire), self.block_count);
        self.slots
            .iter()
            .map(|slot| slot.get().expect("block buffer read before completion").as_slice())
            .collect()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Consumes the buffer once every block has been stored, returning the
    /// block payloads in order. Panics if any slot is still empty.
    pub fn into_finished(self) -> Vec<Vec<u8>> {
        debug_assert_eq!(self.completed.load(Ordering::Acquire), self.block_count);
        Vec::from(self.slots)
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.into_inner().unwrap_or_else(|| panic!("block {i} never completed")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_writer_transition_is_reported_once() {
        let buf = BlockBuffer::new(Arc::new(Vec::<u8>::new()), 3);
        assert!(!buf.store(1, vec![1]));
        assert!(!buf.store(0, vec![0]));
        assert!(buf.store(2, vec![2]));
        let blocks = buf.finished_blocks();
        assert_eq!(blocks, vec![&[0u8][..], &[1u8][..], &[2u8][..]]);
    }

    #[test]
    fn into_finished_returns_blocks_in_order() {
        let buf = BlockBuffer::new(Arc::new(Vec::<u8>::new()), 2);
        buf.store(1, vec![9, 9]);
        buf.store(0, vec![1]);
        assert_eq!(buf.into_finished(), vec![vec![1u8], vec![9u8, 9]]);
    }

    #[test]
    fn zero_block_file_is_immediately_empty() {
        let buf = BlockBuffer::new(Arc::new(Vec::<u8>::new()), 0);
        assert_eq!(buf.completed(), 0);
        assert!(buf.finished_blocks().is_empty());
    }

    #[test]
    #[should_panic]
    fn storing_same_index_twice_panics() {
        let buf = BlockBuffer::new(Arc::new(Vec::<u8>::new()), 1);
        buf.store(0, vec![1]);
        buf.store(0, vec![2]);
    }
}
