//! Double-buffered storage with lock-free writes and consistent reads.
//!
//! Writers record into whichever of two shards is currently "hot".  A single atomic word packs
//! the index of the hot shard (its top bit) together with the number of writes started so far (the
//! remaining bits).  Starting a write is one read-modify-write on that word, which both claims a
//! shard and counts the write; finishing a write bumps the shard's own completion counter.
//!
//! A reader flips the top bit, which sends all subsequent writes to the other shard, and then
//! waits for the completion counter of the now-cold shard to catch up with the number of writes
//! that had started before the flip.  At that point the cold shard holds exactly the writes that
//! started before the flip, all of them whole:
//!
//! - a write is never observed partially, no matter how many fields it touches, and
//! - if a thread issues two writes, a reader observing the second also observes the first, since
//!   the first one started (and claimed the same or an earlier shard) before the second.
//!
//! Once read, the cold shard is either folded into the hot shard, so that the hot shard carries
//! the whole history forward, or discarded, which atomically resets the storage.
//!
//! Readers serialize among themselves, but never hold up a writer.
use std::sync::atomic::Ordering;

use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::Mutex;

use crate::atomics::AtomicU64;

const HOT_INDEX_BIT: u64 = 1 << 63;
const STARTED_MASK: u64 = HOT_INDEX_BIT - 1;

/// Storage held by one half of a [`ShardedCell`].
pub(crate) trait Shard: Send + Sync {
    /// Point-in-time copy of the shard's values.
    type Snapshot;

    /// Copies the shard's values.
    fn read(&self) -> Self::Snapshot;

    /// Adds this shard's values into `other`.
    fn merge_into(&self, other: &Self);

    /// Resets every value to its initial state.
    fn clear(&self);
}

#[derive(Debug)]
pub(crate) struct ShardedCell<S> {
    started_and_hot: CachePadded<AtomicU64>,
    shards: [S; 2],
    completed: [CachePadded<AtomicU64>; 2],
    readers: Mutex<()>,
}

impl<S: Shard> ShardedCell<S> {
    pub fn new(first: S, second: S) -> ShardedCell<S> {
        ShardedCell {
            started_and_hot: CachePadded::new(AtomicU64::new(0)),
            shards: [first, second],
            completed: [CachePadded::new(AtomicU64::new(0)), CachePadded::new(AtomicU64::new(0))],
            readers: Mutex::new(()),
        }
    }

    /// Performs a write against the hot shard.
    ///
    /// `f` may touch any number of fields of the shard: readers observe either all of them or none
    /// of them.
    pub fn write<F>(&self, f: F)
    where
        F: FnOnce(&S),
    {
        let n = self.started_and_hot.fetch_add(1, Ordering::AcqRel);
        let hot = hot_index(n);
        f(&self.shards[hot]);
        self.completed[hot].fetch_add(1, Ordering::Release);
    }

    /// Reads every write performed so far, keeping them for subsequent reads.
    pub fn read(&self) -> S::Snapshot {
        let _guard = self.readers.lock();
        let cold = self.flip();
        let hot = 1 - cold;

        let snapshot = self.shards[cold].read();

        // The payload has to land before the completion count that vouches for it.
        self.shards[cold].merge_into(&self.shards[hot]);
        let carried = self.completed[cold].swap(0, Ordering::AcqRel);
        self.completed[hot].fetch_add(carried, Ordering::Release);
        self.shards[cold].clear();

        snapshot
    }

    /// Reads every write performed so far and discards them.
    ///
    /// Every write lands either entirely in the returned snapshot or entirely in the fresh state
    /// that follows.
    pub fn reset(&self) -> S::Snapshot {
        let _guard = self.readers.lock();
        let cold = self.flip();

        let snapshot = self.shards[cold].read();

        let discarded = self.completed[cold].swap(0, Ordering::AcqRel);
        self.started_and_hot.fetch_sub(discarded, Ordering::AcqRel);
        self.shards[cold].clear();

        snapshot
    }

    /// Swaps the hot and cold shards, and waits for in-flight writes to the cold shard to finish.
    ///
    /// Returns the index of the cold shard.  Must be called with the reader lock held.
    fn flip(&self) -> usize {
        let n = self.started_and_hot.fetch_add(HOT_INDEX_BIT, Ordering::AcqRel);
        let started = n & STARTED_MASK;
        let cold = hot_index(n);

        let backoff = Backoff::new();
        while self.completed[cold].load(Ordering::Acquire) != started {
            backoff.snooze();
        }

        cold
    }
}

fn hot_index(n: u64) -> usize {
    (n >> 63) as usize
}
