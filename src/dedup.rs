//! Event deduplication
//!
//! Remembers event identities for a rolling window of recent blocks.
//! Admission is a single DashMap entry operation, so two workers racing on
//! the same identity cannot both win.
//!
//! Created: 2026-10-19

use crate::types::{EventId, PoolCreatedEvent};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First sighting, process it
    New,
    /// Already seen in this process lifetime
    Duplicate,
    /// Older than the dedup window; identity can no longer be checked
    Stale,
}

#[derive(Debug)]
pub struct DedupSet {
    seen: DashMap<EventId, u64>,
    high_water: AtomicU64,
    window_blocks: u64,
}

impl DedupSet {
    pub fn new(window_blocks: u64) -> Self {
        Self {
            seen: DashMap::new(),
            high_water: AtomicU64::new(0),
            window_blocks,
        }
    }

    pub fn admit(&self, event: &PoolCreatedEvent) -> Admission {
        let block = event.block_number;
        let previous_high = self.high_water.fetch_max(block, Ordering::SeqCst);
        let high = previous_high.max(block);

        if block.saturating_add(self.window_blocks) < high {
            return Admission::Stale;
        }

        let admission = match self.seen.entry(event.id()) {
            Entry::Occupied(_) => Admission::Duplicate,
            Entry::Vacant(slot) => {
                slot.insert(block);
                Admission::New
            }
        };

        if block > previous_high {
            self.evict_below(high);
        }
        admission
    }

    fn evict_below(&self, high: u64) {
        let window = self.window_blocks;
        let before = self.seen.len();
        self.seen.retain(|_, b| b.saturating_add(window) >= high);
        let evicted = before.saturating_sub(self.seen.len());
        if evicted > 0 {
            debug!("Dedup: evicted {} identities below block {}", evicted, high.saturating_sub(window));
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
