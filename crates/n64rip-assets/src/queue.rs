//! Work queue with `(kind, offset)` dedup.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::{AssetDescriptor, AssetKind};

/// FIFO of pending descriptors.
///
/// A descriptor is accepted once per `(kind, offset)` for the whole run,
/// even after it has been popped, so shared sub-assets are parsed once.
#[derive(Debug, Default)]
pub struct WorkQueue {
    pending: VecDeque<AssetDescriptor>,
    seen: FxHashSet<(AssetKind, u32)>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a descriptor. Returns `false` if the asset was already seen.
    pub fn submit(&mut self, descriptor: AssetDescriptor) -> bool {
        if !self.seen.insert(descriptor.key()) {
            trace!(
                kind = %descriptor.kind,
                offset = format_args!("{:#x}", descriptor.offset),
                "duplicate descriptor dropped"
            );
            return false;
        }
        debug!(
            kind = %descriptor.kind,
            symbol = %descriptor.symbol,
            offset = format_args!("{:#x}", descriptor.offset),
            "queued asset"
        );
        self.pending.push_back(descriptor);
        true
    }

    /// Pop the oldest pending descriptor.
    pub fn next(&mut self) -> Option<AssetDescriptor> {
        self.pending.pop_front()
    }

    /// Pop the oldest descriptor for which `ready` holds.
    ///
    /// Descriptors that are not ready are moved to the back in order. If no
    /// pending descriptor is ready the oldest is returned anyway, so the
    /// queue always drains.
    pub fn next_ready<F>(&mut self, mut ready: F) -> Option<AssetDescriptor>
    where
        F: FnMut(&AssetDescriptor) -> bool,
    {
        for _ in 0..self.pending.len() {
            let head = self.pending.pop_front()?;
            if ready(&head) {
                return Some(head);
            }
            trace!(symbol = %head.symbol, "deferring asset until its segments are declared");
            self.pending.push_back(head);
        }
        self.pending.pop_front()
    }

    /// Mark `(kind, offset)` as seen without queueing anything.
    ///
    /// Used once a descriptor queued under a segmented address resolves to
    /// its absolute offset. Returns `false` if that asset was already seen.
    pub fn claim(&mut self, kind: AssetKind, offset: u32) -> bool {
        self.seen.insert((kind, offset))
    }

    pub fn contains(&self, kind: AssetKind, offset: u32) -> bool {
        self.seen.contains(&(kind, offset))
    }

    /// Number of pending descriptors.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of distinct descriptors ever accepted.
    pub fn submitted(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vtx(offset: u32) -> AssetDescriptor {
        AssetDescriptor::new(AssetKind::Vertex, offset, format!("vtx_{offset:X}"))
    }

    #[test]
    fn test_dedup() {
        let mut queue = WorkQueue::new();
        assert!(queue.submit(vtx(0x10)));
        assert!(!queue.submit(vtx(0x10)));
        assert_eq!(queue.len(), 1);

        // still a duplicate after being popped
        queue.next();
        assert!(!queue.submit(vtx(0x10)));
        assert!(queue.is_empty());
        assert_eq!(queue.submitted(), 1);
    }

    #[test]
    fn test_claim() {
        let mut queue = WorkQueue::new();
        assert!(queue.submit(vtx(0x10)));
        assert!(!queue.claim(AssetKind::Vertex, 0x10));
        assert!(queue.claim(AssetKind::Vertex, 0x20));
        assert!(!queue.submit(vtx(0x20)));
        assert!(queue.claim(AssetKind::Blob, 0x20));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = WorkQueue::new();
        for offset in [0x30, 0x10, 0x20] {
            queue.submit(vtx(offset));
        }
        let order: Vec<u32> = std::iter::from_fn(|| queue.next()).map(|d| d.offset).collect();
        assert_eq!(order, vec![0x30, 0x10, 0x20]);
    }

    #[test]
    fn test_next_ready_rotates_and_falls_back() {
        let mut queue = WorkQueue::new();
        for offset in [1, 2, 3] {
            queue.submit(vtx(offset));
        }

        let first = queue.next_ready(|d| d.offset != 1).unwrap();
        assert_eq!(first.offset, 2);

        // nothing ready: the oldest pending one comes out
        let second = queue.next_ready(|_| false).unwrap();
        assert_eq!(second.offset, 3);
        assert_eq!(queue.next_ready(|_| false).unwrap().offset, 1);
        assert!(queue.next_ready(|_| true).is_none());
    }
}
