//! The id allocator: a monotonic, process-lifetime build-id generator
//! seeded from the durable store's maximum existing id.

use std::sync::atomic::{AtomicU64, Ordering};

pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// Seed from the store's maximum existing id (across `queued/` and
    /// `result/`), or start at `1` if the store is empty.
    pub fn seeded_from(max_existing_id: Option<u64>) -> Self {
        let next = max_existing_id.map_or(1, |id| id + 1);
        Self {
            next: AtomicU64::new(next),
        }
    }

    /// Atomically allocate the next id.
    pub fn allocate(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_when_store_is_empty() {
        let allocator = IdAllocator::seeded_from(None);
        assert_eq!(allocator.allocate(), 1);
        assert_eq!(allocator.allocate(), 2);
    }

    #[test]
    fn resumes_after_max_existing_id() {
        let allocator = IdAllocator::seeded_from(Some(7));
        assert_eq!(allocator.allocate(), 8);
        assert_eq!(allocator.allocate(), 9);
    }

    #[test]
    fn allocations_are_unique_under_concurrency() {
        use std::collections::HashSet;
        use std::sync::Arc;
        use std::thread;

        let allocator = Arc::new(IdAllocator::seeded_from(None));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let allocator = allocator.clone();
            handles.push(thread::spawn(move || {
                (0..50).map(|_| allocator.allocate()).collect::<Vec<_>>()
            }));
        }

        let mut all_ids = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("thread") {
                assert!(all_ids.insert(id), "id {id} allocated twice");
            }
        }
        assert_eq!(all_ids.len(), 8 * 50);
    }
}
