//! Lock-free work queue for distributing rows across parallel workers

use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free work queue handing each item to exactly one worker.
///
/// Workers call [`next()`](WorkQueue::next) to atomically claim the next item.
/// Items a worker never claims (e.g. after shutdown) stay pending for the next run.
pub struct WorkQueue<S> {
    items: Vec<S>,
    cursor: AtomicUsize,
}

impl<S> WorkQueue<S> {
    pub fn new(items: Vec<S>) -> Self {
        log::debug!("{} items in work queue", items.len());
        Self {
            items,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next item (lock-free), or `None` when drained
    pub fn next(&self) -> Option<&S> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.items.get(i)
    }

    /// Total items in queue
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[test]
    fn hands_out_in_order() {
        let q = WorkQueue::new(vec![1, 2, 3]);
        assert_eq!(q.total(), 3);
        assert_eq!(q.next(), Some(&1));
        assert_eq!(q.next(), Some(&2));
        assert_eq!(q.next(), Some(&3));
        assert_eq!(q.next(), None);
    }

    #[test]
    fn empty_queue() {
        let q: WorkQueue<i32> = WorkQueue::new(vec![]);
        assert!(q.is_empty());
        assert_eq!(q.next(), None);
    }

    #[test]
    fn each_item_claimed_once_across_threads() {
        let q = WorkQueue::new((0..500).collect::<Vec<_>>());
        let seen = Mutex::new(HashSet::new());
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    while let Some(i) = q.next() {
                        assert!(seen.lock().unwrap().insert(*i), "{i} claimed twice");
                    }
                });
            }
        });
        assert_eq!(seen.into_inner().unwrap().len(), 500);
    }
}
