//! Bounded working set of pull requests created during a run.
use rand::Rng;
use revload_core::TRACKER_CAPACITY;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
#[allow(unused)]
use tracing::{debug, trace};

/// FIFO set of resource ids shared by every virtual user.
///
/// All operations take the lock for a single synchronous step and never across an `.await`,
/// so an abandoned task cannot leave the set half-updated.
#[derive(Debug)]
pub struct ResourceTracker {
    ids: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::with_capacity(TRACKER_CAPACITY)
    }

    /// NOTE: A capacity of 0 is bumped to 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ids: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    /// Append `id`, evicting the oldest entry once the capacity is exceeded.
    pub fn record(&self, id: impl Into<String>) {
        let mut ids = self.lock();
        ids.push_back(id.into());
        while ids.len() > self.capacity {
            if let Some(evicted) = ids.pop_front() {
                trace!("Evicted {evicted} from tracker.");
            }
        }
    }

    /// Remove the first occurrence of `id`. Absent ids are ignored since concurrent merges race.
    pub fn remove(&self, id: &str) -> bool {
        let mut ids = self.lock();
        if let Some(idx) = ids.iter().position(|x| x == id) {
            ids.remove(idx);
            true
        } else {
            false
        }
    }

    /// A uniformly random tracked id, or `None` when nothing is tracked.
    pub fn sample_random<R: Rng>(&self, rng: &mut R) -> Option<String> {
        let ids = self.lock();
        if ids.is_empty() {
            None
        } else {
            ids.get(rng.gen_range(0..ids.len())).cloned()
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().iter().any(|x| x == id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // NOTE: Every mutation completes before the guard drops, so a poisoned lock still holds a
    // consistent deque.
    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
