//! Bounded admission of concurrent load attempts.

use std::collections::VecDeque;
use std::hash::Hash;

/// Default cap on load attempts running at once across all entities.
pub const DEFAULT_MAX_CONCURRENT_LOADS: usize = 64;

/// FIFO admission queue for load attempts.
///
/// `request` either admits the caller right away or queues it. When an
/// admitted load finishes, its slot passes to the oldest queued key, which
/// is then reported by [`LoadQueue::take_granted`].
#[derive(Debug, Clone)]
pub struct LoadQueue<K> {
    max_concurrent: usize,
    active: usize,
    queue: VecDeque<K>,
    granted: Vec<K>,
}

impl<K: Copy + Eq + Hash> LoadQueue<K> {
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            active: 0,
            queue: VecDeque::new(),
            granted: Vec::new(),
        }
    }

    /// Returns true when `key` may start loading now.
    pub fn request(&mut self, key: K) -> bool {
        if self.active < self.max_concurrent {
            self.active += 1;
            return true;
        }
        if !self.queue.contains(&key) {
            self.queue.push_back(key);
        }
        log::debug!("Load queued, {} waiting", self.queue.len());
        false
    }

    /// Releases the slot of a finished load, handing it to the next queued
    /// key when there is one.
    pub fn finished(&mut self) {
        match self.queue.pop_front() {
            Some(next) => self.granted.push(next),
            None => {
                debug_assert!(self.active > 0, "finished() without an active load");
                self.active = self.active.saturating_sub(1);
            }
        }
    }

    /// Forgets a queued or granted-but-not-started key. A granted key gives
    /// its slot back.
    pub fn remove(&mut self, key: K) -> bool {
        if let Some(i) = self.queue.iter().position(|k| *k == key) {
            self.queue.remove(i);
            return true;
        }
        if let Some(i) = self.granted.iter().position(|k| *k == key) {
            self.granted.swap_remove(i);
            self.finished();
            return true;
        }
        false
    }

    /// Keys that were handed a slot since the last call.
    pub fn take_granted(&mut self) -> Vec<K> {
        std::mem::take(&mut self.granted)
    }

    #[must_use]
    pub fn is_queued(&self, key: K) -> bool {
        self.queue.contains(&key)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active
    }

    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

impl<K: Copy + Eq + Hash> Default for LoadQueue<K> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_LOADS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_cap_then_queues() {
        let mut q = LoadQueue::new(2);
        assert!(q.request(1));
        assert!(q.request(2));
        assert!(!q.request(3));
        assert!(!q.request(4));
        assert_eq!(q.active_count(), 2);
        assert_eq!(q.queued_count(), 2);

        q.finished();
        assert_eq!(q.take_granted(), vec![3]);
        assert_eq!(q.active_count(), 2);

        q.finished();
        q.finished();
        assert_eq!(q.take_granted(), vec![4]);
        assert_eq!(q.active_count(), 1);
    }

    #[test]
    fn removing_a_granted_key_releases_its_slot() {
        let mut q = LoadQueue::new(1);
        assert!(q.request(1));
        assert!(!q.request(2));
        q.finished();
        assert!(q.remove(2));
        assert!(q.take_granted().is_empty());
        assert_eq!(q.active_count(), 0);
    }

    #[test]
    fn removing_a_queued_key_skips_it() {
        let mut q = LoadQueue::new(1);
        q.request(1);
        q.request(2);
        q.request(3);
        assert!(q.remove(2));
        q.finished();
        assert_eq!(q.take_granted(), vec![3]);
    }
}
