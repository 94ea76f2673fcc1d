//! Fixed-capacity ring of reusable hardware buffers
//!
//! Every slot is either *available* (free for writing) or *pending*
//! (submitted, awaiting completion). Slots leave the pending state in the
//! exact order they entered it, mirroring the hardware's in-order completion.
//!
//! The queue holds no lock: callers serialize access from one submission
//! thread.

/// Opaque reference to a slot owned by a [`BufferQueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

/// Ring queue over a fixed set of pre-allocated slots
pub struct BufferQueue<T> {
    slots: Vec<T>,
    available_idx: usize,
    pending_idx: usize,
    pending_count: usize,
}

impl<T> BufferQueue<T> {
    /// Bind the queue to `slots`; capacity is `slots.len()` and never changes
    pub fn new(slots: Vec<T>) -> Self {
        BufferQueue {
            slots,
            available_idx: 0,
            pending_idx: 0,
            pending_count: 0,
        }
    }

    /// Rebind to a new set of slots and reset all indices
    ///
    /// Returns the previously bound slots so the caller decides when their
    /// hardware resources are released.
    pub fn initialize(&mut self, slots: Vec<T>) -> Vec<T> {
        self.available_idx = 0;
        self.pending_idx = 0;
        self.pending_count = 0;
        std::mem::replace(&mut self.slots, slots)
    }

    /// Hand out the next free slot, moving it to pending
    ///
    /// Returns `None` when every slot is already pending.
    pub fn acquire_available(&mut self) -> Option<SlotId> {
        if self.pending_count == self.slots.len() {
            return None;
        }

        let id = SlotId(self.available_idx);
        self.available_idx = (self.available_idx + 1) % self.slots.len();
        self.pending_count += 1;
        Some(id)
    }

    /// Take back the oldest pending slot
    ///
    /// Returns `None` when nothing is pending.
    pub fn reclaim_pending(&mut self) -> Option<SlotId> {
        if self.pending_count == 0 {
            return None;
        }

        let id = SlotId(self.pending_idx);
        self.pending_idx = (self.pending_idx + 1) % self.slots.len();
        self.pending_count -= 1;
        Some(id)
    }

    /// # Panics
    /// Panics if `id` was not handed out by this queue.
    pub fn get(&self, id: SlotId) -> &T {
        &self.slots[id.0]
    }

    /// # Panics
    /// Panics if `id` was not handed out by this queue.
    pub fn get_mut(&mut self, id: SlotId) -> &mut T {
        &mut self.slots[id.0]
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_count
    }

    pub fn available_count(&self) -> usize {
        self.slots.len() - self.pending_count
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            capacity: self.capacity(),
            pending: self.pending_count,
            available: self.available_count(),
        }
    }

    /// Iterate over every slot regardless of state (setup and teardown only)
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }

    pub fn into_slots(self) -> Vec<T> {
        self.slots
    }
}

impl<T> Default for BufferQueue<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub capacity: usize,
    pub pending: usize,
    pub available: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::VecDeque;

    #[test]
    fn test_acquire_until_exhausted() {
        let mut queue = BufferQueue::new(vec!['a', 'b', 'c']);

        let first = queue.acquire_available().unwrap();
        let second = queue.acquire_available().unwrap();
        let third = queue.acquire_available().unwrap();
        assert_eq!(*queue.get(first), 'a');
        assert_eq!(*queue.get(second), 'b');
        assert_eq!(*queue.get(third), 'c');

        assert!(queue.acquire_available().is_none(), "Queue should be exhausted");
        assert_eq!(queue.pending_count(), 3);
    }

    #[test]
    fn test_reclaim_empty() {
        let mut queue = BufferQueue::new(vec![0u32; 2]);
        assert!(queue.reclaim_pending().is_none());

        let id = queue.acquire_available().unwrap();
        assert_eq!(queue.reclaim_pending(), Some(id));
        assert!(queue.reclaim_pending().is_none());
    }

    #[test]
    fn test_zero_capacity() {
        let mut queue: BufferQueue<u8> = BufferQueue::default();
        assert!(queue.acquire_available().is_none());
        assert!(queue.reclaim_pending().is_none());
    }

    #[test]
    fn test_wraparound_keeps_fifo() {
        let mut queue = BufferQueue::new(vec![0, 1, 2, 3]);

        for _ in 0..4 {
            queue.acquire_available().unwrap();
        }
        // Steady state: reclaim oldest, acquire again
        for expected in 0..10 {
            let reclaimed = queue.reclaim_pending().unwrap();
            assert_eq!(*queue.get(reclaimed), expected % 4);
            let acquired = queue.acquire_available().unwrap();
            assert_eq!(acquired, reclaimed);
            assert_eq!(queue.pending_count(), 4);
        }
    }

    #[test]
    fn test_random_sequence_fifo_and_conservation() {
        let mut rng = rand::thread_rng();
        let capacity = 5;
        let mut queue = BufferQueue::new((0..capacity).collect::<Vec<_>>());
        let mut model = VecDeque::new();

        for _ in 0..2000 {
            if rng.gen_bool(0.5) {
                match queue.acquire_available() {
                    Some(id) => model.push_back(id),
                    None => assert_eq!(model.len(), capacity),
                }
            } else {
                assert_eq!(queue.reclaim_pending(), model.pop_front());
            }

            let stats = queue.stats();
            assert_eq!(stats.pending, model.len());
            assert_eq!(stats.available + stats.pending, stats.capacity);
        }
    }

    #[test]
    fn test_initialize_returns_previous_slots() {
        let mut queue = BufferQueue::new(vec![1, 2]);
        queue.acquire_available();

        let old = queue.initialize(vec![7, 8, 9]);
        assert_eq!(old, vec![1, 2]);
        assert_eq!(queue.capacity(), 3);
        assert_eq!(queue.pending_count(), 0);
        let id = queue.acquire_available().unwrap();
        assert_eq!(*queue.get(id), 7);
    }
}
