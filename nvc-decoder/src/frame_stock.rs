//! Grow-on-demand stock of host frames
//!
//! Decoded pictures are copied into frames taken from the stock. Frames only
//! leave the stock when a caller locks them, and come back through
//! [`FrameStock::give_back`], possibly from another thread.

use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct FrameStock {
    frames: Mutex<Vec<Vec<u8>>>,
    allocated: AtomicUsize,
}

impl FrameStock {
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            allocated: AtomicUsize::new(0),
        }
    }

    /// Lock the stock, making sure it holds at least `count` frames of
    /// `frame_size` bytes
    pub(crate) fn reserve(&self, count: usize, frame_size: usize) -> MutexGuard<'_, Vec<Vec<u8>>> {
        let mut frames = self.frames.lock();
        while frames.len() < count {
            // Not enough frames in stock
            frames.push(vec![0u8; frame_size]);
            self.allocated.fetch_add(1, Ordering::Relaxed);
        }
        frames
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.frames.lock()
    }

    /// Remove the first `count` frames from the stock
    pub(crate) fn take_front(&self, count: usize) -> Vec<Vec<u8>> {
        let mut frames = self.frames.lock();
        let count = count.min(frames.len());
        frames.drain(..count).collect()
    }

    /// Return frames previously handed out by a locking decode
    pub fn give_back<I>(&self, frames: I)
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        self.frames.lock().extend(frames);
    }

    /// Frames currently in stock
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames ever allocated, including ones currently locked by callers
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl Default for FrameStock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FrameStock {
    fn drop(&mut self) {
        let in_stock = self.frames.get_mut().len();
        let allocated = *self.allocated.get_mut();
        if in_stock != allocated {
            log::warn!(
                "{} of {} decoded frames were never unlocked",
                allocated.saturating_sub(in_stock),
                allocated
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_reserve_grows_once() {
        let stock = FrameStock::new();
        drop(stock.reserve(3, 16));
        drop(stock.reserve(2, 16));

        assert_eq!(stock.len(), 3);
        assert_eq!(stock.allocated(), 3);
    }

    #[test]
    fn test_take_and_give_back_across_threads() {
        let stock = Arc::new(FrameStock::new());
        stock.reserve(4, 8)[0][0] = 9;

        let taken = stock.take_front(2);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0][0], 9);
        assert_eq!(stock.len(), 2);

        let remote = Arc::clone(&stock);
        std::thread::spawn(move || remote.give_back(taken))
            .join()
            .unwrap();
        assert_eq!(stock.len(), 4);
        assert_eq!(stock.allocated(), 4);
    }
}
