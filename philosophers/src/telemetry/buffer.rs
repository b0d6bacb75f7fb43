//! Lock-free multi-producer batching buffer.
//!
//! Producers claim slots in a fixed-capacity segment with a CAS on the claim
//! counter and write without taking any lock. The producer whose claim
//! finds the segment full swaps in a fresh segment under the swap lock and
//! sends the full one to the single consumer as one batch.
//!
//! Three counters coordinate producers and the swap:
//!
//! - `claimed`: slots handed out in the current segment, never above
//!   capacity.
//! - `in_flight`: producers currently inside `push`.
//! - `in_swap`: producers inside the swap path, waiting for or holding the
//!   swap lock.
//!
//! A swap only replaces the segment once `in_swap == in_flight`, i.e. every
//! producer still inside `push` is parked in the swap path and none is
//! writing into a slot. The new segment pointer is published before the
//! claim counter is reset, so a producer whose claim succeeds always sees
//! the segment its slot belongs to.

use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

struct Segment<T> {
    slots: Box<[OnceLock<T>]>,
}

impl<T> Segment<T> {
    fn boxed(capacity: usize) -> Box<Self> {
        Box::new(Self {
            slots: (0..capacity).map(|_| OnceLock::new()).collect(),
        })
    }

    fn into_batch(self: Box<Self>, len: usize) -> Vec<T> {
        self.slots
            .into_vec()
            .into_iter()
            .take(len)
            .filter_map(OnceLock::into_inner)
            .collect()
    }
}

/// Multi-producer, single-consumer batching buffer.
///
/// Every item pushed before [`finish`](Self::finish) returns is delivered to
/// the [`BatchReceiver`] exactly once. Items pushed after `finish` are
/// dropped and counted.
pub struct TelemetryBuffer<T> {
    capacity: usize,
    segment: AtomicPtr<Segment<T>>,
    claimed: AtomicUsize,
    in_flight: AtomicUsize,
    in_swap: AtomicUsize,
    finished: AtomicBool,
    swap: Mutex<Option<UnboundedSender<Vec<T>>>>,
    dropped: AtomicU64,
    _items: PhantomData<T>,
}

// SAFETY: items move from producer threads to the consumer through owned
// batches and are never shared by reference, so `T: Send` is enough for
// both. The raw segment pointer is only dereferenced under the in-flight
// protocol described in the module docs.
unsafe impl<T: Send> Send for TelemetryBuffer<T> {}
// SAFETY: see above.
unsafe impl<T: Send> Sync for TelemetryBuffer<T> {}

impl<T: Send> TelemetryBuffer<T> {
    /// Create a buffer emitting batches of `capacity` items, and the
    /// receiving end of its batches. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> (Arc<Self>, BatchReceiver<T>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let buffer = Arc::new(Self {
            capacity,
            segment: AtomicPtr::new(Box::into_raw(Segment::boxed(capacity))),
            claimed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            in_swap: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            swap: Mutex::new(Some(tx)),
            dropped: AtomicU64::new(0),
            _items: PhantomData,
        });
        (buffer, BatchReceiver { rx })
    }

    /// Items per full batch.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether [`finish`](Self::finish) has been called.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Items rejected because they arrived after `finish`.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Add one item. Returns false if the buffer is finished and the item
    /// was dropped.
    pub fn push(&self, item: T) -> bool {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.finished.load(Ordering::SeqCst) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let slot = loop {
            match self.claim() {
                Some(slot) => break slot,
                None => self.swap_full_segment(),
            }
        };

        // SAFETY: this producer is counted in `in_flight` and not in
        // `in_swap`, so no swap can replace or free the segment until the
        // write below is done. The pointer was loaded after the claim
        // succeeded and therefore names the segment the slot belongs to.
        let segment = unsafe { &*self.segment.load(Ordering::SeqCst) };
        let written = segment.slots[slot].set(item).is_ok();
        debug_assert!(written, "slot {slot} claimed twice");

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        true
    }

    /// Stop accepting items, wait for producers in flight, and publish the
    /// partial segment. Closes the batch channel. Idempotent.
    pub fn finish(&self) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            thread::yield_now();
        }

        let mut sender = self.swap.lock();
        let last = self.segment.swap(ptr::null_mut(), Ordering::SeqCst);
        if !last.is_null() {
            let len = self.claimed.swap(0, Ordering::SeqCst).min(self.capacity);
            // SAFETY: `finished` is set and no producer is in flight, so
            // nothing references the segment any more.
            let batch = unsafe { Box::from_raw(last) }.into_batch(len);
            if !batch.is_empty() {
                Self::publish(sender.as_ref(), batch, &self.dropped);
            }
        }
        sender.take();
    }

    /// Claim the next free slot of the current segment, or `None` when the
    /// segment is full.
    fn claim(&self) -> Option<usize> {
        let mut current = self.claimed.load(Ordering::SeqCst);
        loop {
            if current >= self.capacity {
                return None;
            }
            match self.claimed.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Some(current),
                Err(actual) => current = actual,
            }
        }
    }

    fn swap_full_segment(&self) {
        self.in_swap.fetch_add(1, Ordering::SeqCst);
        {
            let sender = self.swap.lock();
            // Another producer may have swapped while this one waited.
            if self.claimed.load(Ordering::SeqCst) >= self.capacity {
                while self.in_swap.load(Ordering::SeqCst) != self.in_flight.load(Ordering::SeqCst) {
                    thread::yield_now();
                }

                let fresh = Box::into_raw(Segment::boxed(self.capacity));
                let full = self.segment.swap(fresh, Ordering::SeqCst);
                self.claimed.store(0, Ordering::SeqCst);

                // SAFETY: every producer inside `push` is parked in this
                // path, so none holds a reference into the full segment.
                let batch = unsafe { Box::from_raw(full) }.into_batch(self.capacity);
                Self::publish(sender.as_ref(), batch, &self.dropped);
            }
        }
        self.in_swap.fetch_sub(1, Ordering::SeqCst);
    }

    fn publish(sender: Option<&UnboundedSender<Vec<T>>>, batch: Vec<T>, dropped: &AtomicU64) {
        let len = batch.len() as u64;
        let delivered = sender.map(|tx| tx.send(batch).is_ok()).unwrap_or(false);
        if !delivered {
            dropped.fetch_add(len, Ordering::Relaxed);
        }
    }
}

impl<T> Drop for TelemetryBuffer<T> {
    fn drop(&mut self) {
        let segment = *self.segment.get_mut();
        if !segment.is_null() {
            // SAFETY: `&mut self` means no producer can be in flight.
            drop(unsafe { Box::from_raw(segment) });
        }
    }
}

impl<T> fmt::Debug for TelemetryBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryBuffer")
            .field("capacity", &self.capacity)
            .field("claimed", &self.claimed.load(Ordering::Relaxed))
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("finished", &self.finished.load(Ordering::Relaxed))
            .finish()
    }
}

/// Result of one bounded poll of a [`BatchReceiver`].
#[derive(Debug)]
pub enum BatchPoll<T> {
    /// A batch arrived.
    Batch(Vec<T>),
    /// Nothing arrived within the poll timeout.
    Idle,
    /// The buffer finished and every batch has been received.
    Closed,
}

/// Consumer end of a [`TelemetryBuffer`].
#[derive(Debug)]
pub struct BatchReceiver<T> {
    rx: UnboundedReceiver<Vec<T>>,
}

impl<T> BatchReceiver<T> {
    /// Wait at most `timeout` for the next batch.
    pub async fn poll(&mut self, timeout: Duration) -> BatchPoll<T> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(batch)) => BatchPoll::Batch(batch),
            Ok(None) => BatchPoll::Closed,
            Err(_) => BatchPoll::Idle,
        }
    }

    /// Take a batch if one is ready.
    pub fn try_recv(&mut self) -> Option<Vec<T>> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(receiver: &mut BatchReceiver<u64>) -> Vec<Vec<u64>> {
        let mut batches = Vec::new();
        while let Some(batch) = receiver.try_recv() {
            batches.push(batch);
        }
        batches
    }

    #[test]
    fn test_full_segment_is_sent_as_one_batch() {
        let (buffer, mut receiver) = TelemetryBuffer::new(3);
        for i in 0..4 {
            assert!(buffer.push(i));
        }

        let batches = drain(&mut receiver);
        assert_eq!(batches, vec![vec![0, 1, 2]]);

        buffer.finish();
        assert_eq!(drain(&mut receiver), vec![vec![3]]);
    }

    #[test]
    fn test_finish_publishes_partial_and_closes() {
        let (buffer, mut receiver) = TelemetryBuffer::new(10);
        buffer.push(7u64);
        buffer.push(8u64);
        buffer.finish();

        assert_eq!(receiver.try_recv(), Some(vec![7, 8]));
        assert_eq!(receiver.try_recv(), None);
    }

    #[test]
    fn test_finish_with_empty_segment_sends_nothing() {
        let (buffer, mut receiver) = TelemetryBuffer::<u64>::new(2);
        buffer.push(1);
        buffer.push(2);
        buffer.finish();
        assert_eq!(drain(&mut receiver), vec![vec![1, 2]]);
    }

    #[test]
    fn test_push_after_finish_is_dropped() {
        let (buffer, mut receiver) = TelemetryBuffer::<u64>::new(2);
        buffer.finish();
        buffer.finish();
        assert!(!buffer.push(1));
        assert_eq!(buffer.dropped(), 1);
        assert!(drain(&mut receiver).is_empty());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (buffer, mut receiver) = TelemetryBuffer::<u64>::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push(1);
        buffer.push(2);
        buffer.finish();
        assert_eq!(drain(&mut receiver), vec![vec![1], vec![2]]);
    }

    #[tokio::test]
    async fn test_poll_reports_idle_then_closed() {
        let (buffer, mut receiver) = TelemetryBuffer::<u64>::new(4);
        assert!(matches!(receiver.poll(Duration::from_millis(5)).await, BatchPoll::Idle));
        buffer.finish();
        assert!(matches!(receiver.poll(Duration::from_millis(5)).await, BatchPoll::Closed));
    }
}
