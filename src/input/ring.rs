//! A lock-free single-producer/single-consumer circular buffer: two
//! cursors, full when advancing `next_in` would make it coincide with
//! `next_out`, so real capacity is `length - 1`.
//!
//! `Release` on the store that publishes a cursor advance, `Acquire` on
//! the load that observes the peer's cursor, so the payload write/read is
//! always fully ordered with respect to the slot becoming visible.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::event::InputEvent;

pub struct RingBuffer {
    buf: Box<[UnsafeCell<MaybeUninit<InputEvent>>]>,
    capacity: usize,
    next_in: AtomicUsize,
    next_out: AtomicUsize,
}

// SAFETY: `push` is only ever called by the single producer and `pop` only
// by the single consumer; the atomics below establish happens-before
// edges between a slot write and the matching read.
unsafe impl Sync for RingBuffer {}
unsafe impl Send for RingBuffer {}

impl RingBuffer {
    /// `capacity` is the array length, not the usable capacity (which is
    /// `capacity - 1`); must be at least 2.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity >= 2,
            "ring buffer capacity must be >= 2 (usable capacity is capacity - 1)"
        );
        let buf = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        RingBuffer {
            buf,
            capacity,
            next_in: AtomicUsize::new(0),
            next_out: AtomicUsize::new(0),
        }
    }

    pub fn usable_capacity(&self) -> usize {
        self.capacity - 1
    }

    /// Producer side. Never overwrites: returns `false` (and leaves the
    /// event to the caller to log-and-drop) if the ring is full.
    pub fn push(&self, event: InputEvent) -> bool {
        let tail = self.next_in.load(Ordering::Relaxed);
        let next_tail = (tail + 1) % self.capacity;
        if next_tail == self.next_out.load(Ordering::Acquire) {
            return false;
        }
        unsafe {
            (*self.buf[tail].get()).write(event);
        }
        self.next_in.store(next_tail, Ordering::Release);
        true
    }

    /// Consumer side. Returns `None` if the ring is empty.
    pub fn pop(&self) -> Option<InputEvent> {
        let head = self.next_out.load(Ordering::Relaxed);
        if head == self.next_in.load(Ordering::Acquire) {
            return None;
        }
        let event = unsafe { (*self.buf[head].get()).assume_init_read() };
        let next_head = (head + 1) % self.capacity;
        self.next_out.store(next_head, Ordering::Release);
        Some(event)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.next_in.load(Ordering::Acquire) == self.next_out.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::event::{KeyboardDetail, KeyboardRecord};

    fn ev(key: u32) -> InputEvent {
        InputEvent::Keyboard {
            detail: KeyboardDetail::KeyDown,
            timestamp: key as u64,
            record: KeyboardRecord { key },
        }
    }

    #[test]
    fn empty_pop_returns_none() {
        let ring = RingBuffer::new(4);
        assert!(ring.pop().is_none());
    }

    #[test]
    fn push_then_pop_preserves_order() {
        let ring = RingBuffer::new(4);
        assert!(ring.push(ev(1)));
        assert!(ring.push(ev(2)));
        assert_eq!(ring.pop().unwrap().timestamp(), 1);
        assert_eq!(ring.pop().unwrap().timestamp(), 2);
        assert!(ring.pop().is_none());
    }

    #[test]
    fn capacity_is_length_minus_one() {
        let ring = RingBuffer::new(4);
        assert_eq!(ring.usable_capacity(), 3);
        assert!(ring.push(ev(1)));
        assert!(ring.push(ev(2)));
        assert!(ring.push(ev(3)));
        assert!(!ring.push(ev(4)), "4th push into a 3-usable-slot ring must be dropped");
    }

    #[test]
    fn resumes_accepting_after_consumer_advances() {
        let ring = RingBuffer::new(4);
        for i in 1..=3 {
            assert!(ring.push(ev(i)));
        }
        assert!(!ring.push(ev(99)));
        assert_eq!(ring.pop().unwrap().timestamp(), 1);
        assert!(ring.push(ev(4)));
    }

    #[test]
    fn spsc_stress_no_loss_no_duplication_no_reorder() {
        use std::sync::Arc;
        use std::thread;

        let ring = Arc::new(RingBuffer::new(64));
        let producer_ring = ring.clone();
        const N: u64 = 20_000;
        let producer = thread::spawn(move || {
            let mut sent = 0u64;
            while sent < N {
                if producer_ring.push(InputEvent::Keyboard {
                    detail: KeyboardDetail::KeyDown,
                    timestamp: sent,
                    record: KeyboardRecord { key: sent as u32 },
                }) {
                    sent += 1;
                } else {
                    thread::yield_now();
                }
            }
        });

        let mut received = Vec::with_capacity(N as usize);
        while (received.len() as u64) < N {
            if let Some(event) = ring.pop() {
                received.push(event.timestamp());
            } else {
                thread::yield_now();
            }
        }
        producer.join().unwrap();

        assert_eq!(received.len(), N as usize);
        assert!(received.windows(2).all(|w| w[1] == w[0] + 1));
    }
}
