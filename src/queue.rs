//! The bounded dispatch queue the acceptor feeds and the worker pool
//! drains: a fixed-size ring buffer guarded by a mutex, with free-slot and
//! filled-slot counts as condvar-backed counting semaphores.
//!
//! The ring buffer's empty/full bookkeeping (a `-1`-encoded "no first
//! element yet" state, wraparound via modulo) mirrors the original
//! program's raw ring buffer; the counting semaphores are intra-process
//! only (no two queue ends are ever in different processes), so they're
//! implemented with `Mutex`+`Condvar` rather than POSIX semaphores, unlike
//! the registry's cross-process lock.

use crate::error::QueueError;
use std::sync::{Condvar, Mutex};

use std::os::unix::io::RawFd;

/// One unit of work: a client connection plus the request read off it.
/// `None` request data marks the graceful-shutdown stop sentinel.
pub struct DispatchItem {
    pub client_fd: RawFd,
    pub request_type: u8,
    pub request_data: Option<Vec<u8>>,
}

impl DispatchItem {
    pub fn stop_sentinel() -> Self {
        DispatchItem {
            client_fd: -1,
            request_type: crate::protocol::MSG_STOP,
            request_data: None,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.request_type == crate::protocol::MSG_STOP
    }
}

struct CountingSemaphore {
    count: Mutex<usize>,
    available: Condvar,
}

impl CountingSemaphore {
    fn new(initial: usize) -> Self {
        CountingSemaphore {
            count: Mutex::new(initial),
            available: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            count = self.available.wait(count).unwrap();
        }
        *count -= 1;
    }

    fn post(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.available.notify_one();
    }
}

struct RingBuffer {
    slots: Vec<Option<DispatchItem>>,
    first: isize,
    last: isize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        RingBuffer {
            slots,
            first: -1,
            last: -1,
        }
    }

    fn is_empty(&self) -> bool {
        self.first == -1
    }

    fn is_full(&self) -> bool {
        (self.first + 1) % self.slots.len() as isize == self.last
    }

    fn enqueue(&mut self, item: DispatchItem) {
        debug_assert!(!self.is_full());
        self.first = (self.first + 1) % self.slots.len() as isize;
        self.slots[self.first as usize] = Some(item);
        if self.last == -1 {
            self.last = 0;
        }
    }

    fn dequeue(&mut self) -> DispatchItem {
        debug_assert!(!self.is_empty());
        let item = self.slots[self.last as usize].take().expect("slot was occupied");
        if self.last == self.first {
            self.last = -1;
            self.first = -1;
        } else {
            self.last = (self.last + 1) % self.slots.len() as isize;
        }
        item
    }
}

/// A bounded multi-producer multi-consumer dispatch queue.
pub struct DispatchQueue {
    buffer: Mutex<RingBuffer>,
    free_slots: CountingSemaphore,
    filled_slots: CountingSemaphore,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Self {
        DispatchQueue {
            buffer: Mutex::new(RingBuffer::new(capacity)),
            free_slots: CountingSemaphore::new(capacity),
            filled_slots: CountingSemaphore::new(0),
        }
    }

    /// Blocks until there is room, then enqueues `item`.
    pub fn put(&self, item: DispatchItem) -> Result<(), QueueError> {
        self.free_slots.wait();
        {
            let mut buffer = self.buffer.lock().map_err(|_| QueueError::Poisoned)?;
            buffer.enqueue(item);
        }
        self.filled_slots.post();
        Ok(())
    }

    /// Blocks until an item is available, then dequeues it.
    pub fn get(&self) -> Result<DispatchItem, QueueError> {
        self.filled_slots.wait();
        let item = {
            let mut buffer = self.buffer.lock().map_err(|_| QueueError::Poisoned)?;
            buffer.dequeue()
        };
        self.free_slots.post();
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn preserves_fifo_order() {
        let queue = DispatchQueue::new(4);
        for i in 0..4u8 {
            queue
                .put(DispatchItem {
                    client_fd: i as RawFd,
                    request_type: b'Q',
                    request_data: None,
                })
                .unwrap();
        }
        for i in 0..4 {
            let item = queue.get().unwrap();
            assert_eq!(item.client_fd, i as RawFd);
        }
    }

    #[test]
    fn blocks_a_producer_until_a_consumer_frees_a_slot() {
        let queue = Arc::new(DispatchQueue::new(1));
        queue
            .put(DispatchItem {
                client_fd: 0,
                request_type: b'Q',
                request_data: None,
            })
            .unwrap();

        let queue2 = Arc::clone(&queue);
        let producer = thread::spawn(move || {
            queue2
                .put(DispatchItem {
                    client_fd: 1,
                    request_type: b'Q',
                    request_data: None,
                })
                .unwrap();
        });

        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!producer.is_finished());

        let first = queue.get().unwrap();
        assert_eq!(first.client_fd, 0);
        producer.join().unwrap();

        let second = queue.get().unwrap();
        assert_eq!(second.client_fd, 1);
    }

    #[test]
    fn stop_sentinel_is_recognized() {
        let sentinel = DispatchItem::stop_sentinel();
        assert!(sentinel.is_stop());
    }
}
