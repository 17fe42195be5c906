//! Bounded blocking connection queue
//!
//! A fixed-capacity ring buffer guarded by one mutex and two condition
//! variables. One acceptor pushes, many workers pop. Shutdown is one-way:
//! producers stop being accepted immediately, consumers keep draining what is
//! already buffered and only then see [`QueueError::Shutdown`].

use crate::error::{EnqueueError, QueueError};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Ring buffer state, only ever touched with the lock held
struct Ring<T> {
    slots: Box<[Option<T>]>,
    read: usize,
    write: usize,
    len: usize,
    shutdown: bool,
}

impl<T> Ring<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    fn push(&mut self, item: T) {
        debug_assert!(!self.is_full());
        self.slots[self.write] = Some(item);
        self.write = (self.write + 1) % self.capacity();
        self.len += 1;
        self.check_cursors();
    }

    fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.read].take();
        self.read = (self.read + 1) % self.capacity();
        self.len -= 1;
        self.check_cursors();
        item
    }

    fn check_cursors(&self) {
        let cap = self.capacity();
        debug_assert!(self.len <= cap);
        debug_assert_eq!((self.write + cap - self.read) % cap, self.len % cap);
    }
}

/// Fixed-capacity FIFO of accepted connections
///
/// # Examples
/// ```
/// use fileserve::http::ConnectionQueue;
///
/// let queue = ConnectionQueue::new(2).unwrap();
/// queue.enqueue(1).unwrap();
/// queue.enqueue(2).unwrap();
/// queue.shutdown().unwrap();
///
/// assert_eq!(queue.dequeue(), Ok(1));
/// assert_eq!(queue.dequeue(), Ok(2));
/// assert!(queue.dequeue().unwrap_err().is_shutdown());
/// ```
pub struct ConnectionQueue<T> {
    ring: Mutex<Ring<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> ConnectionQueue<T> {
    /// Create a queue holding at most `capacity` connections
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        let slots = (0..capacity).map(|_| None).collect::<Vec<_>>();

        Ok(Self {
            ring: Mutex::new(Ring {
                slots: slots.into_boxed_slice(),
                read: 0,
                write: 0,
                len: 0,
                shutdown: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ring<T>>, QueueError> {
        self.ring.lock().map_err(poisoned)
    }

    /// Add a connection, blocking while the queue is full
    ///
    /// Fails once the queue is shut down. The connection is then handed back
    /// inside the error so the caller can close it.
    pub fn enqueue(&self, item: T) -> Result<(), EnqueueError<T>> {
        let mut ring = match self.lock() {
            Ok(ring) => ring,
            Err(kind) => return Err(EnqueueError::new(item, kind)),
        };

        while ring.is_full() && !ring.shutdown {
            ring = match self.not_full.wait(ring) {
                Ok(ring) => ring,
                Err(e) => return Err(EnqueueError::new(item, poisoned(e))),
            };
        }

        if ring.shutdown {
            return Err(EnqueueError::new(item, QueueError::Shutdown));
        }

        ring.push(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest connection, blocking while the queue is empty
    ///
    /// After shutdown this keeps returning buffered connections until none
    /// are left, then returns [`QueueError::Shutdown`].
    pub fn dequeue(&self) -> Result<T, QueueError> {
        let mut ring = self.lock()?;

        loop {
            if let Some(item) = ring.pop() {
                self.not_full.notify_one();
                return Ok(item);
            }
            if ring.shutdown {
                return Err(QueueError::Shutdown);
            }
            ring = self.not_empty.wait(ring).map_err(poisoned)?;
        }
    }

    /// Stop accepting connections and wake every blocked caller
    ///
    /// Calling this more than once has no further effect. A poisoned lock is
    /// reported as [`QueueError::Resource`], but the flag is still set and
    /// every waiter is still woken.
    pub fn shutdown(&self) -> Result<(), QueueError> {
        let (mut ring, result) = match self.ring.lock() {
            Ok(ring) => (ring, Ok(())),
            Err(e) => {
                let err = QueueError::Resource(e.to_string());
                (e.into_inner(), Err(err))
            }
        };
        ring.shutdown = true;
        drop(ring);

        self.not_full.notify_all();
        self.not_empty.notify_all();
        result
    }

    /// Number of connections currently buffered
    pub fn len(&self) -> usize {
        self.peek(|ring| ring.len)
    }

    /// Whether no connections are buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the buffer is at capacity
    pub fn is_full(&self) -> bool {
        self.peek(Ring::is_full)
    }

    /// Maximum number of buffered connections
    pub fn capacity(&self) -> usize {
        self.peek(Ring::capacity)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutdown(&self) -> bool {
        self.peek(|ring| ring.shutdown)
    }

    // Observers stay usable on a poisoned lock; the ring is never left
    // half-updated because push/pop cannot panic between field writes.
    fn peek<R>(&self, f: impl FnOnce(&Ring<T>) -> R) -> R {
        let ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        f(&ring)
    }
}

impl<T> std::fmt::Debug for ConnectionQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.peek(|ring| {
            f.debug_struct("ConnectionQueue")
                .field("capacity", &ring.capacity())
                .field("len", &ring.len)
                .field("shutdown", &ring.shutdown)
                .finish()
        })
    }
}

#[cfg(test)]
impl<T: Send + 'static> ConnectionQueue<T> {
    /// Poison the lock the way a panicking holder would
    pub(crate) fn poison(self: &std::sync::Arc<Self>) {
        let queue = std::sync::Arc::clone(self);
        let _ = std::thread::spawn(move || {
            let _ring = queue.ring.lock();
            panic!("poisoning connection queue");
        })
        .join();
    }
}

fn poisoned<G>(err: PoisonError<G>) -> QueueError {
    QueueError::Resource(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    const SETTLE: Duration = Duration::from_millis(100);

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(ConnectionQueue::<u32>::new(0).unwrap_err(), QueueError::ZeroCapacity);
    }

    #[test]
    fn test_fifo_order_and_wraparound() {
        let queue = ConnectionQueue::new(3).unwrap();
        for round in 0..4 {
            for i in 0..3 {
                queue.enqueue(round * 10 + i).unwrap();
            }
            assert!(queue.is_full());
            for i in 0..3 {
                assert_eq!(queue.dequeue(), Ok(round * 10 + i));
            }
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_full_queue_blocks_until_dequeue() {
        let queue = Arc::new(ConnectionQueue::new(2).unwrap());
        queue.enqueue("h1").unwrap();
        queue.enqueue("h2").unwrap();

        let (tx, rx) = mpsc::channel();
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let result = queue.enqueue("h3");
                tx.send(()).unwrap();
                result
            })
        };

        // h3 must still be waiting for room
        assert!(rx.recv_timeout(SETTLE).is_err());
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.dequeue(), Ok("h1"));
        rx.recv_timeout(Duration::from_secs(5)).expect("blocked enqueue never resumed");
        assert!(producer.join().unwrap().is_ok());

        assert_eq!(queue.dequeue(), Ok("h2"));
        assert_eq!(queue.dequeue(), Ok("h3"));
    }

    #[test]
    fn test_full_queue_unblocks_on_shutdown_and_returns_item() {
        let queue = Arc::new(ConnectionQueue::new(1).unwrap());
        queue.enqueue(1).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.enqueue(2))
        };
        thread::sleep(SETTLE);
        queue.shutdown().unwrap();

        let err = producer.join().unwrap().unwrap_err();
        assert!(err.kind().is_shutdown());
        assert_eq!(err.into_inner(), 2);

        // the item buffered before shutdown is still delivered
        assert_eq!(queue.dequeue(), Ok(1));
        assert_eq!(queue.dequeue(), Err(QueueError::Shutdown));
    }

    #[test]
    fn test_empty_queue_after_shutdown_fails_immediately() {
        let queue = ConnectionQueue::<u32>::new(5).unwrap();
        queue.shutdown().unwrap();
        assert_eq!(queue.dequeue(), Err(QueueError::Shutdown));
    }

    #[test]
    fn test_shutdown_drains_buffered_items() {
        let queue = ConnectionQueue::new(5).unwrap();
        queue.enqueue("h1").unwrap();
        queue.enqueue("h2").unwrap();
        queue.shutdown().unwrap();

        assert_eq!(queue.dequeue(), Ok("h1"));
        assert_eq!(queue.dequeue(), Ok("h2"));
        assert_eq!(queue.dequeue(), Err(QueueError::Shutdown));
    }

    #[test]
    fn test_enqueue_after_shutdown_rejected() {
        let queue = ConnectionQueue::new(5).unwrap();
        queue.shutdown().unwrap();
        let err = queue.enqueue(9).unwrap_err();
        assert_eq!(err.kind(), &QueueError::Shutdown);
        assert_eq!(err.into_inner(), 9);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let queue = ConnectionQueue::new(2).unwrap();
        queue.enqueue(1).unwrap();
        queue.shutdown().unwrap();
        queue.shutdown().unwrap();
        assert!(queue.is_shutdown());
        assert_eq!(queue.dequeue(), Ok(1));
        assert_eq!(queue.dequeue(), Err(QueueError::Shutdown));
    }

    #[test]
    fn test_blocked_consumers_wake_on_shutdown() {
        let queue = Arc::new(ConnectionQueue::<u32>::new(4).unwrap());
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.dequeue())
            })
            .collect();

        thread::sleep(SETTLE);
        queue.shutdown().unwrap();

        for consumer in consumers {
            assert_eq!(consumer.join().unwrap(), Err(QueueError::Shutdown));
        }
    }

    #[test]
    fn test_no_double_delivery_with_many_consumers() {
        const ITEMS: usize = 2_000;
        let queue = Arc::new(ConnectionQueue::new(8).unwrap());

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Ok(item) = queue.dequeue() {
                        seen.push(item);
                    }
                    seen
                })
            })
            .collect();

        for i in 0..ITEMS {
            queue.enqueue(i).unwrap();
        }
        queue.shutdown().unwrap();

        let mut all = HashSet::new();
        let mut total = 0;
        for consumer in consumers {
            let seen = consumer.join().unwrap();
            // each consumer observes its share in enqueue order
            assert!(seen.windows(2).all(|w| w[0] < w[1]));
            total += seen.len();
            all.extend(seen);
        }
        assert_eq!(total, ITEMS);
        assert_eq!(all.len(), ITEMS);
    }

    #[test]
    fn test_poisoned_lock_reports_resource_error() {
        let queue = Arc::new(ConnectionQueue::<u32>::new(2).unwrap());
        queue.poison();

        assert!(matches!(queue.dequeue(), Err(QueueError::Resource(_))));
        assert!(matches!(queue.shutdown(), Err(QueueError::Resource(_))));
        let err = queue.enqueue(5).unwrap_err();
        assert!(matches!(err.kind(), QueueError::Resource(_)));
        assert_eq!(err.into_inner(), 5);
        assert_eq!(queue.capacity(), 2);
        assert!(queue.is_shutdown());
    }

    #[test]
    fn test_shutdown_on_poisoned_lock_wakes_blocked_consumer() {
        let queue = Arc::new(ConnectionQueue::<u32>::new(2).unwrap());

        let (tx, rx) = mpsc::channel();
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let _ = tx.send(queue.dequeue());
            })
        };
        thread::sleep(SETTLE);

        queue.poison();
        assert!(matches!(queue.shutdown(), Err(QueueError::Resource(_))));

        let woken = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("consumer still blocked after shutdown");
        assert!(matches!(woken, Err(QueueError::Resource(_)) | Err(QueueError::Shutdown)));
        consumer.join().unwrap();
        assert!(queue.is_shutdown());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Enqueue(u16),
        Dequeue,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![any::<u16>().prop_map(Op::Enqueue), Just(Op::Dequeue)]
    }

    proptest! {
        #[test]
        fn prop_matches_model_fifo(capacity in 1usize..8, ops in prop::collection::vec(op(), 0..64)) {
            let queue = ConnectionQueue::new(capacity).unwrap();
            let mut model = std::collections::VecDeque::new();

            for op in ops {
                match op {
                    // only enqueue when it would not block this single thread
                    Op::Enqueue(v) if model.len() < capacity => {
                        queue.enqueue(v).unwrap();
                        model.push_back(v);
                    }
                    Op::Enqueue(_) => prop_assert!(queue.is_full()),
                    Op::Dequeue if !model.is_empty() => {
                        prop_assert_eq!(queue.dequeue().ok(), model.pop_front());
                    }
                    Op::Dequeue => prop_assert!(queue.is_empty()),
                }
                prop_assert!(queue.len() <= queue.capacity());
                prop_assert_eq!(queue.len(), model.len());
            }

            queue.shutdown().unwrap();
            for expected in model {
                prop_assert_eq!(queue.dequeue(), Ok(expected));
            }
            prop_assert_eq!(queue.dequeue(), Err(QueueError::Shutdown));
        }
    }
}
