//! FIFO event queue shared between a machine and its producers.

use crate::core::{Event, Identifier};
use crate::engine::error::MachineError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Whether the queue accepts events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Gate {
    New,
    Open,
    Closed,
}

struct Shared<E: Identifier> {
    events: VecDeque<Event<E>>,
    gate: Gate,
    capacity: Option<usize>,
}

impl<E: Identifier> Shared<E> {
    fn admit(&mut self, event: Event<E>) -> Result<(), MachineError> {
        match self.gate {
            Gate::New => {
                return Err(MachineError::NotStarted {
                    event: event.kind().name().to_string(),
                })
            }
            Gate::Closed => {
                return Err(MachineError::InstanceStopped {
                    event: event.kind().name().to_string(),
                })
            }
            Gate::Open => {}
        }
        if let Some(capacity) = self.capacity {
            if self.events.len() >= capacity {
                return Err(MachineError::QueueFull { capacity });
            }
        }
        trace!(event = event.kind().name(), queued = self.events.len() + 1, "event queued");
        self.events.push_back(event);
        Ok(())
    }
}

/// Consumer side of the queue, owned by the machine.
///
/// The lock is only held for queue bookkeeping, never while guards or
/// actions run.
pub(crate) struct EventQueue<E: Identifier> {
    shared: Arc<Mutex<Shared<E>>>,
}

impl<E: Identifier> EventQueue<E> {
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                events: VecDeque::new(),
                gate: Gate::New,
                capacity,
            })),
        }
    }

    pub(crate) fn sender(&self) -> EventSender<E> {
        EventSender {
            shared: Arc::clone(&self.shared),
        }
    }

    pub(crate) fn push(&self, event: Event<E>) -> Result<(), MachineError> {
        self.shared.lock().admit(event)
    }

    /// Append events raised by a committed step. Raised events bypass the
    /// capacity limit so a committed step never loses its follow-ups.
    pub(crate) fn push_raised(&self, raised: Vec<Event<E>>) {
        if raised.is_empty() {
            return;
        }
        let mut shared = self.shared.lock();
        if shared.gate != Gate::Open {
            trace!(count = raised.len(), "raised events discarded, queue closed");
            return;
        }
        trace!(count = raised.len(), "raised events queued");
        shared.events.extend(raised);
    }

    pub(crate) fn pop(&self) -> Option<Event<E>> {
        self.shared.lock().events.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.shared.lock().events.len()
    }

    pub(crate) fn open(&self) {
        self.shared.lock().gate = Gate::Open;
    }

    /// Close the queue for good and return whatever was still queued.
    pub(crate) fn close(&self) -> Vec<Event<E>> {
        let mut shared = self.shared.lock();
        shared.gate = Gate::Closed;
        shared.events.drain(..).collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<Event<E>> {
        self.shared.lock().events.iter().cloned().collect()
    }

    /// Put events back in front of the queue, used when restoring.
    pub(crate) fn refill(&self, events: Vec<Event<E>>) {
        let mut shared = self.shared.lock();
        for event in events.into_iter().rev() {
            shared.events.push_front(event);
        }
    }
}

/// Producer handle for a machine's queue.
///
/// Cheap to clone and safe to move to other threads. Events sent here are
/// processed by the machine on its next `run_pending`, `step` or `submit`.
pub struct EventSender<E: Identifier> {
    shared: Arc<Mutex<Shared<E>>>,
}

impl<E: Identifier> EventSender<E> {
    /// Enqueue an event.
    ///
    /// Fails with `NotStarted` before the machine starts, with
    /// `InstanceStopped` once it stops, and with `QueueFull` when the
    /// configured capacity is reached.
    pub fn send(&self, event: impl Into<Event<E>>) -> Result<(), MachineError> {
        self.shared.lock().admit(event.into())
    }

    /// Whether the machine has stopped accepting events.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().gate == Gate::Closed
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().events.len()
    }
}

impl<E: Identifier> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ev(kind: &str) -> Event<String> {
        Event::new(kind.to_string())
    }

    #[test]
    fn queue_rejects_before_open() {
        let queue = EventQueue::new(None);
        assert!(matches!(
            queue.push(ev("a")),
            Err(MachineError::NotStarted { ref event }) if event == "a"
        ));
    }

    #[test]
    fn queue_is_fifo() {
        let queue = EventQueue::new(None);
        queue.open();
        for kind in ["a", "b", "c"] {
            queue.push(ev(kind)).unwrap();
        }

        let order: Vec<String> = std::iter::from_fn(|| queue.pop())
            .map(|e| e.kind().clone())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn capacity_is_enforced_for_producers_only() {
        let queue = EventQueue::new(Some(1));
        queue.open();
        queue.push(ev("a")).unwrap();

        assert!(matches!(
            queue.push(ev("b")),
            Err(MachineError::QueueFull { capacity: 1 })
        ));

        queue.push_raised(vec![ev("raised")]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn close_discards_and_rejects() {
        let queue = EventQueue::new(None);
        queue.open();
        queue.push(ev("a")).unwrap();
        let sender = queue.sender();

        let discarded = queue.close();
        assert_eq!(discarded.len(), 1);
        assert!(sender.is_closed());
        assert!(matches!(
            sender.send(ev("b")),
            Err(MachineError::InstanceStopped { .. })
        ));
        queue.push_raised(vec![ev("late")]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn refill_goes_to_the_front() {
        let queue = EventQueue::new(None);
        queue.open();
        queue.push(ev("later")).unwrap();
        queue.refill(vec![ev("first"), ev("second")]);

        let order: Vec<String> = queue.snapshot().iter().map(|e| e.kind().clone()).collect();
        assert_eq!(order, vec!["first", "second", "later"]);
    }

    #[test]
    fn senders_work_across_threads() {
        let queue = EventQueue::new(None);
        queue.open();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let sender = queue.sender();
                thread::spawn(move || {
                    for j in 0..25 {
                        sender.send(ev(&format!("{i}-{j}"))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 100);
    }
}
