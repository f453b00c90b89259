//! The signal queue: the only state shared between the guest thread and the
//! host input thread.
//!
//! Entries are serialised wire records (see `core_bus::wire`). The input
//! thread pushes and notifies; the guest thread polls from its pullSignal
//! loop and parks here between polls. Capacity is bounded; a record arriving
//! at a full queue is dropped with a warning rather than blocking the input
//! thread.

use core_bus::{serialize_record, Value};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Instant;

pub const DEFAULT_CAPACITY: usize = 256;

/// A named tuple of scalar values, the unit of host→guest input.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub name: String,
    pub args: Vec<Value>,
}

impl Signal {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self { name: name.into(), args }
    }

    /// The wire record: name first, then the arguments.
    pub fn to_record(&self) -> Vec<u8> {
        let mut values = Vec::with_capacity(self.args.len() + 1);
        values.push(Value::str(self.name.as_bytes()));
        values.extend(self.args.iter().cloned());
        serialize_record(&values)
    }
}

struct QueueState {
    records: VecDeque<Vec<u8>>,
    terminated: bool,
}

/// Why a wait on the queue returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Ready,
    Deadline,
    Terminated,
}

pub struct SignalQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    capacity: usize,
}

impl SignalQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                records: VecDeque::new(),
                terminated: false,
            }),
            ready: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue a pre-serialised record and wake any parked puller.
    /// Returns false when the record was dropped (full or terminated queue).
    pub fn push_record(&self, record: Vec<u8>) -> bool {
        let mut state = self.state.lock().expect("signal queue poisoned");
        if state.terminated {
            return false;
        }
        if state.records.len() >= self.capacity {
            tracing::warn!(
                target: "machine.signal",
                capacity = self.capacity,
                record_len = record.len(),
                "signal queue full, dropping record"
            );
            return false;
        }
        state.records.push_back(record);
        drop(state);
        self.ready.notify_all();
        true
    }

    pub fn push(&self, signal: &Signal) -> bool {
        tracing::debug!(
            target: "machine.signal",
            name = signal.name.as_str(),
            args = signal.args.len(),
            "push"
        );
        self.push_record(signal.to_record())
    }

    /// Pop the front record without blocking.
    pub fn try_pop(&self) -> Option<Vec<u8>> {
        self.state
            .lock()
            .expect("signal queue poisoned")
            .records
            .pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.state
            .lock()
            .expect("signal queue poisoned")
            .records
            .is_empty()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().expect("signal queue poisoned").terminated
    }

    /// Mark the computer as shutting down and wake every waiter. Pending
    /// records stay poppable; new pushes are refused.
    pub fn terminate(&self) {
        let mut state = self.state.lock().expect("signal queue poisoned");
        state.terminated = true;
        drop(state);
        self.ready.notify_all();
    }

    /// Park the calling thread until a record is available, the deadline
    /// passes, or the queue is terminated. `None` blocks indefinitely.
    /// Spurious wakeups are absorbed here; callers re-poll regardless.
    pub fn wait(&self, deadline: Option<Instant>) -> Wake {
        let mut state = self.state.lock().expect("signal queue poisoned");
        loop {
            if !state.records.is_empty() {
                return Wake::Ready;
            }
            if state.terminated {
                return Wake::Terminated;
            }
            match deadline {
                None => {
                    state = self.ready.wait(state).expect("signal queue poisoned");
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Wake::Deadline;
                    }
                    let (next, _timeout) = self
                        .ready
                        .wait_timeout(state, deadline - now)
                        .expect("signal queue poisoned");
                    state = next;
                }
            }
        }
    }
}
