//! Microtask scheduler
//!
//! A single unbounded FIFO queue. The interpreter drains it after the
//! synchronous entry point returns; each job runs to completion before the
//! next one starts, and jobs scheduled while draining run in the same drain
//! after everything queued before them.

use super::promise::{Reaction, Settled};
use super::value::Value;
use std::collections::VecDeque;

/// A queued unit of work
#[derive(Debug)]
pub enum Microtask {
    /// Promise reaction fired by a settlement
    Reaction {
        /// The reaction
        reaction: Reaction,
        /// Outcome of the promise it waited on
        outcome: Settled,
    },
    /// `queueMicrotask(callback)`
    Callback(Value),
}

/// Counters of one scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Jobs ever scheduled
    pub scheduled: u64,
    /// Jobs taken for execution
    pub executed: u64,
    /// Longest queue length observed
    pub peak_len: usize,
}

/// FIFO microtask queue
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<Microtask>,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job
    pub fn schedule(&mut self, task: Microtask) {
        self.queue.push_back(task);
        self.stats.scheduled += 1;
        self.stats.peak_len = self.stats.peak_len.max(self.queue.len());
    }

    /// Take the oldest job
    pub fn next_task(&mut self) -> Option<Microtask> {
        let task = self.queue.pop_front()?;
        self.stats.executed += 1;
        Some(task)
    }

    /// Jobs waiting
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no job is waiting
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Counters so far
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(task: &Microtask) -> f64 {
        match task {
            Microtask::Callback(Value::Number(n)) => *n,
            _ => -1.0,
        }
    }

    #[test]
    fn test_jobs_run_in_scheduling_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Microtask::Callback(Value::Number(1.0)));
        scheduler.schedule(Microtask::Callback(Value::Number(2.0)));
        let first = scheduler.next_task().unwrap();
        // scheduled while draining: runs after the already queued job
        scheduler.schedule(Microtask::Callback(Value::Number(3.0)));
        let rest: Vec<f64> = std::iter::from_fn(|| scheduler.next_task())
            .map(|t| tag(&t))
            .collect();
        assert_eq!(tag(&first), 1.0);
        assert_eq!(rest, vec![2.0, 3.0]);
        assert_eq!(scheduler.stats().executed, 3);
        assert_eq!(scheduler.stats().peak_len, 2);
    }
}
