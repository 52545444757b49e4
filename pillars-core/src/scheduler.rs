//! Tick-driven task scheduling.
//!
//! The host calls [`Scheduler::advance`] once per tick on its main context
//! and dispatches whatever came due. Tasks are plain values (not closures),
//! so the owner can match on them with full `&mut self` access.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque handle for cancelling a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskHandle(u64);

/// Deferred and repeating work, measured in ticks
pub trait Scheduler<T> {
    /// Run `task` once, `delay_ticks` from now
    fn after(&mut self, delay_ticks: u64, task: T) -> TaskHandle;
    /// Run `task` every `interval_ticks`; the first run is one interval from now
    fn every(&mut self, interval_ticks: u64, task: T) -> TaskHandle;
    /// Idempotent; unknown or already-finished handles are ignored
    fn cancel(&mut self, handle: TaskHandle);
    fn is_scheduled(&self, handle: TaskHandle) -> bool;
    /// Move one tick forward and return the tasks due on it
    fn advance(&mut self) -> Vec<(TaskHandle, T)>;
    /// Ticks advanced so far
    fn now(&self) -> u64;
}

#[derive(Debug, Clone)]
struct Entry<T> {
    due: u64,
    repeat: Option<u64>,
    task: T,
}

/// In-process scheduler counting host ticks
#[derive(Debug, Clone)]
pub struct TickScheduler<T> {
    now: u64,
    next_id: u64,
    entries: BTreeMap<u64, Entry<T>>,
}

impl<T> Default for TickScheduler<T> {
    fn default() -> Self {
        Self {
            now: 0,
            next_id: 1,
            entries: BTreeMap::new(),
        }
    }
}

impl<T: Clone> TickScheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    fn insert(&mut self, delay: u64, repeat: Option<u64>, task: T) -> TaskHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                due: self.now + delay.max(1),
                repeat: repeat.map(|r| r.max(1)),
                task,
            },
        );
        TaskHandle(id)
    }
}

impl<T: Clone> Scheduler<T> for TickScheduler<T> {
    fn after(&mut self, delay_ticks: u64, task: T) -> TaskHandle {
        self.insert(delay_ticks, None, task)
    }

    fn every(&mut self, interval_ticks: u64, task: T) -> TaskHandle {
        self.insert(interval_ticks, Some(interval_ticks), task)
    }

    fn cancel(&mut self, handle: TaskHandle) {
        self.entries.remove(&handle.0);
    }

    fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.entries.contains_key(&handle.0)
    }

    fn advance(&mut self) -> Vec<(TaskHandle, T)> {
        self.now += 1;
        let now = self.now;

        let mut due: Vec<(u64, u64)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.due <= now)
            .map(|(id, e)| (e.due, *id))
            .collect();
        due.sort_unstable();

        let mut fired = Vec::with_capacity(due.len());
        for (_, id) in due {
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            match entry.repeat {
                Some(interval) => {
                    entry.due = now + interval;
                    fired.push((TaskHandle(id), entry.task.clone()));
                }
                None => {
                    if let Some(entry) = self.entries.remove(&id) {
                        fired.push((TaskHandle(id), entry.task));
                    }
                }
            }
        }
        fired
    }

    fn now(&self) -> u64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(s: &mut TickScheduler<&'static str>, ticks: u64) -> Vec<(u64, &'static str)> {
        let mut log = Vec::new();
        for _ in 0..ticks {
            for (_, task) in s.advance() {
                log.push((s.now(), task));
            }
        }
        log
    }

    #[test]
    fn test_after_fires_once() {
        let mut s = TickScheduler::new();
        s.after(3, "once");
        assert_eq!(run(&mut s, 10), vec![(3, "once")]);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn test_zero_delay_fires_next_tick() {
        let mut s = TickScheduler::new();
        s.after(0, "now");
        assert_eq!(run(&mut s, 1), vec![(1, "now")]);
    }

    #[test]
    fn test_every_first_fire_after_interval() {
        let mut s = TickScheduler::new();
        s.every(20, "tick");
        let log = run(&mut s, 60);
        assert_eq!(log, vec![(20, "tick"), (40, "tick"), (60, "tick")]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut s = TickScheduler::new();
        let h = s.every(2, "rep");
        assert!(s.is_scheduled(h));
        s.cancel(h);
        s.cancel(h);
        assert!(!s.is_scheduled(h));
        assert!(run(&mut s, 10).is_empty());
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let mut s = TickScheduler::new();
        let h = s.after(1, "x");
        run(&mut s, 1);
        s.cancel(h);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn test_same_tick_order_by_schedule() {
        let mut s = TickScheduler::new();
        s.after(5, "a");
        s.after(5, "b");
        s.after(2, "c");
        let tasks: Vec<_> = run(&mut s, 5).into_iter().map(|(_, t)| t).collect();
        assert_eq!(tasks, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_handles_unique() {
        let mut s = TickScheduler::new();
        let a = s.after(1, "a");
        let b = s.after(1, "b");
        assert_ne!(a, b);
    }
}
