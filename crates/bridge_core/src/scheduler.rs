//! Cooperative host-loop scheduling
//!
//! The bridge never assumes a particular host event loop. Subsystems receive a
//! [`SchedulerHandle`] and only ever ask for two things: "run this after a
//! delay (and maybe again)" and "run this on every tick". [`HostLoop`] is the
//! implementation used by the CLI host and the tests.
//!
//! ## Pass semantics
//!
//! One call to [`HostLoop::tick`] runs every timed task that was due when the
//! pass started, in deadline order (FIFO among equal deadlines), then every
//! tick task in registration order. Tasks armed during the pass wait for the
//! next pass. A task re-armed with `Rearm::After(period)` whose next deadline
//! is already behind the pass clock runs again in the same pass, so a late
//! tick never loses periods; a zero period always waits, so
//! `Rearm::After(ZERO)` cannot starve the loop.

use crate::clock::ClockHandle;
use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

/// Upper bound on a single idle sleep, so tick tasks keep running while no
/// timed task is pending.
pub const MAX_IDLE_SLEEP: Duration = Duration::from_millis(10);

pub type TaskId = u64;

/// What a timed task wants after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rearm {
    Stop,
    /// Run again `period` after the previous deadline (fixed rate).
    After(Duration),
    /// Run again `delay` after the current pass. Never repeats within a pass.
    Delay(Duration),
}

pub type Task = Box<dyn FnMut() -> Rearm>;

/// Per-tick task; returning `false` unregisters it.
pub type TickTask = Box<dyn FnMut() -> bool>;

/// Scheduling capability injected into every subsystem.
///
/// All methods are called on the host thread only.
pub trait Scheduler {
    /// Run `task` once `delay` has elapsed.
    fn after(&self, delay: Duration, task: Task) -> TaskId;

    /// Run `task` on every host-loop tick.
    fn every_tick(&self, task: TickTask) -> TaskId;

    /// Prevent future runs of `id`. A run already in progress completes.
    /// Returns `false` for unknown or finished tasks.
    fn cancel(&self, id: TaskId) -> bool;
}

pub type SchedulerHandle = Rc<dyn Scheduler>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Deadline {
    at: Duration,
    seq: u64,
    id: TaskId,
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct LoopState {
    next_id: TaskId,
    next_seq: u64,
    deadlines: BinaryHeap<Reverse<Deadline>>,
    timed: HashMap<TaskId, Task>,
    ticks: Vec<(TaskId, TickTask)>,
    in_flight: HashSet<TaskId>,
    cancelled_in_flight: HashSet<TaskId>,
    ticking: bool,
}

impl LoopState {
    fn allocate_id(&mut self) -> TaskId {
        self.next_id += 1;
        self.next_id
    }

    fn push_deadline(&mut self, at: Duration, id: TaskId) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.deadlines.push(Reverse(Deadline { at, seq, id }));
    }

    /// Marks the end of an in-flight run; returns whether it was cancelled.
    fn finish_in_flight(&mut self, id: TaskId) -> bool {
        self.in_flight.remove(&id);
        self.cancelled_in_flight.remove(&id)
    }
}

/// Single-threaded deadline-heap scheduler driven by an injected clock.
pub struct HostLoop {
    clock: ClockHandle,
    state: RefCell<LoopState>,
}

impl HostLoop {
    pub fn new(clock: ClockHandle) -> Self {
        Self {
            clock,
            state: RefCell::new(LoopState::default()),
        }
    }

    pub fn clock(&self) -> ClockHandle {
        Rc::clone(&self.clock)
    }

    /// Whether any timed task is still registered.
    pub fn has_timed_tasks(&self) -> bool {
        !self.state.borrow().timed.is_empty()
    }

    /// Earliest deadline among live timed tasks.
    pub fn next_deadline(&self) -> Option<Duration> {
        let state = self.state.borrow();
        state
            .deadlines
            .iter()
            .filter(|Reverse(d)| state.timed.contains_key(&d.id))
            .map(|Reverse(d)| d.at)
            .min()
    }

    /// Run one pass. Returns the number of task invocations.
    ///
    /// Re-entrant calls (a task driving the loop) are ignored.
    pub fn tick(&self) -> usize {
        {
            let mut state = self.state.borrow_mut();
            if state.ticking {
                tracing::warn!("re-entrant HostLoop::tick ignored");
                return 0;
            }
            state.ticking = true;
        }

        let ran = self.run_due_tasks() + self.run_tick_tasks();
        self.state.borrow_mut().ticking = false;
        ran
    }

    fn run_due_tasks(&self) -> usize {
        let now = self.clock.now();
        let horizon = self.state.borrow().next_seq;
        let mut deferred = Vec::new();
        let mut ran = 0;

        loop {
            let (deadline, mut task) = {
                let mut state = self.state.borrow_mut();
                let Some(Reverse(next)) = state.deadlines.peek().copied() else {
                    break;
                };
                if next.at > now {
                    break;
                }
                state.deadlines.pop();
                if next.seq >= horizon {
                    // Armed during this pass
                    deferred.push(next);
                    continue;
                }
                let Some(task) = state.timed.remove(&next.id) else {
                    continue; // cancelled
                };
                state.in_flight.insert(next.id);
                (next, task)
            };

            let rearm = task();
            ran += 1;

            let mut state = self.state.borrow_mut();
            let cancelled = state.finish_in_flight(deadline.id);
            match rearm {
                Rearm::After(period) if !cancelled => {
                    let at = deadline.at + period;
                    if !period.is_zero() && at <= now {
                        // Already overdue: keep the old seq so this pass catches up
                        state.deadlines.push(Reverse(Deadline { at, ..deadline }));
                    } else {
                        state.push_deadline(at, deadline.id);
                    }
                    state.timed.insert(deadline.id, task);
                }
                Rearm::Delay(delay) if !cancelled => {
                    state.push_deadline(now + delay, deadline.id);
                    state.timed.insert(deadline.id, task);
                }
                _ => {
                    drop(state);
                    drop(task);
                    tracing::trace!(task_id = deadline.id, "timed task finished");
                }
            }
        }

        let mut state = self.state.borrow_mut();
        for entry in deferred {
            state.deadlines.push(Reverse(entry));
        }
        ran
    }

    fn run_tick_tasks(&self) -> usize {
        let batch = {
            let mut state = self.state.borrow_mut();
            let batch = std::mem::take(&mut state.ticks);
            for (id, _) in &batch {
                state.in_flight.insert(*id);
            }
            batch
        };

        let mut kept = Vec::with_capacity(batch.len());
        let mut ran = 0;
        for (id, mut task) in batch {
            if self.state.borrow().cancelled_in_flight.contains(&id) {
                self.state.borrow_mut().finish_in_flight(id);
                continue;
            }
            let keep = task();
            ran += 1;
            let cancelled = self.state.borrow_mut().finish_in_flight(id);
            if keep && !cancelled {
                kept.push((id, task));
            }
        }

        let mut state = self.state.borrow_mut();
        kept.append(&mut state.ticks);
        state.ticks = kept;
        ran
    }

    fn idle_wait(&self) -> Duration {
        let now = self.clock.now();
        match self.next_deadline() {
            Some(at) => at.saturating_sub(now).min(MAX_IDLE_SLEEP),
            None => MAX_IDLE_SLEEP,
        }
    }

    /// Drive the loop for `duration`, sleeping between deadlines.
    pub fn run_for(&self, duration: Duration) {
        let end = self.clock.now() + duration;
        loop {
            self.tick();
            let now = self.clock.now();
            if now >= end {
                break;
            }
            self.clock.sleep(self.idle_wait().min(end - now));
        }
    }

    /// Drive the loop until `done` returns true or `timeout` elapses.
    pub fn run_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let end = self.clock.now() + timeout;
        loop {
            self.tick();
            if done() {
                return true;
            }
            let now = self.clock.now();
            if now >= end {
                return false;
            }
            self.clock.sleep(self.idle_wait().min(end - now));
        }
    }

    /// Drive the loop until no timed task remains or `timeout` elapses.
    pub fn run_until_idle(&self, timeout: Duration) -> bool {
        self.run_until(timeout, || !self.has_timed_tasks())
    }
}

impl Scheduler for HostLoop {
    fn after(&self, delay: Duration, task: Task) -> TaskId {
        let at = self.clock.now() + delay;
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id();
        state.push_deadline(at, id);
        state.timed.insert(id, task);
        id
    }

    fn every_tick(&self, task: TickTask) -> TaskId {
        let mut state = self.state.borrow_mut();
        let id = state.allocate_id();
        state.ticks.push((id, task));
        id
    }

    fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.state.borrow_mut();
        let timed = state.timed.remove(&id);
        let position = state.ticks.iter().position(|(tick_id, _)| *tick_id == id);
        let tick = position.map(|pos| state.ticks.remove(pos).1);

        if timed.is_none() && tick.is_none() {
            if state.in_flight.contains(&id) {
                state.cancelled_in_flight.insert(id);
                return true;
            }
            return false;
        }

        // Task closures may own script handles; drop them outside the borrow.
        drop(state);
        drop((timed, tick));
        true
    }
}
