//! Animation-frame batching
//!
//! Every callback pending when a frame tick fires runs exactly once in that
//! tick, all with the same timestamp. The recurring tick is armed on the first
//! request and disarms itself after a tick that leaves nothing pending.

use crate::callback::CallbackError;
use crate::clock::{ClockHandle, FRAME_INTERVAL};
use crate::scheduler::{Rearm, SchedulerHandle, TaskId};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Calls a frame callback with the frame timestamp in milliseconds.
pub type FrameInvoker<C> = Rc<dyn Fn(&C, f64) -> Result<(), CallbackError>>;

struct FrameTable<C> {
    next_id: u64,
    pending: Vec<(u64, C)>,
    /// IDs of the batch currently firing that have not run yet.
    firing: HashSet<u64>,
    task: Option<TaskId>,
    last_timestamp: f64,
}

/// Registry behind `requestAnimationFrame` / `cancelAnimationFrame`.
pub struct FrameScheduler<C> {
    table: Rc<RefCell<FrameTable<C>>>,
    scheduler: SchedulerHandle,
    clock: ClockHandle,
    invoker: FrameInvoker<C>,
    interval: Duration,
}

impl<C> Clone for FrameScheduler<C> {
    fn clone(&self) -> Self {
        Self {
            table: Rc::clone(&self.table),
            scheduler: Rc::clone(&self.scheduler),
            clock: Rc::clone(&self.clock),
            invoker: Rc::clone(&self.invoker),
            interval: self.interval,
        }
    }
}

impl<C: 'static> FrameScheduler<C> {
    pub fn new(scheduler: SchedulerHandle, clock: ClockHandle, invoker: FrameInvoker<C>) -> Self {
        Self::with_interval(scheduler, clock, invoker, FRAME_INTERVAL)
    }

    pub fn with_interval(
        scheduler: SchedulerHandle,
        clock: ClockHandle,
        invoker: FrameInvoker<C>,
        interval: Duration,
    ) -> Self {
        Self {
            table: Rc::new(RefCell::new(FrameTable {
                next_id: 1,
                pending: Vec::new(),
                firing: HashSet::new(),
                task: None,
                last_timestamp: f64::MIN,
            })),
            scheduler,
            clock,
            invoker,
            interval,
        }
    }

    /// Queue `callback` for the next frame tick.
    pub fn request(&self, callback: C) -> u64 {
        let (id, needs_arm) = {
            let mut table = self.table.borrow_mut();
            let id = table.next_id;
            table.next_id += 1;
            table.pending.push((id, callback));
            (id, table.task.is_none())
        };

        if needs_arm {
            let table = Rc::downgrade(&self.table);
            let (clock, invoker) = (Rc::clone(&self.clock), Rc::clone(&self.invoker));
            let interval = self.interval;
            let task = self.scheduler.after(
                interval,
                Box::new(move || run_frame(&table, &clock, &invoker, interval)),
            );
            self.table.borrow_mut().task = Some(task);
            tracing::trace!("frame loop armed");
        }

        id
    }

    /// Drop a callback that has not fired yet. Unknown IDs are ignored.
    pub fn cancel(&self, id: u64) {
        let removed = {
            let mut table = self.table.borrow_mut();
            table.firing.remove(&id);
            let position = table.pending.iter().position(|(pending, _)| *pending == id);
            position.map(|pos| table.pending.remove(pos))
        };
        drop(removed);
    }

    pub fn pending(&self) -> usize {
        self.table.borrow().pending.len()
    }

    /// Whether the recurring frame tick is currently armed.
    pub fn is_armed(&self) -> bool {
        self.table.borrow().task.is_some()
    }

    /// Drop every pending callback and disarm the tick.
    pub fn abandon(&self) {
        let (pending, task) = {
            let mut table = self.table.borrow_mut();
            table.firing.clear();
            (std::mem::take(&mut table.pending), table.task.take())
        };
        if let Some(task) = task {
            self.scheduler.cancel(task);
        }
        drop(pending);
    }
}

fn run_frame<C>(
    table: &Weak<RefCell<FrameTable<C>>>,
    clock: &ClockHandle,
    invoker: &FrameInvoker<C>,
    interval: Duration,
) -> Rearm {
    let Some(table) = table.upgrade() else {
        return Rearm::Stop;
    };

    let (batch, timestamp) = {
        let mut table = table.borrow_mut();
        let batch = std::mem::take(&mut table.pending);
        table.firing = batch.iter().map(|(id, _)| *id).collect();
        let timestamp = clock.epoch_ms().max(table.last_timestamp);
        table.last_timestamp = timestamp;
        (batch, timestamp)
    };

    for (id, callback) in batch {
        if !table.borrow_mut().firing.remove(&id) {
            continue; // cancelled by an earlier callback in this batch
        }
        if let Err(err) = invoker(&callback, timestamp) {
            tracing::warn!(frame_id = id, error = %err, "animation frame callback failed");
        }
    }

    let mut table = table.borrow_mut();
    if table.pending.is_empty() {
        table.task = None;
        tracing::trace!("frame loop disarmed");
        Rearm::Stop
    } else {
        Rearm::Delay(interval)
    }
}
