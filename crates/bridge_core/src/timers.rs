//! One-shot and repeating timers
//!
//! IDs come from a single counter shared by both kinds, start at 1 and are
//! never reused for the lifetime of the registry. Each timer is backed by one
//! scheduler task; the registry entry is the source of truth, so a task that
//! fires after its entry was cleared does nothing.

use crate::callback::CallbackError;
use crate::scheduler::{Rearm, SchedulerHandle, TaskId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Calls a timer callback on the host thread.
pub type TimerInvoker<C> = Rc<dyn Fn(&C) -> Result<(), CallbackError>>;

struct TimerEntry<C> {
    callback: C,
    repeating: bool,
    period: Duration,
    task: TaskId,
}

struct TimerTable<C> {
    next_id: u64,
    entries: HashMap<u64, TimerEntry<C>>,
}

/// Registry behind `setTimeout` / `setInterval`.
pub struct Timers<C> {
    table: Rc<RefCell<TimerTable<C>>>,
    scheduler: SchedulerHandle,
    invoker: TimerInvoker<C>,
}

impl<C> Clone for Timers<C> {
    fn clone(&self) -> Self {
        Self {
            table: Rc::clone(&self.table),
            scheduler: Rc::clone(&self.scheduler),
            invoker: Rc::clone(&self.invoker),
        }
    }
}

impl<C: Clone + 'static> Timers<C> {
    pub fn new(scheduler: SchedulerHandle, invoker: TimerInvoker<C>) -> Self {
        Self {
            table: Rc::new(RefCell::new(TimerTable {
                next_id: 1,
                entries: HashMap::new(),
            })),
            scheduler,
            invoker,
        }
    }

    /// Register a timer. Negative or non-finite delays count as zero.
    pub fn set(&self, callback: C, delay_ms: f64, repeating: bool) -> u64 {
        let period = delay_from_ms(delay_ms);
        let id = {
            let mut table = self.table.borrow_mut();
            let id = table.next_id;
            table.next_id += 1;
            id
        };

        let table = Rc::downgrade(&self.table);
        let invoker = Rc::clone(&self.invoker);
        let task = self
            .scheduler
            .after(period, Box::new(move || fire(&table, &invoker, id)));

        self.table.borrow_mut().entries.insert(
            id,
            TimerEntry {
                callback,
                repeating,
                period,
                task,
            },
        );
        tracing::trace!(timer_id = id, repeating, ?period, "timer set");
        id
    }

    /// Cancel a timer. Unknown or already-fired IDs are ignored.
    pub fn clear(&self, id: u64) {
        let removed = self.table.borrow_mut().entries.remove(&id);
        if let Some(entry) = removed {
            self.scheduler.cancel(entry.task);
            tracing::trace!(timer_id = id, "timer cleared");
        }
    }

    pub fn is_active(&self, id: u64) -> bool {
        self.table.borrow().entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.table.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every timer without firing it. Used when the owning context dies.
    pub fn abandon(&self) {
        let entries: Vec<_> = self.table.borrow_mut().entries.drain().collect();
        for (_, entry) in &entries {
            self.scheduler.cancel(entry.task);
        }
        if !entries.is_empty() {
            tracing::debug!(count = entries.len(), "abandoned pending timers");
        }
    }
}

fn fire<C: Clone>(table: &Weak<RefCell<TimerTable<C>>>, invoker: &TimerInvoker<C>, id: u64) -> Rearm {
    let Some(table) = table.upgrade() else {
        return Rearm::Stop;
    };

    let (callback, repeating, period, removed) = {
        let mut table = table.borrow_mut();
        let Some(entry) = table.entries.get(&id) else {
            return Rearm::Stop;
        };
        let snapshot = (entry.callback.clone(), entry.repeating, entry.period);
        let removed = if snapshot.1 { None } else { table.entries.remove(&id) };
        (snapshot.0, snapshot.1, snapshot.2, removed)
    };
    drop(removed);

    match invoker(&callback) {
        Ok(()) if repeating && table.borrow().entries.contains_key(&id) => Rearm::After(period),
        Ok(()) => Rearm::Stop,
        Err(err) => {
            tracing::warn!(timer_id = id, repeating, error = %err, "timer callback failed");
            if repeating {
                let removed = table.borrow_mut().entries.remove(&id);
                drop(removed);
            }
            Rearm::Stop
        }
    }
}

/// Milliseconds from script land to a scheduler delay.
pub fn delay_from_ms(delay_ms: f64) -> Duration {
    if delay_ms.is_finite() && delay_ms > 0.0 {
        Duration::from_secs_f64(delay_ms / 1000.0)
    } else {
        Duration::ZERO
    }
}
