use crate::context::Driver;
use crate::runtime::{CompletionBarrier, RuntimeConfig, YieldReason};
use crate::task::Id;
use anyhow::Result;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Core thread-local context. Requires interior mutability on all fields so
/// the scheduler and the task it is polling can each borrow what they need.
pub(crate) struct Core {
    /// Reads issued by tasks of this thread.
    pub(crate) driver: RefCell<Driver>,

    /// Task that is currently being polled, if any.
    pub(crate) current_task_id: Cell<Option<Id>>,

    /// Set by `YieldNow` right before it suspends the task, consumed by the
    /// scheduler once the poll returns.
    pub(crate) yield_reason: Cell<Option<YieldReason>>,

    /// Barrier of the rotation being driven, if any.
    pub(crate) barrier: RefCell<Option<Rc<CompletionBarrier>>>,
}

impl Core {
    pub(crate) fn try_new(cfg: &RuntimeConfig) -> Result<Self> {
        Ok(Core {
            driver: RefCell::new(Driver::try_new(cfg)?),
            current_task_id: Cell::new(None),
            yield_reason: Cell::new(None),
            barrier: RefCell::new(None),
        })
    }
}
