//! Thread-local runtime context. Everything a task needs while it is being
//! polled (the I/O driver, its own id, the reason it last yielded) lives here
//! so futures never have to carry a handle to the runtime.

use crate::errors::SortError;
use crate::runtime::{CompletionBarrier, RuntimeConfig, YieldReason};
use crate::task::Id;
use anyhow::{Result, anyhow};
use std::cell::RefCell;
use std::rc::Rc;
use std::thread_local;

// Exports
mod core;
pub(crate) use core::Core;

pub(crate) mod driver;
pub(crate) use driver::Driver;

pub(crate) mod ring;
pub(crate) use ring::SingleIssuerRing;

pub(crate) mod slab;
pub(crate) use slab::ReadSlab;

thread_local! {
    static CONTEXT: RefCell<Option<Core>> = const { RefCell::new(None) };
}

pub(crate) fn init_local_context(cfg: &RuntimeConfig) -> Result<()> {
    CONTEXT.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        if ctx.is_some() {
            return Err(anyhow!("Context already initialized on this thread"));
        }

        *ctx = Some(Core::try_new(cfg)?);
        Ok(())
    })
}

/// Drop the thread's context. In-flight reads are drained first so the kernel
/// never writes into a buffer we already freed.
pub(crate) fn teardown_local_context() {
    let core = CONTEXT.with(|ctx| ctx.borrow_mut().take());

    let Some(core) = core else {
        return;
    };

    let mut driver = core.driver.borrow_mut();
    tracing::debug!(inflight = driver.inflight(), "tearing down I/O driver");

    if let Err(e) = driver.drain() {
        tracing::warn!(error = %e, "failed to drain in-flight reads on shutdown");
    }
}

#[inline(always)]
pub(crate) fn try_with_core<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&Core) -> R,
{
    CONTEXT.with(|ctx| ctx.borrow().as_ref().map(f))
}

#[track_caller]
#[inline(always)]
pub(crate) fn with_core<F, R>(f: F) -> R
where
    F: FnOnce(&Core) -> R,
{
    try_with_core(f).expect("Context not initialized")
}

/// Borrow the I/O driver. Fails if no runtime is active on this thread.
#[inline(always)]
pub(crate) fn with_driver_mut<F, R>(f: F) -> Result<R, SortError>
where
    F: FnOnce(&mut Driver) -> R,
{
    try_with_core(|core| f(&mut core.driver.borrow_mut())).ok_or(SortError::NoRuntime)
}

pub(crate) fn current_task_id() -> Option<Id> {
    try_with_core(|core| core.current_task_id.get()).flatten()
}

pub(crate) fn set_current_task_id(id: Option<Id>) -> Option<Id> {
    try_with_core(|core| core.current_task_id.replace(id)).flatten()
}

/// Remember why the running task is about to suspend. A no-op outside of a
/// runtime, which keeps yielding infallible.
pub(crate) fn record_yield(reason: YieldReason) {
    try_with_core(|core| core.yield_reason.set(Some(reason)));
}

pub(crate) fn take_yield_reason() -> Option<YieldReason> {
    try_with_core(|core| core.yield_reason.take()).flatten()
}

pub(crate) fn set_current_barrier(
    barrier: Option<Rc<CompletionBarrier>>,
) -> Option<Rc<CompletionBarrier>> {
    try_with_core(|core| core.barrier.replace(barrier)).flatten()
}

/// Run `f` against the barrier of the rotation currently being driven.
pub(crate) fn try_with_barrier<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&CompletionBarrier) -> R,
{
    try_with_core(|core| core.barrier.borrow().as_deref().map(f)).flatten()
}
