// Public API
pub mod runtime;
pub use runtime::{Builder, DEFAULT_CHUNK_SIZE, IoBackend, RunReport, Runtime, RuntimeConfig};

// Exports
pub(crate) mod barrier;
pub(crate) use barrier::CompletionBarrier;

pub(crate) mod scheduler;
pub(crate) use scheduler::Scheduler;


/// Why a task gave up its turn. Only used for bookkeeping: every reason
/// suspends the task until its next turn in the rotation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum YieldReason {
    /// Voluntary yield at an algorithmic checkpoint.
    SelfYielded,

    /// A chunk read is still outstanding.
    AwaitingIo,

    /// The submission queue had no room for a read request.
    SqRingFull,
}

/// Mark the rotation the current task belongs to as failed. Every task then
/// sees [`is_rotation_aborted`] return `true` and is expected to stop its work
/// at the next convenient point. A no-op outside of a rotation.
pub fn abort_rotation() {
    crate::context::try_with_barrier(|barrier| barrier.fail());
}

/// Whether a task of the current rotation called [`abort_rotation`].
pub fn is_rotation_aborted() -> bool {
    crate::context::try_with_barrier(|barrier| barrier.is_failed()).unwrap_or(false)
}
