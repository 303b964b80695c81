//! One task per input file. A task is a suspendable future plus the
//! bookkeeping the rotation keeps about it.

// Public API
pub mod id;
pub use self::id::{Id, id, try_id};

pub mod stopwatch;
pub use self::stopwatch::Stopwatch;

// Re-exports
pub(crate) mod task;
pub(crate) use self::task::Task;
pub use self::task::{TaskState, TaskStats};

pub(crate) use self::id::TaskIdGuard;
