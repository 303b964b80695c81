use crate::context;
use crate::runtime::YieldReason;
use std::pin::Pin;
use std::task::{Context, Poll};

#[derive(Debug, Clone, Copy)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct YieldNow {
    awaiting_first_poll: bool,
    reason: YieldReason,
}

impl YieldNow {
    /// Suspend the current task and let every other task of the rotation take
    /// one turn before this one resumes. This is the only suspension point of
    /// the runtime; anything long-running is expected to call it often.
    ///
    /// The reason is only bookkeeping: it decides which state the task is
    /// parked in until its next turn.
    pub fn new(reason: YieldReason) -> Self {
        Self {
            awaiting_first_poll: true,
            reason,
        }
    }
}

/// Yield to the next task of the rotation.
pub fn yield_now() -> YieldNow {
    YieldNow::new(YieldReason::SelfYielded)
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Only yield on first poll. Next time task is scheduled we will return.
        if self.awaiting_first_poll {
            self.awaiting_first_poll = false;
            context::record_yield(self.reason);

            // The rotation repolls every task on its turn, but stay well behaved
            // under any other executor.
            cx.waker().wake_by_ref();

            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }
}
