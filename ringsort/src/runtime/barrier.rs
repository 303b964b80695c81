use crate::future::yield_now;
use std::cell::Cell;

/// Countdown of tasks that have not produced their output yet.
///
/// A task that is done arrives once and then keeps taking (empty) turns until
/// every other task has arrived as well, so the rotation keeps its size until
/// the very end. Only the running task ever touches the counter, so a `Cell`
/// is all the synchronization there is.
///
/// The barrier also carries the rotation's failure flag: once a task has hit a
/// fatal error the others stop working and head straight for `wait`.
#[derive(Debug)]
pub(crate) struct CompletionBarrier {
    active: Cell<usize>,
    failed: Cell<bool>,
}

impl CompletionBarrier {
    pub(crate) fn new(active: usize) -> Self {
        Self {
            active: Cell::new(active),
            failed: Cell::new(false),
        }
    }

    pub(crate) fn fail(&self) {
        self.failed.set(true);
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.failed.get()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.active.get()
    }

    pub(crate) fn is_released(&self) -> bool {
        self.remaining() == 0
    }

    #[track_caller]
    pub(crate) fn arrive(&self) {
        let active = self.active.get();
        assert!(active > 0, "more arrivals than tasks at the completion barrier");
        self.active.set(active - 1);
    }

    /// Busy-yield until every task has arrived.
    pub(crate) async fn wait(&self) {
        while !self.is_released() {
            yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::poll_counting;

    #[test]
    fn test_barrier_counts_down() {
        let barrier = CompletionBarrier::new(2);
        assert!(!barrier.is_released());

        barrier.arrive();
        assert_eq!(barrier.remaining(), 1);
        barrier.arrive();
        assert!(barrier.is_released());

        // Released barrier never suspends.
        let ((), pendings) = poll_counting(barrier.wait());
        assert_eq!(pendings, 0);
    }

    #[test]
    fn test_failure_flag_is_sticky() {
        let barrier = CompletionBarrier::new(1);
        assert!(!barrier.is_failed());

        barrier.fail();
        barrier.arrive();
        assert!(barrier.is_failed());
        assert!(barrier.is_released());
    }

    #[test]
    #[should_panic(expected = "more arrivals than tasks")]
    fn test_barrier_rejects_extra_arrival() {
        let barrier = CompletionBarrier::new(0);
        barrier.arrive();
    }
}
