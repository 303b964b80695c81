use crate::context;
use crate::runtime::YieldReason;
use crate::task::{Id, Stopwatch};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Currently being polled. Exactly one task of a rotation is in this state.
    Active,

    /// Yielded and waiting for its next turn.
    Suspended,

    /// Yielded while one of its reads was still in flight.
    AwaitingIo,

    /// Future returned. The task keeps its slot but is never polled again.
    Completed,
}

/// Timing and scheduling statistics gathered while a task was running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStats {
    pub id: Id,

    /// Time spent between resumptions and the following suspensions.
    pub busy: Duration,

    pub resumptions: u64,

    pub yields: u64,

    /// Subset of `yields` taken while a read was outstanding.
    pub io_waits: u64,
}

impl fmt::Display for TaskStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "task {} ran for {} us ({} resumptions, {} I/O waits)",
            self.id,
            self.busy.as_micros(),
            self.resumptions,
            self.io_waits
        )
    }
}

/// A single slot of the rotation.
///
/// The boxed future is the saved execution point: everything the task had on
/// its "stack" when it yielded lives inside the future's state.
pub(crate) struct Task<'a, T> {
    id: Id,
    state: TaskState,
    future: Pin<Box<dyn Future<Output = T> + 'a>>,
    stopwatch: Stopwatch,
    yields: u64,
    io_waits: u64,
    output: Option<T>,
}

impl<'a, T> Task<'a, T> {
    pub(crate) fn new<F>(id: Id, future: F) -> Self
    where
        F: Future<Output = T> + 'a,
    {
        Self {
            id,
            state: TaskState::Suspended,
            future: Box::pin(future),
            stopwatch: Stopwatch::new(),
            yields: 0,
            io_waits: 0,
            output: None,
        }
    }

    pub(crate) fn id(&self) -> Id {
        self.id
    }

    pub(crate) fn state(&self) -> TaskState {
        self.state
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.state == TaskState::Completed
    }

    /// Resume the task until its next yield. Busy time is charged to the task
    /// for exactly the duration of the poll.
    pub(crate) fn poll(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        debug_assert!(!self.is_completed(), "polled a completed task");
        debug_assert!(!self.stopwatch.is_running(), "task resumed while running");

        self.state = TaskState::Active;
        self.stopwatch.resume();
        let res = self.future.as_mut().poll(cx);
        self.stopwatch.suspend();

        let reason = context::take_yield_reason();

        match res {
            Poll::Ready(output) => {
                self.output = Some(output);
                self.state = TaskState::Completed;
                Poll::Ready(())
            }
            Poll::Pending => {
                self.yields += 1;
                self.state = match reason {
                    Some(YieldReason::AwaitingIo) => {
                        self.io_waits += 1;
                        TaskState::AwaitingIo
                    }
                    _ => TaskState::Suspended,
                };
                Poll::Pending
            }
        }
    }

    pub(crate) fn stats(&self) -> TaskStats {
        TaskStats {
            id: self.id,
            busy: self.stopwatch.elapsed(),
            resumptions: self.stopwatch.laps(),
            yields: self.yields,
            io_waits: self.io_waits,
        }
    }

    /// Hands the output over to the caller. Ownership of the result leaves the
    /// task here.
    pub(crate) fn into_output(self) -> (T, TaskStats) {
        let stats = self.stats();
        let output = self
            .output
            .expect("rotation drained with a task that never completed");
        (output, stats)
    }
}

impl<T> fmt::Debug for Task<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("stopwatch", &self.stopwatch)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::yield_now;
    use std::task::Waker;

    #[test]
    fn test_task_tracks_state_and_output() {
        let mut task = Task::new(Id(3), async {
            yield_now().await;
            yield_now().await;
            7
        });
        let mut cx = Context::from_waker(Waker::noop());

        assert_eq!(task.state(), TaskState::Suspended);
        assert!(task.poll(&mut cx).is_pending());
        assert_eq!(task.state(), TaskState::Suspended);
        assert!(task.poll(&mut cx).is_pending());
        assert!(task.poll(&mut cx).is_ready());
        assert!(task.is_completed());

        let (output, stats) = task.into_output();
        assert_eq!(output, 7);
        assert_eq!(stats.id, Id(3));
        assert_eq!(stats.resumptions, 3);
        assert_eq!(stats.yields, 2);
        assert_eq!(stats.io_waits, 0);
    }

    #[test]
    fn test_task_stats_display() {
        let stats = TaskStats {
            id: Id(1),
            busy: Duration::from_micros(250),
            resumptions: 4,
            yields: 3,
            io_waits: 1,
        };
        assert_eq!(
            stats.to_string(),
            "task 1 ran for 250 us (4 resumptions, 1 I/O waits)"
        );
    }
}
