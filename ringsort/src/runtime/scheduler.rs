use crate::context;
use crate::future::yield_now;
use crate::runtime::{CompletionBarrier, RunReport};
use crate::task::{Id, Task, TaskIdGuard};
#[cfg(test)]
use crate::utils::scheduler::Tracker;
use crate::utils::scheduler::{Call, Method};
use std::rc::Rc;
use std::task::{Context, Waker};
use std::time::Instant;

/// Fixed-size, strictly round-robin rotation of tasks.
///
/// Task `i` always hands over to task `(i + 1) % n`. A completed task keeps its
/// slot and is simply skipped, so indexing never shifts under the tasks that
/// are still running.
pub(crate) struct Scheduler<'a, T> {
    tasks: Box<[Task<'a, T>]>,

    current: usize,

    barrier: Rc<CompletionBarrier>,

    #[cfg(test)]
    pub(crate) tracker: Tracker,
}

impl<'a, T: 'a> Scheduler<'a, T> {
    pub(crate) fn new<I, F>(futures: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T> + 'a,
    {
        let futures: Vec<F> = futures.into_iter().collect();
        let barrier = Rc::new(CompletionBarrier::new(futures.len()));

        let tasks = futures
            .into_iter()
            .enumerate()
            .map(|(i, fut)| Task::new(Id(i), with_barrier(fut, Rc::clone(&barrier))))
            .collect();

        Self {
            tasks,
            current: 0,
            barrier,

            #[cfg(test)]
            tracker: Tracker::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    // Small price to pay to get introspection on all scheduler calls during
    // testing. No op in release builds.
    #[allow(unused)]
    #[inline(always)]
    fn track(&self, method: Method, call: Call) {
        #[cfg(test)]
        self.tracker.record(method, call);
    }

    /// Drive the rotation until every task has passed the completion barrier
    /// and returned. Outputs come back in rotation order.
    pub(crate) fn run(mut self) -> RunReport<T> {
        let n = self.len();
        let started = Instant::now();
        let _rotation = RotationGuard::enter(Rc::clone(&self.barrier));

        tracing::debug!(tasks = n, "starting rotation");

        // Tasks are repolled on every turn, there is nothing to wake.
        let mut cx = Context::from_waker(Waker::noop());
        let mut completed = 0;

        while completed < n {
            let current = self.current;

            if !self.tasks[current].is_completed() {
                let id = self.tasks[current].id();
                self.track(Method::Resume, Call::Resume { id });

                let _guard = TaskIdGuard::enter(id);
                if self.tasks[current].poll(&mut cx).is_ready() {
                    completed += 1;
                    tracing::debug!(task = %id, "task left the rotation");
                    self.track(Method::Exit, Call::Exit { id });
                } else {
                    let state = self.tasks[current].state();
                    self.track(Method::Suspend, Call::Suspend { id, state });
                }
            }

            self.current = (current + 1) % n;
        }

        debug_assert!(self.barrier.is_released());
        tracing::debug!(
            tasks = n,
            failed = self.barrier.is_failed(),
            elapsed = ?started.elapsed(),
            "rotation drained"
        );

        let (outputs, stats) = self
            .tasks
            .into_vec()
            .into_iter()
            .map(Task::into_output)
            .unzip();

        RunReport {
            outputs,
            stats,
            elapsed: started.elapsed(),
        }
    }
}

/// Publish the rotation's barrier in the context while it is being driven.
struct RotationGuard {
    parent: Option<Rc<CompletionBarrier>>,
}

impl RotationGuard {
    fn enter(barrier: Rc<CompletionBarrier>) -> Self {
        RotationGuard {
            parent: context::set_current_barrier(Some(barrier)),
        }
    }
}

impl Drop for RotationGuard {
    fn drop(&mut self) {
        context::set_current_barrier(self.parent.take());
    }
}

/// Wrap a task's work in the completion protocol: publish, arrive, then keep
/// taking turns until the whole rotation is done.
async fn with_barrier<F: Future>(fut: F, barrier: Rc<CompletionBarrier>) -> F::Output {
    let output = fut.await;

    barrier.arrive();
    yield_now().await;
    barrier.wait().await;

    output
}
