use crate::context;
use crate::runtime::Scheduler;
use crate::task::TaskStats;
#[cfg(test)]
use crate::utils::scheduler::Tracker;
use crate::utils::ScopeGuard;
use anyhow::{Result, anyhow};
use std::cell::Cell;
use std::marker::PhantomData;
use std::time::Duration;

/// Default size of a chunk read request, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default size for io_uring SQ ring. One read is in flight per task at most,
/// so this only needs to cover the number of files sorted at once.
const SQ_RING_SIZE: usize = 64;

/// Which mechanism performs chunk reads.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum IoBackend {
    /// io_uring when the kernel allows it, positional reads otherwise.
    #[default]
    Auto,

    /// io_uring only. Building the runtime fails if it is unavailable.
    Uring,

    /// Positional reads performed on the poll after submission.
    Blocking,
}

#[derive(Debug)]
pub struct Builder {
    /// Size of each chunk read request.
    chunk_size: usize,

    /// Size of io_uring SQ ring
    sq_ring_size: usize,

    /// Backend used by the I/O driver.
    io_backend: IoBackend,
}

impl Builder {
    /// Returns a new builder for a runtime driving tasks on the current thread.
    ///
    /// Configuration methods can be chained on the return value.
    pub fn new_local() -> Builder {
        Builder {
            chunk_size: DEFAULT_CHUNK_SIZE,
            sq_ring_size: SQ_RING_SIZE,
            io_backend: IoBackend::default(),
        }
    }

    #[track_caller]
    pub fn chunk_size(mut self, val: usize) -> Self {
        assert!(val > 0, "chunk_size must be greater than 0");
        self.chunk_size = val;
        self
    }

    #[track_caller]
    pub fn sq_ring_size(mut self, val: usize) -> Self {
        assert!(val.is_power_of_two(), "sq_ring_size must be a power of two");
        self.sq_ring_size = val;
        self
    }

    pub fn io_backend(mut self, val: IoBackend) -> Self {
        self.io_backend = val;
        self
    }

    /// Creates the configured `Runtime` and installs its context on the
    /// current thread.
    pub fn try_build(self) -> Result<Runtime> {
        IS_RUNTIME_ACTIVE.with(|is_active| -> Result<()> {
            if is_active.get() {
                Err(anyhow!(
                    "Cannot create a new Runtime: a runtime is already active on this thread."
                ))
            } else {
                is_active.set(true);
                Ok(())
            }
        })?;

        let mut reset_active = ScopeGuard::new(|| {
            IS_RUNTIME_ACTIVE.with(|is_active| is_active.set(false));
        });

        let cfg = RuntimeConfig::try_from(self)?;
        context::init_local_context(&cfg)?;
        reset_active.disarm();

        Ok(Runtime {
            cfg,
            _not_send: PhantomData,
        })
    }
}

// Use a thread_local variable to track if a runtime is already active on this thread.
thread_local! {
    static IS_RUNTIME_ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// Immutable configuration of a built runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub(crate) chunk_size: usize,
    pub(crate) sq_ring_size: usize,
    pub(crate) io_backend: IoBackend,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            sq_ring_size: SQ_RING_SIZE,
            io_backend: IoBackend::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn sq_ring_size(&self) -> usize {
        self.sq_ring_size
    }

    /// Backend as requested, `Auto` not resolved. See [`Runtime::io_backend`].
    pub fn io_backend(&self) -> IoBackend {
        self.io_backend
    }

    fn validate(&self) -> Result<()> {
        // A read SQE carries its length as a u32.
        if self.chunk_size == 0 || self.chunk_size > u32::MAX as usize {
            return Err(anyhow!(
                "chunk_size must be between 1 and {} bytes, got {}",
                u32::MAX,
                self.chunk_size
            ));
        }

        if !self.sq_ring_size.is_power_of_two() || self.sq_ring_size > u32::MAX as usize {
            return Err(anyhow!(
                "sq_ring_size must be a power of two that fits in u32, got {}",
                self.sq_ring_size
            ));
        }

        Ok(())
    }
}

impl TryFrom<Builder> for RuntimeConfig {
    type Error = anyhow::Error;

    fn try_from(builder: Builder) -> Result<Self, Self::Error> {
        let cfg = RuntimeConfig {
            chunk_size: builder.chunk_size,
            sq_ring_size: builder.sq_ring_size,
            io_backend: builder.io_backend,
        };

        cfg.validate()?;
        Ok(cfg)
    }
}

/// What a rotation produced.
#[derive(Debug)]
pub struct RunReport<T> {
    /// Task outputs, in rotation order.
    pub outputs: Vec<T>,

    /// One entry per task, in rotation order.
    pub stats: Vec<TaskStats>,

    /// Wall time of the whole rotation.
    pub elapsed: Duration,
}

/// Single-threaded runtime. Owns the thread-local context for as long as it
/// lives, which is why it can't be sent to another thread.
#[derive(Debug)]
pub struct Runtime {
    cfg: RuntimeConfig,

    _not_send: PhantomData<*const ()>,
}

impl Runtime {
    pub fn config(&self) -> &RuntimeConfig {
        &self.cfg
    }

    /// Backend the I/O driver actually uses, with `Auto` resolved.
    pub fn io_backend(&self) -> IoBackend {
        context::with_core(|core| core.driver.borrow().backend())
    }

    /// Run every future as one task of a round-robin rotation and return once
    /// all of them have completed.
    ///
    /// A task that finishes early keeps taking turns until the last one is
    /// done, so every task resumes exactly once per cycle for the whole run.
    pub fn run<'a, I, F>(&self, futures: I) -> RunReport<F::Output>
    where
        I: IntoIterator<Item = F>,
        F: Future + 'a,
    {
        Scheduler::new(futures).run()
    }

    /// Drive a single future to completion.
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        let mut report = self.run([fut]);
        match report.outputs.pop() {
            Some(output) => output,
            None => unreachable!("rotation of one produced no output"),
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        context::teardown_local_context();
        IS_RUNTIME_ACTIVE.with(|is_active| is_active.set(false));
    }
}

// Test-only helpers
#[cfg(test)]
impl Runtime {
    /// Like [`Runtime::run`], also handing back every scheduler call made.
    pub(crate) fn run_tracked<'a, I, F>(&self, futures: I) -> (RunReport<F::Output>, Tracker)
    where
        I: IntoIterator<Item = F>,
        F: Future + 'a,
    {
        let scheduler = Scheduler::new(futures);
        let tracker = scheduler.tracker.clone();
        (scheduler.run(), tracker)
    }

    pub(crate) fn inflight_reads(&self) -> usize {
        context::with_core(|core| core.driver.borrow().inflight())
    }

    pub(crate) fn drain_io(&self) -> std::io::Result<()> {
        context::with_core(|core| core.driver.borrow_mut().drain())
    }
}
