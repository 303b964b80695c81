use std::time::{Duration, Instant};

/// Accumulates the time spent between a resume and the following suspend.
///
/// A task is only ever timed while it is the one running, so there is never
/// more than one lap open at a time.
#[derive(Debug, Default, Clone)]
pub struct Stopwatch {
    last_resume: Option<Instant>,
    accumulated: Duration,
    laps: u64,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a lap. Resuming a running stopwatch restarts the open lap.
    pub fn resume(&mut self) {
        self.last_resume = Some(Instant::now());
        self.laps += 1;
    }

    /// Closes the open lap and returns its length. Returns zero if the
    /// stopwatch was not running.
    pub fn suspend(&mut self) -> Duration {
        match self.last_resume.take() {
            Some(start) => {
                let lap = start.elapsed();
                self.accumulated += lap;
                lap
            }
            None => Duration::ZERO,
        }
    }

    pub fn is_running(&self) -> bool {
        self.last_resume.is_some()
    }

    /// Total time of all closed laps.
    pub fn elapsed(&self) -> Duration {
        self.accumulated
    }

    pub fn laps(&self) -> u64 {
        self.laps
    }
}
