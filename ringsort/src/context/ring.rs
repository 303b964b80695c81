use crate::context::ReadSlab;
use crate::context::slab::ReadState;
use crate::runtime::RuntimeConfig;
use io_uring::IoUring;
use io_uring::squeue::{Entry, PushError};
use std::io;

/// A wrapper around `io_uring` driven by a single thread.
///
/// The ring is never waited on while tasks are runnable: submissions are
/// flushed without `GETEVENTS` and completions are reaped by peeking at the
/// CQ ring on each poll.
pub(crate) struct SingleIssuerRing {
    ring: IoUring,

    /// Keep SQEs queued instead of handing them to the kernel.
    #[cfg(test)]
    hold_submissions: bool,

    /// Errno returned by the next submission attempt.
    #[cfg(test)]
    fail_next_submit: Option<i32>,
}

impl SingleIssuerRing {
    pub(crate) fn try_new(cfg: &RuntimeConfig) -> io::Result<Self> {
        let ring = IoUring::builder()
            // Keep submitting requests even if one of them fails to be
            // prepared, so every SQE gets a CQE.
            .setup_submit_all()
            .build(cfg.sq_ring_size as u32)?;

        if !ring.params().is_feature_nodrop() {
            tracing::warn!(
                "IORING_FEAT_NODROP is not enabled for this kernel. The kernel will silently drop completions if the CQ ring is full."
            );
        }

        Ok(SingleIssuerRing {
            ring,
            #[cfg(test)]
            hold_submissions: false,
            #[cfg(test)]
            fail_next_submit: None,
        })
    }

    pub(crate) fn num_unsubmitted_sqes(&mut self) -> usize {
        self.ring.submission().len()
    }

    pub(crate) fn push(&mut self, entry: &Entry) -> Result<(), PushError> {
        // Safety: callers keep the buffer referenced by `entry` alive in the
        // slab until its completion has been reaped.
        unsafe { self.ring.submission().push(entry) }
    }

    /// Submit all pending SQEs without waiting for any completion.
    pub(crate) fn submit_no_wait(&mut self) -> io::Result<usize> {
        #[cfg(test)]
        if let Some(errno) = self.fail_next_submit.take() {
            return Err(io::Error::from_raw_os_error(errno));
        }

        #[cfg(test)]
        if self.hold_submissions {
            return Ok(0);
        }

        if self.num_unsubmitted_sqes() == 0 {
            return Ok(0);
        }

        match self.ring.submit() {
            Ok(n) => Ok(n),

            // The kernel is busy flushing completions: not an error, the SQEs
            // stay queued and go out on the next attempt.
            Err(e) if matches!(e.raw_os_error(), Some(libc::EBUSY) | Some(libc::EAGAIN)) => Ok(0),

            Err(e) => Err(e),
        }
    }

    pub(crate) fn submit_and_wait(&mut self, num_to_wait: usize) -> io::Result<usize> {
        self.ring.submit_and_wait(num_to_wait)
    }

    /// Move every available completion into the slab. Never blocks.
    pub(crate) fn process_cqes(&mut self, slab: &mut ReadSlab) -> usize {
        let mut num_completed = 0;

        for cqe in self.ring.completion() {
            let key = cqe.user_data() as usize;

            let orphaned = match slab.get_mut(key) {
                Err(e) => {
                    tracing::warn!(error = %e, "CQE user data not found in ReadSlab");
                    continue;
                }
                Ok(read) => match read.state {
                    ReadState::Submitted => {
                        read.on_completion(cqe.result());
                        false
                    }
                    ReadState::Orphaned => true,
                    ReadState::Completed(_) => {
                        tracing::warn!(key, "duplicate completion for read");
                        continue;
                    }
                },
            };

            if orphaned {
                slab.remove(key);
            }

            num_completed += 1;
        }

        num_completed
    }
}

#[cfg(test)]
impl SingleIssuerRing {
    pub(crate) fn hold_submissions(&mut self, hold: bool) {
        self.hold_submissions = hold;
    }

    pub(crate) fn fail_next_submit(&mut self, errno: i32) {
        self.fail_next_submit = Some(errno);
    }
}

impl std::fmt::Debug for SingleIssuerRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleIssuerRing")
            .field("sq_entries", &self.ring.params().sq_entries())
            .finish()
    }
}
