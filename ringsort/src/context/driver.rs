use crate::context::slab::{InflightRead, ReadState};
use crate::context::{ReadSlab, SingleIssuerRing};
use crate::runtime::{IoBackend, RuntimeConfig};
use anyhow::{Context as _, Result};
use io_uring::opcode::Read;
use io_uring::types::Fd;
use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileExt;
use std::rc::Rc;

/// Turns chunk read requests into completions that tasks observe by polling.
///
/// With io_uring the read is handed to the kernel straight away and its
/// completion is reaped on a later poll. The positional backend performs the
/// read on the first poll after submission, so a request is always outstanding
/// across at least one turn of the rotation either way.
#[derive(Debug)]
pub(crate) struct Driver {
    // Declared before the slab: buffers must outlive the ring.
    ring: Option<SingleIssuerRing>,
    slab: ReadSlab,
}

impl Driver {
    pub(crate) fn try_new(cfg: &RuntimeConfig) -> Result<Self> {
        let ring = match cfg.io_backend {
            IoBackend::Blocking => None,
            IoBackend::Uring => Some(
                SingleIssuerRing::try_new(cfg).context("failed to set up io_uring backend")?,
            ),
            IoBackend::Auto => match SingleIssuerRing::try_new(cfg) {
                Ok(ring) => Some(ring),
                Err(e) => {
                    tracing::warn!(error = %e, "io_uring unavailable, falling back to positional reads");
                    None
                }
            },
        };

        Ok(Self {
            ring,
            slab: ReadSlab::new(cfg.sq_ring_size),
        })
    }

    /// Backend actually in use, `Auto` resolved.
    pub(crate) fn backend(&self) -> IoBackend {
        match self.ring {
            Some(_) => IoBackend::Uring,
            None => IoBackend::Blocking,
        }
    }

    /// Number of reads the driver still holds, completed or not.
    pub(crate) fn inflight(&self) -> usize {
        self.slab.len()
    }

    /// Queue a read of `len` bytes at `offset`. Returns the key to poll with,
    /// or `None` if the submission queue is full and the caller should retry
    /// after yielding.
    pub(crate) fn submit_read(
        &mut self,
        file: &Rc<File>,
        offset: u64,
        len: usize,
    ) -> io::Result<Option<usize>> {
        let key = self
            .slab
            .insert(InflightRead::new(Rc::clone(file), offset, len));

        let Some(ring) = self.ring.as_mut() else {
            return Ok(Some(key));
        };

        let read = self.slab.get_mut(key)?;
        let entry = Read::new(
            Fd(read.file.as_raw_fd()),
            read.buf.as_mut_ptr(),
            read.buf.len() as u32,
        )
        .offset(offset)
        .build()
        .user_data(key as u64);

        if ring.push(&entry).is_err() {
            // Make room by flushing what is queued, then try once more.
            let flushed = ring.submit_no_wait();
            if flushed.is_err() || ring.push(&entry).is_err() {
                // Never queued, the kernel has not seen this buffer.
                self.slab.remove(key);
                return flushed.map(|_| None);
            }
        }

        if let Err(e) = ring.submit_no_wait() {
            // The SQE stays queued and goes out with a later submission.
            self.release(key);
            return Err(e);
        }

        Ok(Some(key))
    }

    /// Check on a read. Returns `None` while it is still outstanding; once a
    /// result is returned the key is released.
    pub(crate) fn poll_read(&mut self, key: usize) -> Option<io::Result<Vec<u8>>> {
        match self.ring.as_mut() {
            Some(ring) => {
                if let Err(e) = ring.submit_no_wait() {
                    self.release(key);
                    return Some(Err(e));
                }
                ring.process_cqes(&mut self.slab);
            }
            None => {
                if let Ok(read) = self.slab.get_mut(key)
                    && matches!(read.state, ReadState::Submitted)
                {
                    let res = read.file.read_at(&mut read.buf, read.offset);
                    read.state = ReadState::Completed(res);
                }
            }
        }

        let completed = match self.slab.get_mut(key) {
            Ok(read) => matches!(read.state, ReadState::Completed(_)),
            Err(e) => return Some(Err(e)),
        };

        completed.then(|| self.slab.remove(key).into_chunk())
    }

    /// Give up on a read. If the kernel may still write into its buffer the
    /// entry is kept as an orphan until the completion shows up.
    pub(crate) fn release(&mut self, key: usize) {
        let orphan = self.ring.is_some()
            && self
                .slab
                .get(key)
                .is_some_and(|read| matches!(read.state, ReadState::Submitted));

        if orphan {
            if let Ok(read) = self.slab.get_mut(key) {
                read.state = ReadState::Orphaned;
            }
        } else {
            self.slab.try_remove(key);
        }
    }

    /// Block until the kernel has completed every submitted read.
    pub(crate) fn drain(&mut self) -> io::Result<()> {
        let Some(ring) = self.ring.as_mut() else {
            return Ok(());
        };

        loop {
            let pending = self.slab.num_pending();
            if pending == 0 {
                return Ok(());
            }

            ring.submit_and_wait(1)?;
            ring.process_cqes(&mut self.slab);
        }
    }
}

#[cfg(test)]
impl Driver {
    pub(crate) fn hold_submissions(&mut self, hold: bool) {
        if let Some(ring) = self.ring.as_mut() {
            ring.hold_submissions(hold);
        }
    }

    pub(crate) fn fail_next_submit(&mut self, errno: i32) {
        if let Some(ring) = self.ring.as_mut() {
            ring.fail_next_submit(errno);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_tempfile;
    use anyhow::Result;

    fn blocking_driver() -> Result<Driver> {
        let cfg = RuntimeConfig {
            io_backend: IoBackend::Blocking,
            ..RuntimeConfig::default()
        };
        Driver::try_new(&cfg)
    }

    #[test]
    fn test_positional_read_completes_on_first_poll() -> Result<()> {
        let tmp = write_tempfile(b"hello world")?;
        let file = Rc::new(tmp.reopen()?);
        let mut driver = blocking_driver()?;
        assert_eq!(driver.backend(), IoBackend::Blocking);

        let key = driver.submit_read(&file, 6, 16)?.expect("slab has room");
        assert_eq!(driver.inflight(), 1);

        let chunk = driver.poll_read(key).expect("completed")?;
        assert_eq!(chunk, b"world");
        assert_eq!(driver.inflight(), 0);
        Ok(())
    }

    #[test]
    fn test_positional_release_frees_entry() -> Result<()> {
        let tmp = write_tempfile(b"abc")?;
        let file = Rc::new(tmp.reopen()?);
        let mut driver = blocking_driver()?;

        let key = driver.submit_read(&file, 0, 8)?.expect("slab has room");
        driver.release(key);
        assert_eq!(driver.inflight(), 0);
        Ok(())
    }

    /// `None` when the kernel or sandbox has no io_uring.
    fn uring_driver(sq_ring_size: usize) -> Result<Option<Driver>> {
        let cfg = RuntimeConfig {
            sq_ring_size,
            ..RuntimeConfig::default()
        };
        let driver = Driver::try_new(&cfg)?;
        Ok((driver.backend() == IoBackend::Uring).then_some(driver))
    }

    fn wait_for(driver: &mut Driver, key: usize) -> io::Result<Vec<u8>> {
        loop {
            if let Some(res) = driver.poll_read(key) {
                return res;
            }
            std::thread::yield_now();
        }
    }

    #[test]
    fn test_full_sq_is_not_an_error() -> Result<()> {
        let Some(mut driver) = uring_driver(2)? else {
            return Ok(());
        };

        let tmp = write_tempfile(b"abcdefgh")?;
        let file = Rc::new(tmp.reopen()?);

        driver.hold_submissions(true);
        let first = driver.submit_read(&file, 0, 4)?.expect("sq has room");
        let second = driver.submit_read(&file, 4, 4)?.expect("sq has room");

        assert_eq!(driver.submit_read(&file, 0, 8)?, None);
        assert_eq!(driver.inflight(), 2);

        driver.hold_submissions(false);
        assert_eq!(wait_for(&mut driver, first)?, b"abcd");
        assert_eq!(wait_for(&mut driver, second)?, b"efgh");
        assert_eq!(driver.inflight(), 0);
        Ok(())
    }

    #[test]
    fn test_failed_poll_keeps_submitted_buffer() -> Result<()> {
        let Some(mut driver) = uring_driver(4)? else {
            return Ok(());
        };

        let tmp = write_tempfile(b"0123456789")?;
        let file = Rc::new(tmp.reopen()?);
        let key = driver.submit_read(&file, 0, 10)?.expect("sq has room");

        driver.fail_next_submit(libc::EIO);
        let err = driver.poll_read(key).expect("error reported").unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EIO));

        // The kernel may still be writing into the chunk: it stays in the
        // slab as an orphan until its completion is reaped.
        assert_eq!(driver.inflight(), 1);
        assert!(matches!(driver.slab.get(key), Some(read) if matches!(read.state, ReadState::Orphaned)));

        driver.drain()?;
        assert_eq!(driver.inflight(), 0);
        Ok(())
    }

    #[test]
    fn test_failed_submit_keeps_queued_buffer() -> Result<()> {
        let Some(mut driver) = uring_driver(4)? else {
            return Ok(());
        };

        let tmp = write_tempfile(b"0123456789")?;
        let file = Rc::new(tmp.reopen()?);

        driver.fail_next_submit(libc::EIO);
        let err = driver.submit_read(&file, 0, 10).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EIO));

        // Queued in the SQ, so the entry outlives the error.
        assert_eq!(driver.inflight(), 1);
        driver.drain()?;
        assert_eq!(driver.inflight(), 0);
        Ok(())
    }

    #[test]
    fn test_uring_read_when_available() -> Result<()> {
        let cfg = RuntimeConfig::default();
        let mut driver = Driver::try_new(&cfg)?;
        if driver.backend() != IoBackend::Uring {
            // Kernel or sandbox without io_uring, nothing to exercise here.
            return Ok(());
        }

        let tmp = write_tempfile(b"0123456789")?;
        let file = Rc::new(tmp.reopen()?);
        let key = driver.submit_read(&file, 2, 4)?.expect("sq has room");

        let chunk = loop {
            if let Some(res) = driver.poll_read(key) {
                break res?;
            }
            std::thread::yield_now();
        };

        assert_eq!(chunk, b"2345");
        driver.drain()?;
        assert_eq!(driver.inflight(), 0);
        Ok(())
    }
}
