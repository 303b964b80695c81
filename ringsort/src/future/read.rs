use crate::context;
use crate::errors::SortError;
use crate::future::{YieldNow, yield_now};
use crate::runtime::YieldReason;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Chunked, poll-based read of a whole file.
///
/// Reads are issued one chunk at a time at `byte_offset`. While a chunk is in
/// flight the request belongs to the runtime's I/O driver; once its completion
/// has been observed the bytes are appended to `buffer`, which only the owning
/// task ever touches.
#[derive(Debug)]
pub struct AsyncRead {
    path: PathBuf,
    file: Rc<File>,
    chunk_size: usize,
    byte_offset: u64,
    pending_chunk_size: usize,
    buffer: Vec<u8>,

    /// Driver key of the outstanding request, if any.
    inflight: Option<usize>,
}

impl AsyncRead {
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self, SortError> {
        assert!(chunk_size > 0, "chunk_size must be greater than 0");

        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| SortError::Open {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            file: Rc::new(file),
            chunk_size,
            byte_offset: 0,
            pending_chunk_size: chunk_size,
            buffer: Vec::with_capacity(chunk_size),
            inflight: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    pub fn is_outstanding(&self) -> bool {
        self.inflight.is_some()
    }

    /// Hand the next chunk request to the driver. Returns `false` when the
    /// submission queue is full; the caller should yield and try again.
    pub fn issue(&mut self) -> Result<bool, SortError> {
        assert!(!self.is_outstanding(), "a chunk read is already in flight");

        let key = context::with_driver_mut(|driver| {
            driver.submit_read(&self.file, self.byte_offset, self.pending_chunk_size)
        })??;

        self.inflight = key;
        Ok(key.is_some())
    }

    /// Check whether the outstanding chunk has completed. On completion the
    /// bytes are appended and the number read is returned; zero means end of
    /// file.
    pub fn try_complete(&mut self) -> Result<Option<usize>, SortError> {
        let Some(key) = self.inflight else {
            return Ok(None);
        };

        let chunk = match context::with_driver_mut(|driver| driver.poll_read(key))? {
            None => return Ok(None),
            Some(res) => {
                self.inflight = None;
                res.map_err(|source| SortError::Read {
                    path: self.path.clone(),
                    offset: self.byte_offset,
                    source,
                })?
            }
        };

        let read = chunk.len();
        if read > 0 {
            self.append(&chunk);
        }

        Ok(Some(read))
    }

    fn append(&mut self, chunk: &[u8]) {
        let end = self.buffer.len() + chunk.len();

        // Grow to the next chunk boundary so a short read does not force a
        // reallocation on every following chunk.
        let boundary = end.next_multiple_of(self.chunk_size);
        if self.buffer.capacity() < boundary {
            self.buffer.reserve_exact(boundary - self.buffer.len());
        }

        self.buffer.extend_from_slice(chunk);
        self.byte_offset += chunk.len() as u64;

        // Keep requests aligned on chunk boundaries after a short read.
        self.pending_chunk_size = self.chunk_size - (self.byte_offset as usize % self.chunk_size);
    }

    pub fn into_buffer(mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }
}

impl Drop for AsyncRead {
    fn drop(&mut self) {
        if let Some(key) = self.inflight.take() {
            // The driver keeps the chunk alive until the kernel is done with it.
            let _ = context::with_driver_mut(|driver| driver.release(key));
        }
    }
}

/// Read a whole file through the runtime's I/O driver, yielding between every
/// step and for as long as a chunk is outstanding.
///
/// The returned buffer is byte-for-byte the file's contents.
pub async fn read_file_async(
    path: impl AsRef<Path>,
    chunk_size: usize,
) -> Result<Vec<u8>, SortError> {
    let mut op = AsyncRead::open(path, chunk_size)?;
    yield_now().await;

    loop {
        while !op.issue()? {
            YieldNow::new(YieldReason::SqRingFull).await;
        }

        let read = loop {
            YieldNow::new(YieldReason::AwaitingIo).await;
            if let Some(read) = op.try_complete()? {
                break read;
            }
        };
        yield_now().await;

        if read == 0 {
            return Ok(op.into_buffer());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Builder, IoBackend};
    use crate::test_utils::{numbers_file, write_tempfile};
    use anyhow::Result;
    use rstest::rstest;

    #[rstest]
    #[case::empty(0, 1024)]
    #[case::one_byte(1, 1024)]
    #[case::just_under_chunk(1023, 1024)]
    #[case::exact_chunk(1024, 1024)]
    #[case::just_over_chunk(1025, 1024)]
    #[case::many_small_chunks(5000, 7)]
    fn test_read_matches_whole_file_read(
        #[case] size: usize,
        #[case] chunk_size: usize,
        #[values(IoBackend::Blocking, IoBackend::Auto)] backend: IoBackend,
    ) -> Result<()> {
        let contents: Vec<u8> = (0..size).map(|i| b'0' + (i % 10) as u8).collect();
        let tmp = write_tempfile(&contents)?;

        let runtime = Builder::new_local().io_backend(backend).try_build()?;
        let buffer = runtime.block_on(read_file_async(tmp.path(), chunk_size))?;

        assert_eq!(buffer, std::fs::read(tmp.path())?);
        assert_eq!(buffer, contents);
        Ok(())
    }

    #[test]
    fn test_reread_is_idempotent() -> Result<()> {
        let tmp = numbers_file(&[5, -3, 12, 0, 99])?;
        let runtime = Builder::new_local().try_build()?;

        let first = runtime.block_on(read_file_async(tmp.path(), 4))?;
        let second = runtime.block_on(read_file_async(tmp.path(), 4))?;

        assert_eq!(first, second);
        assert_eq!(first, std::fs::read(tmp.path())?);
        Ok(())
    }

    #[test]
    fn test_read_missing_file_is_open_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("missing.txt");

        let runtime = Builder::new_local().try_build()?;
        let res = runtime.block_on(read_file_async(&missing, 1024));

        assert!(matches!(
            res,
            Err(SortError::Open { ref path, .. }) if *path == missing
        ));
        Ok(())
    }

    #[test]
    fn test_read_outside_runtime_has_no_driver() -> Result<()> {
        let tmp = write_tempfile(b"1 2 3")?;
        let mut op = AsyncRead::open(tmp.path(), 16)?;

        assert_eq!(op.issue(), Err(SortError::NoRuntime));
        assert!(!op.is_outstanding());
        Ok(())
    }

    #[test]
    fn test_read_stays_outstanding_until_polled() -> Result<()> {
        let tmp = write_tempfile(b"10 20 30")?;
        let runtime = Builder::new_local()
            .io_backend(IoBackend::Blocking)
            .try_build()?;

        runtime.block_on(async {
            let mut op = AsyncRead::open(tmp.path(), 4)?;
            assert!(op.issue()?);
            assert!(op.is_outstanding());

            assert_eq!(op.try_complete()?, Some(4));
            assert!(!op.is_outstanding());
            assert_eq!(op.byte_offset(), 4);

            assert!(op.issue()?);
            assert_eq!(op.try_complete()?, Some(4));
            assert!(op.issue()?);
            assert_eq!(op.try_complete()?, Some(0));
            assert_eq!(op.into_buffer(), b"10 20 30");
            Ok::<_, SortError>(())
        })?;

        Ok(())
    }

    #[test]
    fn test_full_submission_queue_is_retried() -> Result<()> {
        let tmp = numbers_file(&[8, 6, 7, 5, 3, 0, 9])?;
        let runtime = Builder::new_local().sq_ring_size(1).try_build()?;
        if runtime.io_backend() != IoBackend::Uring {
            return Ok(());
        }

        // Take the only SQ slot with a read the kernel does not see yet.
        let filler_file = Rc::new(File::open(tmp.path())?);
        let filler = context::with_driver_mut(|driver| {
            driver.hold_submissions(true);
            driver.submit_read(&filler_file, 0, 1)
        })??
        .expect("sq has room");

        let path = tmp.path();
        let report = runtime.run((0..2).map(|i| async move {
            if i == 0 {
                let mut op = AsyncRead::open(path, 4)?;
                assert!(!op.issue()?, "sq should be full");
                assert!(!op.is_outstanding());
                drop(op);

                return read_file_async(path, 4).await;
            }

            for _ in 0..5 {
                yield_now().await;
            }
            context::with_driver_mut(|driver| driver.hold_submissions(false))?;
            Ok(Vec::new())
        }));

        let [buffer, _] = <[_; 2]>::try_from(report.outputs)
            .map_err(|_| anyhow::anyhow!("two tasks"))?;
        assert_eq!(buffer?, std::fs::read(tmp.path())?);

        let filled = runtime.block_on(async {
            loop {
                if let Some(res) = context::with_driver_mut(|driver| driver.poll_read(filler))? {
                    break res.map_err(SortError::from);
                }
                yield_now().await;
            }
        })?;
        assert_eq!(filled, b"8");
        Ok(())
    }

    #[test]
    fn test_dropping_inflight_read_releases_driver_entry() -> Result<()> {
        let tmp = write_tempfile(&[b'7'; 4096])?;
        let runtime = Builder::new_local().try_build()?;

        runtime.block_on(async {
            let mut op = AsyncRead::open(tmp.path(), 1024)?;
            assert!(op.issue()?);
            drop(op);
            Ok::<_, SortError>(())
        })?;

        // Orphans are reclaimed as soon as their completion shows up.
        runtime.drain_io()?;
        assert_eq!(runtime.inflight_reads(), 0);
        Ok(())
    }
}
