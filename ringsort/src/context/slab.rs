use slab::Slab;
use std::fs::File;
use std::io::{self, Error, ErrorKind};
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

#[derive(Debug)]
pub(crate) enum ReadState {
    /// Handed to the backend, completion not observed yet.
    Submitted,

    /// Completion observed, waiting for the owning task to pick it up.
    Completed(io::Result<usize>),

    /// Owner went away while the kernel still holds the buffer. Removed as soon
    /// as the completion arrives.
    Orphaned,
}

/// One in-flight chunk read. The entry owns the chunk buffer and keeps the file
/// open until the read has completed.
#[derive(Debug)]
pub(crate) struct InflightRead {
    pub(crate) file: Rc<File>,
    pub(crate) offset: u64,
    pub(crate) buf: Vec<u8>,
    pub(crate) state: ReadState,
}

impl InflightRead {
    pub(crate) fn new(file: Rc<File>, offset: u64, len: usize) -> Self {
        Self {
            file,
            offset,
            buf: vec![0u8; len],
            state: ReadState::Submitted,
        }
    }

    /// Record the raw completion result, following the kernel convention of
    /// negative errno on failure.
    pub(crate) fn on_completion(&mut self, res: i32) {
        let res = if res < 0 {
            Err(Error::from_raw_os_error(-res))
        } else {
            Ok(res as usize)
        };
        self.state = ReadState::Completed(res);
    }

    pub(crate) fn is_pending(&self) -> bool {
        matches!(self.state, ReadState::Submitted | ReadState::Orphaned)
    }

    /// Consume a completed entry into the bytes that were actually read.
    pub(crate) fn into_chunk(self) -> io::Result<Vec<u8>> {
        match self.state {
            ReadState::Completed(res) => {
                let read = res?;
                let mut buf = self.buf;
                buf.truncate(read);
                Ok(buf)
            }
            state => Err(Error::other(format!(
                "read consumed in unexpected state: {:?}",
                state
            ))),
        }
    }
}

/// Slab of in-flight reads. The slab key is the `user_data` of the matching
/// io_uring submission.
#[derive(Debug)]
pub(crate) struct ReadSlab {
    slab: Slab<InflightRead>,
}

impl ReadSlab {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slab: Slab::with_capacity(capacity),
        }
    }

    pub(crate) fn get_mut(&mut self, key: usize) -> io::Result<&mut InflightRead> {
        self.slab.get_mut(key).ok_or_else(|| {
            Error::new(
                ErrorKind::NotFound,
                format!("Key {:?} not found in slab.", key),
            )
        })
    }

    pub(crate) fn num_pending(&self) -> usize {
        self.slab.iter().filter(|(_, read)| read.is_pending()).count()
    }
}

#[doc(hidden)]
impl Deref for ReadSlab {
    type Target = Slab<InflightRead>;

    fn deref(&self) -> &Self::Target {
        &self.slab
    }
}

#[doc(hidden)]
impl DerefMut for ReadSlab {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.slab
    }
}
