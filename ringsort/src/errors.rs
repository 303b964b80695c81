use std::io;
use std::path::PathBuf;

/// Every way a sort job can fail once the runtime is up. All of them are
/// fatal for the job: the rotation still drains, but no output is written.
#[derive(thiserror::Error, Debug)]
pub enum SortError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {} at offset {offset}: {source}", path.display())]
    Read {
        path: PathBuf,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The I/O driver could not hand the request to the kernel.
    #[error("I/O driver error: {0}")]
    Driver(#[from] io::Error),

    #[error("I/O future polled outside of a ringsort runtime")]
    NoRuntime,

    /// Another task of the rotation failed first; this one gave up its work.
    #[error("sort abandoned after another task failed")]
    Aborted,
}

impl PartialEq for SortError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Open { path: a, source: x }, Self::Open { path: b, source: y }) => {
                a == b && x.kind() == y.kind()
            }
            (
                Self::Read {
                    path: a, offset: o1, ..
                },
                Self::Read {
                    path: b, offset: o2, ..
                },
            ) => a == b && o1 == o2,
            (Self::Write { path: a, .. }, Self::Write { path: b, .. }) => a == b,
            (Self::Driver(a), Self::Driver(b)) => a.kind() == b.kind(),
            (Self::NoRuntime, Self::NoRuntime) => true,
            (Self::Aborted, Self::Aborted) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_mentions_path_and_errno() {
        let err = SortError::Open {
            path: PathBuf::from("/no/such/file"),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };

        assert!(err.to_string().starts_with("failed to open /no/such/file"));
        assert!(err.to_string().ends_with(&io::Error::from_raw_os_error(libc::ENOENT).to_string()));
        assert_ne!(err, SortError::Aborted);
    }
}
