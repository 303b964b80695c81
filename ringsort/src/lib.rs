//! Cooperative, single-threaded sorting of integer files.
//!
//! Every input file gets its own task. Tasks take strict round-robin turns on
//! one thread, giving up their turn at every step of reading, parsing and
//! sorting, with file reads served by io_uring when the kernel allows it. Once
//! every task has produced its sorted run the runs are merged into one output.

mod context;

pub mod errors;
pub use errors::SortError;

pub mod future;
pub use future::{read_file_async, yield_now};

pub mod pipeline;
pub use pipeline::{Summary, sort_and_merge_files};

pub mod runtime;
pub use runtime::{Builder, IoBackend, Runtime};

pub mod sort;

pub mod task;

mod utils;

#[cfg(test)]
mod test_utils;
