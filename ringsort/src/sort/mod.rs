//! Sorting stages of a job: turning a file's bytes into integers, sorting them
//! cooperatively inside a task, then merging every task's run once the
//! rotation has drained.

pub mod kway;
pub use kway::merge_all;

pub mod merge_sort;
pub use merge_sort::merge_sort;

pub mod scan;
pub use scan::scan_integers;
