// Public API
pub mod read;
pub use read::{AsyncRead, read_file_async};

pub mod yield_now;
pub use yield_now::{YieldNow, yield_now};
