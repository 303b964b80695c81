use std::io::{self, Write};
use std::pin::pin;
use std::task::{Context, Poll, Waker};
use tempfile::NamedTempFile;

/// Poll `fut` to completion outside of any runtime, counting how many times it
/// returned `Pending` along the way.
pub(crate) fn poll_counting<F: Future>(fut: F) -> (F::Output, usize) {
    let mut fut = pin!(fut);
    let mut cx = Context::from_waker(Waker::noop());
    let mut pendings = 0;

    loop {
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(output) => return (output, pendings),
            Poll::Pending => pendings += 1,
        }
    }
}

pub(crate) fn write_tempfile(contents: &[u8]) -> io::Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new()?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    Ok(tmp)
}

/// Temp file holding `numbers` in the output format: each one followed by a
/// single space.
pub(crate) fn numbers_file(numbers: &[i64]) -> io::Result<NamedTempFile> {
    write_tempfile(format_numbers(numbers).as_bytes())
}

pub(crate) fn format_numbers(numbers: &[i64]) -> String {
    numbers.iter().map(|n| format!("{n} ")).collect()
}

/// Deterministic pseudo-random integers, good enough to shuffle test inputs.
pub(crate) fn lcg_numbers(seed: u64, len: usize) -> Vec<i64> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as i64 % 10_000) - 5_000
        })
        .collect()
}
