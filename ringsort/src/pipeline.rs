//! The sort job: one task per input file, each reading, parsing and sorting
//! its file cooperatively, followed by a sequential k-way merge of the runs
//! once the rotation has drained.

use crate::errors::SortError;
use crate::future::{read_file_async, yield_now};
use crate::runtime::{self, Runtime};
use crate::sort::{merge_all, merge_sort, scan_integers};
use crate::task::{self, TaskStats};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

/// What a successful job did.
#[derive(Debug)]
pub struct Summary {
    /// Integers written to the output file.
    pub total: usize,

    /// Per-task statistics, in input order.
    pub stats: Vec<TaskStats>,

    /// Wall time of the cooperative phase.
    pub elapsed: Duration,
}

/// Body of one task: read `path` through the I/O driver, parse its leading
/// integers and sort them.
///
/// A failure aborts the whole rotation. When another task has already failed,
/// the work stops at the next phase boundary with [`SortError::Aborted`].
pub async fn sort_file(path: impl AsRef<Path>, chunk_size: usize) -> Result<Vec<i64>, SortError> {
    let res = sort_file_inner(path, chunk_size).await;
    if matches!(res, Err(ref e) if *e != SortError::Aborted) {
        runtime::abort_rotation();
    }
    res
}

async fn sort_file_inner(path: impl AsRef<Path>, chunk_size: usize) -> Result<Vec<i64>, SortError> {
    bail_if_aborted()?;
    let bytes = read_file_async(path, chunk_size).await?;
    yield_now().await;

    bail_if_aborted()?;
    let mut numbers = scan_integers(&bytes).await;
    drop(bytes);
    yield_now().await;

    bail_if_aborted()?;
    merge_sort(&mut numbers).await;
    tracing::info!(task = %task::id(), len = numbers.len(), "finished sorting");

    Ok(numbers)
}

fn bail_if_aborted() -> Result<(), SortError> {
    if runtime::is_rotation_aborted() {
        return Err(SortError::Aborted);
    }
    Ok(())
}

/// Sort every file in its own task, merge the sorted runs and write them to
/// `output`.
///
/// If any task fails the others abandon their work, the rotation drains and
/// the first real error in input order is returned. `output` is not created.
pub fn sort_and_merge_files<P: AsRef<Path>>(
    runtime: &Runtime,
    inputs: &[P],
    output: impl AsRef<Path>,
) -> Result<Summary, SortError> {
    let chunk_size = runtime.config().chunk_size();
    let report = runtime.run(inputs.iter().map(|path| sort_file(path, chunk_size)));

    for stats in &report.stats {
        tracing::info!(task = %stats.id, "{}", stats);
    }

    let runs = first_failure(report.outputs)?;
    let merged = merge_all(runs);
    write_output(output, &merged)?;

    Ok(Summary {
        total: merged.len(),
        stats: report.stats,
        elapsed: report.elapsed,
    })
}

/// Collect the sorted runs, or the error that aborted the rotation. Tasks that
/// only gave up because of it are skipped over.
fn first_failure(outputs: Vec<Result<Vec<i64>, SortError>>) -> Result<Vec<Vec<i64>>, SortError> {
    let mut runs = Vec::with_capacity(outputs.len());
    let mut aborted = false;

    for output in outputs {
        match output {
            Ok(run) => runs.push(run),
            Err(SortError::Aborted) => aborted = true,
            Err(e) => return Err(e),
        }
    }

    if aborted {
        return Err(SortError::Aborted);
    }
    Ok(runs)
}

/// Write `numbers` to `path`, each followed by a single space.
pub fn write_output(path: impl AsRef<Path>, numbers: &[i64]) -> Result<(), SortError> {
    let path = path.as_ref();
    let to_write_error = |source| SortError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut out = BufWriter::new(File::create(path).map_err(to_write_error)?);
    for n in numbers {
        write!(out, "{n} ").map_err(to_write_error)?;
    }

    out.flush().map_err(to_write_error)
}
