use anyhow::Result;
use clap::Parser;
use ringsort::runtime::DEFAULT_CHUNK_SIZE;
use ringsort::{Builder, IoBackend, sort_and_merge_files};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Sort integer files cooperatively and merge them into one sorted file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files of whitespace separated integers.
    #[arg(required = true, num_args = 1..)]
    files: Vec<PathBuf>,

    /// Where the merged result is written.
    #[arg(short, long, default_value = "result.txt")]
    output: PathBuf,

    /// Size of each read request, in bytes.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    chunk_size: usize,

    #[arg(long, value_enum, default_value_t = IoBackend::Auto)]
    io_backend: IoBackend,
}

fn parse_chunk_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("chunk size must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn initialize_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Avoid panicking if a subscriber was already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .try_init();
}

fn main() -> Result<()> {
    let started = Instant::now();
    let args = Args::parse();
    initialize_logger();

    let runtime = Builder::new_local()
        .chunk_size(args.chunk_size)
        .io_backend(args.io_backend)
        .try_build()?;
    tracing::debug!(
        backend = ?runtime.io_backend(),
        chunk_size = runtime.config().chunk_size(),
        sq_ring_size = runtime.config().sq_ring_size(),
        "runtime ready"
    );

    let summary = sort_and_merge_files(&runtime, &args.files, &args.output)?;
    tracing::info!(
        total = summary.total,
        output = %args.output.display(),
        "merged {} files",
        args.files.len()
    );

    drop(runtime);
    tracing::info!("program ran for {} us", started.elapsed().as_micros());
    Ok(())
}
