use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MAX_LOG_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// `RUST_LOG` wins over the command-line level when set.
fn build_filter(log_level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()))
}

pub fn init_logging(log_level: Level, log_file: Option<&str>) {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_filter(build_filter(log_level));

    let file_layer = log_file.map(|path| {
        let capped = CappedLogFile::new(PathBuf::from(path), MAX_LOG_FILE_BYTES);
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(move || capped.clone())
            .with_filter(build_filter(log_level))
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();
}

/// Append-only log file that keeps its newest half once it grows past `max_len`.
#[derive(Clone)]
struct CappedLogFile {
    path: PathBuf,
    max_len: u64,
    lock: Arc<Mutex<()>>,
}

impl CappedLogFile {
    fn new(path: PathBuf, max_len: u64) -> Self {
        Self {
            path,
            max_len,
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn trim_if_needed(&self) -> io::Result<()> {
        let size = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };
        if size < self.max_len {
            return Ok(());
        }

        let keep = self.max_len / 2;
        let mut tail = Vec::new();
        let mut rf = OpenOptions::new().read(true).open(&self.path)?;
        rf.seek(SeekFrom::Start(size.saturating_sub(keep)))?;
        rf.read_to_end(&mut tail)?;

        let mut wf = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        wf.write_all(&tail)
    }
}

impl Write for CappedLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.trim_if_needed()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
