//! Process-wide logging: stderr plus a size-capped rotating file.
//!
//! The filter comes from the `LOG_LEVEL` environment variable (an
//! `EnvFilter` expression, default `info`). tracing-subscriber has no
//! size-based rotation, so the file sink is a small writer that renames
//! `name` → `name.1` → … → `name.4` when the cap is hit.
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const RETENTION: usize = 5;

struct Inner {
    file: File,
    written: u64,
}

pub struct RotatingFile {
    path: PathBuf,
    max_size: u64,
    inner: Mutex<Inner>,
}

fn numbered(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

impl RotatingFile {
    pub fn open(path: &Path, max_size: u64) -> io::Result<Arc<RotatingFile>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();
        Ok(Arc::new(RotatingFile {
            path: path.to_path_buf(),
            max_size,
            inner: Mutex::new(Inner { file, written }),
        }))
    }

    fn rotate(&self, inner: &mut Inner) -> io::Result<()> {
        for index in (1..RETENTION - 1).rev() {
            let from = numbered(&self.path, index);
            if from.exists() {
                let _ = fs::rename(&from, numbered(&self.path, index + 1));
            }
        }
        let _ = fs::rename(&self.path, numbered(&self.path, 1));
        inner.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        inner.written = 0;
        Ok(())
    }
}

/// Per-write handle handed to the fmt layer.
pub struct Writer(Arc<RotatingFile>);

impl Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let target = &self.0;
        let mut inner = match target.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.written + buf.len() as u64 > target.max_size {
            target.rotate(&mut inner)?;
        }
        let n = inner.file.write(buf)?;
        inner.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut inner = match self.0.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.file.flush()
    }
}

/// Install the global subscriber. Call once, early in main.
pub fn init(logfile: &Path, max_size: u64) -> io::Result<()> {
    let filter =
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    let file = RotatingFile::open(logfile, max_size)?;
    let file_writer = move || Writer(file.clone());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    Ok(())
}
