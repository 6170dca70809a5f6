// src/export.rs
//
// Append-only JSON-lines sink for message excerpts.

use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::message::MessageExcerpt;

/// A sink whose written bytes can be forced to stable storage.
pub trait DurableWrite: Write {
    fn sync(&mut self) -> io::Result<()>;
}

impl DurableWrite for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// In-memory sinks have nothing to sync.
impl DurableWrite for Vec<u8> {
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes one excerpt per line to an append-only sink.
pub struct ExportWriter<W: Write> {
    sink: W,
    path: PathBuf,
    written: usize,
}

impl ExportWriter<File> {
    /// Open `path` for appending, creating it if absent. Never truncates.
    pub fn open(path: &Path) -> Result<Self> {
        debug!("Opening output sink {}", path.display());

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let file = options.open(path).map_err(|source| Error::Sink {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file, path))
    }
}

impl<W: Write> ExportWriter<W> {
    /// Wrap an arbitrary writer; `path` is only used in diagnostics.
    pub fn new(sink: W, path: &Path) -> Self {
        Self {
            sink,
            path: path.to_path_buf(),
            written: 0,
        }
    }

    /// Serialize `excerpt` and append it as a single flushed line.
    pub fn append(&mut self, excerpt: &MessageExcerpt) -> Result<()> {
        let mut line = serde_json::to_vec(excerpt).map_err(|e| self.sink_error(e.into()))?;
        line.push(b'\n');

        self.sink
            .write_all(&line)
            .and_then(|_| self.sink.flush())
            .map_err(|e| self.sink_error(e))?;

        self.written += 1;
        debug!("Exported {} to {}", excerpt.id(), self.path.display());
        Ok(())
    }

    /// Number of excerpts appended through this writer.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn sink_error(&self, source: io::Error) -> Error {
        Error::Sink {
            path: self.path.clone(),
            source,
        }
    }
}

impl<W: DurableWrite> ExportWriter<W> {
    /// Flush and force every appended line to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.sink
            .flush()
            .and_then(|_| self.sink.sync())
            .map_err(|e| self.sink_error(e))?;
        debug!("Synced {} excerpts to {}", self.written, self.path.display());
        Ok(())
    }
}
