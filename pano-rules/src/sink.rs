//! NDJSON output: one JSON object per line, staged next to the final path.
//!
//! Records are written to `<output>.partial` and the file is renamed into
//! place only after the last record was flushed, so an interrupted run never
//! leaves a truncated file under the final name.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open {path} for writing: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write record: {0}")]
    Write(#[from] io::Error),
    #[error("failed to move {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes serializable records as newline-delimited JSON.
pub struct NdjsonSink<W: Write> {
    writer: W,
    records: usize,
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, records: 0 }
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Output file being written under its `.partial` name.
pub struct PendingOutput {
    target: PathBuf,
    partial: PathBuf,
    sink: NdjsonSink<BufWriter<File>>,
}

impl PendingOutput {
    /// Create parent directories and open the staging file.
    pub fn create(target: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SinkError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let partial = partial_path(target);
        let file = File::create(&partial).map_err(|source| SinkError::Open {
            path: partial.clone(),
            source,
        })?;
        Ok(Self {
            target: target.to_path_buf(),
            partial,
            sink: NdjsonSink::new(BufWriter::new(file)),
        })
    }

    pub fn sink(&mut self) -> &mut NdjsonSink<BufWriter<File>> {
        &mut self.sink
    }

    /// Flush and move the staging file to the final path.
    pub fn commit(self) -> Result<PathBuf, SinkError> {
        let mut writer = self.sink.into_inner();
        writer.flush()?;
        let file = writer.into_inner().map_err(|err| err.into_error())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.partial, &self.target).map_err(|source| SinkError::Rename {
            from: self.partial.clone(),
            to: self.target.clone(),
            source,
        })?;
        Ok(self.target)
    }

    /// Remove the staging file after a failed run.
    pub fn discard(self) {
        let partial = self.partial;
        drop(self.sink);
        if let Err(err) = fs::remove_file(&partial) {
            tracing::debug!(path = %partial.display(), %err, "could not remove partial output");
        }
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}
