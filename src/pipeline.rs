//! Stage chaining and the per-task error policy.
//!
//! A task assembles a chain of [`Stage`]s and feeds it file records with
//! [`run_chain`]. Each stage is a pure record transform; side effects live
//! only in [`Dest`], the writer stage. The error policy is uniform across
//! tasks: a failing record is logged and dropped, the remaining records
//! keep flowing, and the task reports failure at the end so the build exits
//! non-zero.

use crate::record::{Contents, FileRecord, TransformError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{failed} file(s) failed in task '{task}'")]
    RecordsFailed { task: &'static str, failed: usize },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// What a stage produced for one input record.
#[derive(Debug)]
pub enum StageOutput {
    /// One record continues down the chain (possibly the input, modified).
    One(FileRecord),
    /// Fan-out: several records continue (e.g. converter keeping the
    /// original alongside a converted copy).
    Many(Vec<FileRecord>),
    /// The record was consumed (buffered for `flush`, or dropped).
    Consumed,
}

/// One step in a task chain.
pub trait Stage {
    /// Short name used in error reporting.
    fn name(&self) -> &'static str;

    fn apply(&mut self, record: FileRecord) -> Result<StageOutput, TransformError>;

    /// Called once after the last record; buffering stages emit here.
    fn flush(&mut self) -> Result<Vec<FileRecord>, TransformError> {
        Ok(Vec::new())
    }
}

/// Writer stage: persists buffered records under a destination root and
/// passes them through unchanged so later stages can keep transforming.
pub struct Dest {
    root: PathBuf,
}

impl Dest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Stage for Dest {
    fn name(&self) -> &'static str {
        "dest"
    }

    fn apply(&mut self, record: FileRecord) -> Result<StageOutput, TransformError> {
        if let Contents::Buffer(bytes) = &record.contents {
            let target = self.root.join(&record.path);
            let write = || -> io::Result<()> {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, bytes)
            };
            write().map_err(|e| TransformError::new("dest", &record.path, e))?;
        }
        Ok(StageOutput::One(record))
    }
}

/// Feed records through `stages` in order, applying the shared error
/// policy: a record that fails any stage is logged (`Error at {task}...`)
/// and dropped, other records continue, and the task returns `Err` when
/// anything failed.
pub fn run_chain(
    task: &'static str,
    inputs: Vec<FileRecord>,
    stages: &mut [Box<dyn Stage + '_>],
) -> Result<(), PipelineError> {
    let mut failed = 0usize;

    let mut queue = inputs;
    for stage in stages.iter_mut() {
        let mut next = Vec::with_capacity(queue.len());
        for record in queue {
            match stage.apply(record) {
                Ok(StageOutput::One(rec)) => next.push(rec),
                Ok(StageOutput::Many(recs)) => next.extend(recs),
                Ok(StageOutput::Consumed) => {}
                Err(err) => {
                    eprintln!("Error at {task}... {err}");
                    failed += 1;
                }
            }
        }
        match stage.flush() {
            Ok(recs) => next.extend(recs),
            Err(err) => {
                eprintln!("Error at {task}... {err}");
                failed += 1;
            }
        }
        // Flushed records still pass through the remaining stages, so a
        // sprite builder's output reaches the writer.
        queue = next;
    }

    if failed > 0 {
        Err(PipelineError::RecordsFailed { task, failed })
    } else {
        Ok(())
    }
}

/// Read each path into a record whose record-path is relative to `base`.
pub fn read_records(base: &Path, paths: &[PathBuf]) -> io::Result<Vec<FileRecord>> {
    let mut records = Vec::with_capacity(paths.len());
    for abs in paths {
        let rel = abs.strip_prefix(base).unwrap_or(abs).to_path_buf();
        records.push(FileRecord::read(rel, abs)?);
    }
    Ok(records)
}
