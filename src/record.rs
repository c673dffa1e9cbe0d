//! The pipeline's unit of data: a file record with an in-memory body.
//!
//! Every transform stage receives a [`FileRecord`], owns it exclusively for
//! the duration of its work, and hands ownership to the next stage. The
//! record's `path` is always *relative* to the tree it was read from, so a
//! destination writer can re-root it under `dist/` without path surgery.
//!
//! [`normalize`] is the shared front door of every transform: null records
//! and directories short-circuit (passed through untouched, never entering
//! transform logic), and streaming bodies are rejected outright — no stage
//! in this pipeline works incrementally.

use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A transform failure, tagged with the transform that raised it and the
/// file it was processing.
#[derive(Error, Debug)]
#[error("[{plugin}] {message} (file: {})", path.display())]
pub struct TransformError {
    pub plugin: &'static str,
    pub path: PathBuf,
    pub message: String,
}

impl TransformError {
    pub fn new(plugin: &'static str, path: &Path, message: impl fmt::Display) -> Self {
        Self {
            plugin,
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Body of a file record.
///
/// `Stream` exists so that an upstream source handing us a lazy reader is a
/// *detectable* error instead of silent corruption: no transform here can
/// work incrementally, so streaming bodies are fatal for that file.
pub enum Contents {
    Buffer(Vec<u8>),
    Null,
    Stream(Box<dyn Read + Send>),
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contents::Buffer(b) => write!(f, "Buffer({} bytes)", b.len()),
            Contents::Null => write!(f, "Null"),
            Contents::Stream(_) => write!(f, "Stream"),
        }
    }
}

/// One file flowing through a pipeline.
#[derive(Debug)]
pub struct FileRecord {
    /// Path relative to the source tree the record was read from.
    pub path: PathBuf,
    pub contents: Contents,
    pub is_dir: bool,
}

impl FileRecord {
    /// Build a record from in-memory bytes.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            contents: Contents::Buffer(bytes),
            is_dir: false,
        }
    }

    /// Read a file from disk. `rel` is the record path (relative to the
    /// source root), `abs` is where the bytes actually live.
    pub fn read(rel: impl Into<PathBuf>, abs: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(abs)?;
        Ok(Self::from_bytes(rel, bytes))
    }

    /// The record's body, if it is a concrete buffer.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.contents {
            Contents::Buffer(b) => Some(b),
            _ => None,
        }
    }

    /// File name portion of the record path (empty for pathless records).
    pub fn file_name(&self) -> &str {
        self.path.file_name().and_then(|n| n.to_str()).unwrap_or("")
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// Replace the record's extension, keeping the rest of the path.
    pub fn set_extension(&mut self, ext: &str) {
        self.path.set_extension(ext);
    }
}

/// Result of [`normalize`].
#[derive(Debug, PartialEq, Eq)]
pub enum Normalized {
    /// The record has a concrete byte buffer; proceed with transform logic.
    Ready,
    /// Null body or directory entry: pass the record through untouched.
    PassThrough,
}

/// Shared pre-flight for every transform.
///
/// Directories and null-bodied records are not errors — they flow through
/// the pipe unchanged. A streaming body is a fatal per-file error because
/// no transform in this pipeline consumes input incrementally.
pub fn normalize(plugin: &'static str, record: &FileRecord) -> Result<Normalized, TransformError> {
    if record.is_dir {
        return Ok(Normalized::PassThrough);
    }
    match &record.contents {
        Contents::Buffer(_) => Ok(Normalized::Ready),
        Contents::Null => {
            eprintln!("file is null... {}", record.file_name());
            Ok(Normalized::PassThrough)
        }
        Contents::Stream(_) => Err(TransformError::new(
            plugin,
            &record.path,
            "Streaming is not supported",
        )),
    }
}
