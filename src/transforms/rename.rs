//! Record path renaming, used to emit `.min` stylesheet variants.
//!
//! The suffix is inserted before the extension mechanically, with no
//! dedup: renaming `a.min.css` with suffix `min` yields `a.min.min.css`.
//! Chains are expected to rename a given record once; the mechanical
//! behavior keeps the stage predictable when they don't.

use crate::pipeline::{Stage, StageOutput};
use crate::record::{FileRecord, TransformError};
use std::path::PathBuf;

const PLUGIN: &str = "rename";

/// Rewrites record file names: optional base-name replacement plus an
/// optional pre-extension suffix.
#[derive(Default)]
pub struct FileRenamer {
    base_name: Option<String>,
    suffix: Option<String>,
}

impl FileRenamer {
    pub fn with_suffix(suffix: &str) -> Self {
        Self {
            base_name: None,
            suffix: Some(suffix.to_string()),
        }
    }

    pub fn with_base_name(base_name: &str) -> Self {
        Self {
            base_name: Some(base_name.to_string()),
            suffix: None,
        }
    }

    pub fn suffix(mut self, suffix: &str) -> Self {
        self.suffix = Some(suffix.to_string());
        self
    }
}

impl Stage for FileRenamer {
    fn name(&self) -> &'static str {
        PLUGIN
    }

    fn apply(&mut self, mut record: FileRecord) -> Result<StageOutput, TransformError> {
        if record.is_dir {
            return Ok(StageOutput::One(record));
        }

        let stem = record
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();
        let ext = record.extension();

        let mut name = self.base_name.clone().unwrap_or(stem);
        if let Some(suffix) = &self.suffix {
            name.push('.');
            name.push_str(suffix);
        }
        if let Some(ext) = ext {
            name.push('.');
            name.push_str(&ext);
        }

        let parent = record
            .path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        record.path = if parent.as_os_str().is_empty() {
            PathBuf::from(name)
        } else {
            parent.join(name)
        };
        Ok(StageOutput::One(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renamed(renamer: &mut FileRenamer, path: &str) -> PathBuf {
        let out = renamer
            .apply(FileRecord::from_bytes(path, vec![]))
            .unwrap();
        let StageOutput::One(rec) = out else {
            panic!("expected one record");
        };
        rec.path
    }

    #[test]
    fn suffix_inserted_before_extension() {
        let mut r = FileRenamer::with_suffix("min");
        assert_eq!(renamed(&mut r, "css/index.css"), PathBuf::from("css/index.min.css"));
    }

    #[test]
    fn base_name_replacement() {
        let mut r = FileRenamer::with_base_name("bundle");
        assert_eq!(renamed(&mut r, "js/app.js"), PathBuf::from("js/bundle.js"));
    }

    #[test]
    fn base_and_suffix_combine() {
        let mut r = FileRenamer::with_base_name("app").suffix("bundle");
        assert_eq!(renamed(&mut r, "js/main.js"), PathBuf::from("js/app.bundle.js"));
    }

    #[test]
    fn renaming_is_not_idempotent() {
        // Running the min rename twice stacks suffixes. Chains rename once;
        // this pins the mechanical behavior.
        let mut r = FileRenamer::with_suffix("min");
        let once = renamed(&mut r, "a.css");
        assert_eq!(once, PathBuf::from("a.min.css"));
        let twice = renamed(&mut r, once.to_str().unwrap());
        assert_eq!(twice, PathBuf::from("a.min.min.css"));
    }
}
