// ABOUTME: Durable set of text lines backed by a single file.
// ABOUTME: Writes go to a temp file and are renamed into place, then the in-memory snapshot is swapped.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(test)]
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tempfile::NamedTempFile;
use tracing::warn;

use super::error::GateError;

/// Immutable view of the file: its raw text and the distinct non-empty trimmed lines.
#[derive(Debug, Default)]
pub struct LineSnapshot {
    text: String,
    entries: HashSet<String>,
}

impl LineSnapshot {
    fn parse(text: String) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { text, entries }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in file order, first occurrence only.
    pub fn entries(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && seen.insert(*line))
            .map(str::to_string)
            .collect()
    }
}

/// A file of one-entry-per-line text with atomic replace and append.
///
/// Readers take the current snapshot without waiting on writers. Writers
/// serialize on `write_lock`, persist first, and only then publish.
#[derive(Debug)]
pub struct PersistentLineSet {
    path: PathBuf,
    snapshot: RwLock<Arc<LineSnapshot>>,
    write_lock: Mutex<()>,
    /// Pause between staging a write and renaming it into place.
    #[cfg(test)]
    slow_write: Option<Duration>,
}

impl PersistentLineSet {
    /// Load the set from `path`. A missing file is an empty set.
    ///
    /// An unreadable file is also treated as empty so that a damaged store
    /// never grants more than an empty one would.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load line set, treating as empty");
                String::new()
            }
        };
        Self {
            path,
            snapshot: RwLock::new(Arc::new(LineSnapshot::parse(text))),
            write_lock: Mutex::new(()),
            #[cfg(test)]
            slow_write: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<LineSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.snapshot().contains(entry)
    }

    /// Overwrite the whole file with `text`, terminated by a newline.
    pub fn replace(&self, text: &str) -> Result<(), GateError> {
        let _guard = self.write_lock.lock();
        let mut next = text.to_string();
        ensure_trailing_newline(&mut next);
        self.commit(next)
    }

    /// Add the lines of `text` after the existing content.
    pub fn append(&self, text: &str) -> Result<(), GateError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock();
        let mut next = self.snapshot().text.clone();
        ensure_trailing_newline(&mut next);
        next.push_str(text);
        ensure_trailing_newline(&mut next);
        self.commit(next)
    }

    /// Re-read the backing file, e.g. after it was edited out of band.
    pub fn reload(&self) -> Result<(), GateError> {
        let _guard = self.write_lock.lock();
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(GateError::persistence(&self.path, e)),
        };
        *self.snapshot.write() = Arc::new(LineSnapshot::parse(text));
        Ok(())
    }

    /// Caller must hold `write_lock`.
    fn commit(&self, text: String) -> Result<(), GateError> {
        let staged = stage(&self.path, &text).map_err(|e| GateError::persistence(&self.path, e))?;

        #[cfg(test)]
        if let Some(pause) = self.slow_write {
            std::thread::sleep(pause);
        }

        staged
            .persist(&self.path)
            .map_err(|e| GateError::persistence(&self.path, e.error))?;
        *self.snapshot.write() = Arc::new(LineSnapshot::parse(text));
        Ok(())
    }
}

fn ensure_trailing_newline(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}

/// Write `content` to a uniquely named temp file beside `path`.
///
/// Each writer gets its own temp file, so writers in other processes sharing
/// the directory cannot truncate it. Dropping the result removes it.
fn stage(path: &Path, content: &str) -> io::Result<NamedTempFile> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut staged = NamedTempFile::new_in(parent)?;
    staged.write_all(content.as_bytes())?;
    staged.as_file().sync_all()?;
    Ok(staged)
}
