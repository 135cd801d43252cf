// Crash-safe persistence for classification runs.
//
// Progress goes to an append-only JSON Lines log next to the output file,
// flushed after every record (trained-model path) or batch (LLM path). A run
// that dies part-way leaves a log that parses up to the last completed unit
// and can be resumed from. Final output files are written atomically: the
// JSON is written to a sibling temp file which is then renamed over the
// target, so readers only ever see a complete document.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// Append-only progress log, one JSON document per line.
pub struct CheckpointLog {
    path: PathBuf,
    file: File,
}

impl CheckpointLog {
    /// Progress log path for a given output file:
    /// `out/classified.json` -> `out/classified.progress.jsonl`.
    pub fn path_for(output: &Path) -> PathBuf {
        output.with_extension("progress.jsonl")
    }

    /// Start a fresh log, discarding any previous content.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create progress log {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Replace the log with exactly `entries` and keep it open for appends.
    ///
    /// The entries go to a sibling temp file that is renamed over the log,
    /// so a failed rewrite leaves the previous log in place.
    pub fn rewrite<T: Serialize>(path: &Path, entries: &[T]) -> Result<Self> {
        let tmp = temp_sibling(path)?;
        Self::create(&tmp)?.append(entries)?;
        std::fs::rename(&tmp, path).with_context(|| {
            format!("Failed to move progress log into place at {}", path.display())
        })?;
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to reopen progress log {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append entries and flush them to disk as one unit of work.
    pub fn append<T: Serialize>(&mut self, entries: &[T]) -> Result<()> {
        let mut buf = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut buf, entry).context("Failed to encode progress entry")?;
            buf.push(b'\n');
        }
        self.file
            .write_all(&buf)
            .and_then(|_| self.file.sync_data())
            .with_context(|| format!("Failed to write progress log {}", self.path.display()))?;
        debug!(entries = entries.len(), "Checkpointed");
        Ok(())
    }

    /// Read every complete entry from a log. A missing log reads as empty.
    ///
    /// An unparseable final line is a write torn by a crash and is dropped;
    /// an unparseable line anywhere else means the log is corrupt.
    pub fn load<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read progress log {}", path.display()))?;

        let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
        let mut entries = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) if i + 1 == lines.len() => {
                    warn!(error = %e, "Ignoring torn final line in progress log");
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Corrupt progress log {} at line {}", path.display(), i + 1)
                    });
                }
            }
        }
        Ok(entries)
    }

    /// Delete the log once the final output has been written.
    pub fn finish(self) -> Result<()> {
        let path = self.path;
        drop(self.file);
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove progress log {}", path.display()))
    }
}

/// Write `value` as pretty JSON to `path` via a temp file and rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp = temp_sibling(path)?;
    let json = serde_json::to_vec_pretty(value).context("Failed to encode output")?;
    {
        let mut file = File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(&json)
            .and_then(|_| file.sync_data())
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move output into place at {}", path.display()))?;
    Ok(())
}

/// `dir/name` -> `dir/.name.tmp`
fn temp_sibling(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Path {} has no file name", path.display()))?;
    Ok(path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy())))
}
