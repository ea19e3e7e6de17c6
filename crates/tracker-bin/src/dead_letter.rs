//! Dead-letter file for batches the tracker gave up on.
//!
//! One JSON object per line. The tracker forgets a batch once it reports
//! the failure, so this file is the only place a dropped batch survives
//! until `stream-tracker replay` re-sends it.

use delivery_transport::TransportError;
use event_tracker::{DeliveryFailure, TrackerObserver};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracker_config_and_utils::CoreResult;
use tracing::{error, warn};

/// A failed batch as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub stream: String,
    /// Message of the last transport error.
    pub error: String,
    /// Status of the last transport error.
    pub status: u16,
    /// Transport calls made so far, across the original run and replays.
    pub attempts: u32,
    /// RFC 3339 timestamp of the most recent failure.
    pub failed_at: String,
    pub data: Vec<Value>,
}

impl DeadLetter {
    pub fn from_failure(failure: &DeliveryFailure<Value>) -> Self {
        let last = failure.error.transport_error();
        Self {
            stream: failure.batch.stream.clone(),
            error: last.message.clone(),
            status: last.status,
            attempts: failure.error.attempts(),
            failed_at: chrono::Utc::now().to_rfc3339(),
            data: failure.batch.data.clone(),
        }
    }

    /// Record one more failed send of this batch.
    pub fn failed_again(mut self, err: &TransportError) -> Self {
        self.error = err.message.clone();
        self.status = err.status;
        self.attempts += 1;
        self.failed_at = chrono::Utc::now().to_rfc3339();
        self
    }
}

/// JSONL store of [`DeadLetter`] records.
pub struct DeadLetterFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DeadLetterFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the file and its directory if needed.
    pub fn append(&self, letter: &DeadLetter) -> CoreResult<()> {
        let mut line = serde_json::to_string(letter)?;
        line.push('\n');

        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Read every record. A missing file reads as empty; unparseable lines
    /// are skipped with a warning.
    pub fn read_all(&self) -> CoreResult<Vec<DeadLetter>> {
        let _guard = self.lock.lock();
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut letters = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(letter) => letters.push(letter),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping malformed dead-letter record"
                ),
            }
        }
        Ok(letters)
    }

    /// Replace the file's contents with `letters`. An empty list removes it.
    pub fn rewrite(&self, letters: &[DeadLetter]) -> CoreResult<()> {
        let _guard = self.lock.lock();
        if letters.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        let mut content = String::new();
        for letter in letters {
            content.push_str(&serde_json::to_string(letter)?);
            content.push('\n');
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TrackerObserver<Value> for DeadLetterFile {
    fn on_delivery_failed(&self, failure: &DeliveryFailure<Value>) {
        let letter = DeadLetter::from_failure(failure);
        match self.append(&letter) {
            Ok(()) => warn!(
                stream = %letter.stream,
                status = letter.status,
                attempts = letter.attempts,
                events = letter.data.len(),
                path = %self.path.display(),
                "Batch dropped, written to dead-letter file"
            ),
            Err(e) => error!(
                stream = %letter.stream,
                events = letter.data.len(),
                error = %e,
                "Batch dropped and could not be written to dead-letter file"
            ),
        }
    }

    fn handles_failures(&self) -> bool {
        true
    }
}
