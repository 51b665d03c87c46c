//! JSON-lines output store.
//!
//! Every line of the file is one [`StoreRecord`]. Writes never interrupt a
//! run: failures are logged with `tracing` and the store goes quiet.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sinter_model::{StateStore, StepRecord, SystemState};
use sinter_types::{SinterError, SinterResult};

/// One line of a JSON-lines output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum StoreRecord {
    State(SystemState),
    Step(StepRecord),
}

/// Streams states and step records to a JSON-lines file.
pub struct JsonLinesStore {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    state_stride: u64,
    write_steps: bool,
    states_seen: u64,
    pending: Option<SystemState>,
    lines: u64,
}

impl JsonLinesStore {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: &Path) -> SinterResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            state_stride: 1,
            write_steps: true,
            states_seen: 0,
            pending: None,
            lines: 0,
        })
    }

    /// Keeps only every `stride`-th state. The first and last states are
    /// always written.
    pub fn with_state_stride(mut self, stride: u64) -> Self {
        self.state_stride = stride.max(1);
        self
    }

    pub fn with_steps(mut self, write_steps: bool) -> Self {
        self.write_steps = write_steps;
        self
    }

    /// Lines written so far.
    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, record: &StoreRecord) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let result = serde_json::to_writer(&mut *writer, record)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"));
        match result {
            Ok(()) => self.lines += 1,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "json-lines store write failed, disabling");
                self.writer = None;
            }
        }
    }
}

impl StateStore for JsonLinesStore {
    fn store_state(&mut self, state: &SystemState) {
        let index = self.states_seen;
        self.states_seen += 1;
        if index % self.state_stride == 0 {
            self.pending = None;
            self.write(&StoreRecord::State(state.clone()));
        } else {
            self.pending = Some(state.clone());
        }
    }

    fn store_step(&mut self, record: &StepRecord) {
        if self.write_steps {
            self.write(&StoreRecord::Step(record.clone()));
        }
    }

    fn finalize(&mut self) {
        if let Some(last) = self.pending.take() {
            self.write(&StoreRecord::State(last));
        }
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                tracing::warn!(path = %self.path.display(), error = %e, "json-lines store flush failed");
            }
        }
        tracing::debug!(path = %self.path.display(), lines = self.lines, "json-lines store finalized");
    }

    fn name(&self) -> &str {
        "json_lines_store"
    }
}

/// Reads every record of a JSON-lines file. Blank lines are skipped.
pub fn read_records(path: &Path) -> SinterResult<Vec<StoreRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            SinterError::Serialization(format!("{}:{}: {e}", path.display(), number + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}
