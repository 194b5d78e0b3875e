//! Append-only JSONL event journal, one file per UTC day.
//!
//! Every record is a flat JSON object stamped with `ts` and `kind`.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::warn;

pub type SharedJournal = Arc<Mutex<EventJournal>>;

fn day_file(dir: &Path, day: NaiveDate) -> PathBuf {
    dir.join(format!("events-{}.jsonl", day.format("%Y-%m-%d")))
}

/// `fields` stamped with `ts` and `kind`. Non-object payloads land under
/// `data`.
fn stamp(kind: &str, fields: Value, at: DateTime<Utc>) -> Value {
    let mut record = Map::new();
    record.insert(
        "ts".into(),
        Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    record.insert("kind".into(), Value::String(kind.to_string()));
    match fields {
        Value::Object(map) => {
            for (key, value) in map {
                if key != "ts" && key != "kind" {
                    record.insert(key, value);
                }
            }
        }
        Value::Null => {}
        other => {
            record.insert("data".into(), other);
        }
    }
    Value::Object(record)
}

pub struct EventJournal {
    dir: PathBuf,
    day: NaiveDate,
    file: File,
}

impl EventJournal {
    /// Open today's file under `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        create_dir_all(&dir)?;
        let day = Utc::now().date_naive();
        let file = Self::open_day(&dir, day)?;
        Ok(Self { dir, day, file })
    }

    pub fn shared(self) -> SharedJournal {
        Arc::new(Mutex::new(self))
    }

    fn open_day(dir: &Path, day: NaiveDate) -> std::io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(day_file(dir, day))
    }

    fn append(&mut self, record: &Value, at: DateTime<Utc>) -> std::io::Result<()> {
        let day = at.date_naive();
        if day != self.day {
            self.file = Self::open_day(&self.dir, day)?;
            self.day = day;
        }
        writeln!(self.file, "{record}")?;
        self.file.flush()
    }

    /// Append one `kind` record. Write failures are logged and swallowed.
    pub fn record(&mut self, kind: &str, fields: Value) {
        let now = Utc::now();
        let record = stamp(kind, fields, now);
        if let Err(e) = self.append(&record, now) {
            warn!("Event journal write failed for {}: {}", kind, e);
        }
    }

    pub fn current_file(&self) -> PathBuf {
        day_file(&self.dir, self.day)
    }
}

pub async fn write_event(journal: &SharedJournal, kind: &str, fields: Value) {
    journal.lock().await.record(kind, fields);
}
