//! JSONL file writer for transcript events.
//!
//! Each [`ConversationEvent`] becomes one JSON line carrying `type`,
//! `seq` and `timestamp`. Object payloads are merged into the line; any
//! other payload is nested under `data`.

use relay_application::{ConversationEvent, ConversationLogger};
use relay_domain::ConversationHistory;
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

struct Sink {
    writer: BufWriter<File>,
    seq: u64,
}

/// Thread-safe via `Mutex`. Appends to an existing file and flushes after
/// every line.
pub struct JsonlConversationLogger {
    sink: Mutex<Sink>,
    path: PathBuf,
}

impl JsonlConversationLogger {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            sink: Mutex::new(Sink {
                writer: BufWriter::new(file),
                seq: 0,
            }),
            path: path.to_path_buf(),
        })
    }

    /// Like [`open`](Self::open), but logs the failure and returns `None`.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(logger) => Some(logger),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not open conversation log");
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every history entry as a `history_entry` event.
    pub fn dump_history(&self, history: &ConversationHistory) {
        for entry in history.iter() {
            match serde_json::to_value(entry) {
                Ok(payload) => self.log(ConversationEvent::new("history_entry", payload)),
                Err(e) => warn!(kind = entry.kind(), error = %e, "Unserializable history entry"),
            }
        }
    }

    fn record(event: ConversationEvent, seq: u64) -> Value {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let mut map = match event.payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        map.insert("type".to_string(), Value::String(event.event_type.to_string()));
        map.insert("seq".to_string(), Value::from(seq));
        map.insert("timestamp".to_string(), Value::String(timestamp));
        Value::Object(map)
    }
}

impl ConversationLogger for JsonlConversationLogger {
    fn log(&self, event: ConversationEvent) {
        let Ok(mut sink) = self.sink.lock() else {
            return;
        };
        sink.seq += 1;
        let record = Self::record(event, sink.seq);
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        if let Err(e) = writeln!(sink.writer, "{line}").and_then(|_| sink.writer.flush()) {
            warn!(path = %self.path.display(), error = %e, "Conversation log write failed");
        }
    }
}

impl Drop for JsonlConversationLogger {
    fn drop(&mut self) {
        if let Ok(mut sink) = self.sink.lock() {
            let _ = sink.writer.flush();
        }
    }
}
