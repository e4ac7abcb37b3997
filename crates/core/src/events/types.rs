//! Event names, payloads and the timestamped envelope handlers receive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ErrorKind;

/// Severity of an adapter message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl MessageLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Name of an event, used for per-event subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    Before,
    After,
    Error,
    FileCreated,
    FileModified,
    FileRemoved,
    DirCreated,
    DirModified,
    DirRemoved,
}

impl EventKind {
    /// Returns the dotted event name, e.g. `transcode.before`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "transcode.message",
            Self::Before => "transcode.before",
            Self::After => "transcode.after",
            Self::Error => "transcode.error",
            Self::FileCreated => "transcode.file_created",
            Self::FileModified => "transcode.file_modified",
            Self::FileRemoved => "transcode.file_removed",
            Self::DirCreated => "transcode.dir_created",
            Self::DirModified => "transcode.dir_modified",
            Self::DirRemoved => "transcode.dir_removed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle events published while a transcode runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscodeEvent {
    /// Free-form message from an adapter.
    Message {
        level: MessageLevel,
        text: String,
        adapter: String,
    },
    Before {
        input: PathBuf,
        preset: String,
        output: PathBuf,
    },
    After {
        input: PathBuf,
        preset: String,
        output: PathBuf,
    },
    /// A request failed. `output` is the best-known output path, `adapter` is
    /// only set once execution has started.
    Error {
        input: PathBuf,
        preset: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        adapter: Option<String>,
        kind: ErrorKind,
        message: String,
    },
    FileCreated {
        path: PathBuf,
    },
    FileModified {
        path: PathBuf,
    },
    FileRemoved {
        path: PathBuf,
    },
    DirCreated {
        path: PathBuf,
    },
    DirModified {
        path: PathBuf,
    },
    DirRemoved {
        path: PathBuf,
    },
}

impl TranscodeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message { .. } => EventKind::Message,
            Self::Before { .. } => EventKind::Before,
            Self::After { .. } => EventKind::After,
            Self::Error { .. } => EventKind::Error,
            Self::FileCreated { .. } => EventKind::FileCreated,
            Self::FileModified { .. } => EventKind::FileModified,
            Self::FileRemoved { .. } => EventKind::FileRemoved,
            Self::DirCreated { .. } => EventKind::DirCreated,
            Self::DirModified { .. } => EventKind::DirModified,
            Self::DirRemoved { .. } => EventKind::DirRemoved,
        }
    }

    /// Returns the affected path of filesystem events.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::FileCreated { path }
            | Self::FileModified { path }
            | Self::FileRemoved { path }
            | Self::DirCreated { path }
            | Self::DirModified { path }
            | Self::DirRemoved { path } => Some(path),
            _ => None,
        }
    }
}

/// Envelope wrapping an event with its publication time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: TranscodeEvent,
}

impl EventEnvelope {
    pub fn new(event: TranscodeEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::Before.as_str(), "transcode.before");
        assert_eq!(EventKind::DirRemoved.to_string(), "transcode.dir_removed");
        let event = TranscodeEvent::FileCreated {
            path: PathBuf::from("/out/a.mp3"),
        };
        assert_eq!(event.kind(), EventKind::FileCreated);
        assert_eq!(event.path(), Some(std::path::Path::new("/out/a.mp3")));
    }

    #[test]
    fn test_serialize_error_event() {
        let event = TranscodeEvent::Error {
            input: PathBuf::from("/in/a.txt"),
            preset: "text.to_lower".to_string(),
            output: None,
            adapter: None,
            kind: ErrorKind::PresetNotFound,
            message: "Preset not found: x".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "preset_not_found");
        assert!(json.get("output").is_none());

        let parsed: TranscodeEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_envelope_has_timestamp() {
        let before = Utc::now();
        let envelope = EventEnvelope::new(TranscodeEvent::Message {
            level: MessageLevel::Info,
            text: "hello".to_string(),
            adapter: "text".to_string(),
        });
        assert!(envelope.timestamp >= before);
        assert_eq!(envelope.kind(), EventKind::Message);
    }
}
