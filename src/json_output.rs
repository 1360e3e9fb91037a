//! JSON output for front-end integration
//!
//! When --json-progress flag is enabled, all progress and status information
//! is emitted as JSON lines to stdout, suppressing all other output.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::conversion::{BatchEvent, OutcomeKind};

/// Minimum gap between two progress lines (~25 FPS)
const PROGRESS_INTERVAL: Duration = Duration::from_millis(40);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Textures discovered, conversions about to start
    Started { total: usize, workers: usize },
    /// Progress update
    Progress { current: usize, total: usize },
    /// Texture converted
    FileCompleted { input_path: String, message: String },
    /// Texture left alone
    FileSkipped { input_path: String, reason: String },
    /// Texture conversion failed
    FileFailed { input_path: String, error: String },
    /// Cancellation observed
    Cancelling,
    /// Processing summary
    Summary {
        total_files: usize,
        processed: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        cancelled: bool,
    },
    /// Batch could not start
    Fatal { error: String },
}

impl JsonMessage {
    pub fn from_event(event: &BatchEvent) -> Self {
        match event {
            BatchEvent::Started { total, workers } => Self::Started {
                total: *total,
                workers: *workers,
            },
            BatchEvent::Progress { done, total } => Self::Progress {
                current: *done,
                total: *total,
            },
            BatchEvent::Item(outcome) => {
                let input_path = outcome.source.display().to_string();
                match outcome.kind {
                    OutcomeKind::Converted => Self::FileCompleted {
                        input_path,
                        message: outcome.message.clone(),
                    },
                    OutcomeKind::Skipped(_) => Self::FileSkipped {
                        input_path,
                        reason: outcome.message.clone(),
                    },
                    OutcomeKind::Failed => Self::FileFailed {
                        input_path,
                        error: outcome.message.clone(),
                    },
                }
            }
            BatchEvent::Cancelling => Self::Cancelling,
            BatchEvent::Finished(summary) => Self::Summary {
                total_files: summary.total,
                processed: summary.done,
                succeeded: summary.succeeded,
                failed: summary.failed,
                skipped: summary.skipped,
                cancelled: summary.cancelled,
            },
        }
    }

    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }
}

/// Writes batch events as JSON lines, throttling progress updates.
///
/// The final progress (current == total) is always emitted.
#[derive(Debug, Default)]
pub struct JsonEmitter {
    last_progress: Option<Instant>,
}

impl JsonEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the message when it should be written now
    pub fn filter(&mut self, event: &BatchEvent) -> Option<JsonMessage> {
        if let BatchEvent::Progress { done, total } = event {
            let now = Instant::now();
            let due = self
                .last_progress
                .map_or(true, |last| now.duration_since(last) >= PROGRESS_INTERVAL);
            if !due && done != total {
                return None;
            }
            self.last_progress = Some(now);
        }
        Some(JsonMessage::from_event(event))
    }

    pub fn handle(&mut self, event: &BatchEvent) {
        if let Some(message) = self.filter(event) {
            message.emit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{BatchSummary, ConversionOutcome, SkipReason};
    use std::path::Path;

    #[test]
    fn test_messages_are_type_tagged() {
        let json = serde_json::to_string(&JsonMessage::Progress {
            current: 3,
            total: 10,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"progress","current":3,"total":10}"#);

        let json = serde_json::to_string(&JsonMessage::FileFailed {
            input_path: "a.png".into(),
            error: "maketx failed: boom".into(),
        })
        .unwrap();
        assert!(json.starts_with(r#"{"type":"file_failed""#));
    }

    #[test]
    fn test_outcomes_map_to_message_kinds() {
        let src = Path::new("/tex/a.png");
        let skipped = BatchEvent::Item(ConversionOutcome::skipped(
            src,
            SkipReason::UpToDate,
            "Up-to-date .tx exists: a.png.tx; skipping.",
        ));
        assert!(matches!(
            JsonMessage::from_event(&skipped),
            JsonMessage::FileSkipped { .. }
        ));

        let failed = BatchEvent::Item(ConversionOutcome::failed(src, "maketx failed: x"));
        assert_eq!(
            JsonMessage::from_event(&failed),
            JsonMessage::FileFailed {
                input_path: "/tex/a.png".into(),
                error: "maketx failed: x".into(),
            }
        );
    }

    #[test]
    fn test_summary_round_trips() {
        let summary = BatchSummary {
            total: 5,
            done: 5,
            succeeded: 3,
            failed: 1,
            skipped: 1,
            cancelled: false,
        };
        let message = JsonMessage::from_event(&BatchEvent::Finished(summary));
        let json = serde_json::to_string(&message).unwrap();
        let back: JsonMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
    }

    #[test]
    fn test_progress_is_throttled_but_final_always_passes() {
        let mut emitter = JsonEmitter::new();
        assert!(emitter
            .filter(&BatchEvent::Progress { done: 1, total: 100 })
            .is_some());
        assert!(emitter
            .filter(&BatchEvent::Progress { done: 2, total: 100 })
            .is_none());
        assert!(emitter
            .filter(&BatchEvent::Progress {
                done: 100,
                total: 100
            })
            .is_some());
        assert!(emitter.filter(&BatchEvent::Cancelling).is_some());
    }
}
