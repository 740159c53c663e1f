//! Structured event definitions for logging.
//!
//! Every event carries the run id and the pipeline stage that emitted it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration loading.
    Init,
    /// Reading and validating claims.
    Ingest,
    /// Imputation and standardization.
    Features,
    /// Individual detectors.
    Detect,
    /// Vote aggregation.
    Consensus,
    /// Grouped summary tables.
    Summarize,
    /// Writing the payload.
    Output,
    /// Synthetic claim generation.
    Generate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Ingest => "ingest",
            Stage::Features => "features",
            Stage::Detect => "detect",
            Stage::Consensus => "consensus",
            Stage::Summarize => "summarize",
            Stage::Output => "output",
            Stage::Generate => "generate",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    pub const INGEST_FINISHED: &str = "ingest.finished";

    pub const FEATURES_PREPARED: &str = "features.prepared";
    pub const FEATURES_IMPUTED: &str = "features.imputed";

    pub const DETECT_METHOD_DONE: &str = "detect.method_done";
    pub const DETECT_METHOD_SKIPPED: &str = "detect.method_skipped";

    pub const CONSENSUS_FINISHED: &str = "consensus.finished";

    pub const SUMMARY_BUILT: &str = "summary.built";

    pub const OUTPUT_WRITTEN: &str = "output.written";

    pub const GENERATE_FINISHED: &str = "generate.finished";

    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// A structured log event, as written by the JSONL layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,
    /// Event name (e.g., "run.started").
    pub event: String,
    pub run_id: String,
    pub stage: Stage,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(
        level: Level,
        event: impl Into<String>,
        run_id: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: run_id.into(),
            stage,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Correlation context shared by every event of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
        }
    }

    pub fn event(
        &self,
        level: Level,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        LogEvent::new(level, event, &self.run_id, stage, message)
    }

    pub fn info(
        &self,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        self.event(Level::Info, event, stage, message)
    }

    pub fn warn(
        &self,
        event: impl Into<String>,
        stage: Stage,
        message: impl Into<String>,
    ) -> LogEvent {
        self.event(Level::Warn, event, stage, message)
    }
}
