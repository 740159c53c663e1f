//! Tracing layer that writes one JSON object per event.
//!
//! The event name is the tracing target; `run_id` and `stage` are taken from
//! the event itself or, failing that, from the nearest enclosing span.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

/// Correlation fields lifted out of the payload.
const CONTEXT_FIELDS: [&str; 2] = ["run_id", "stage"];

#[derive(Debug, Clone, Default)]
struct SpanContext {
    run_id: Option<String>,
    stage: Option<String>,
}

impl SpanContext {
    fn set(&mut self, name: &str, value: String) {
        match name {
            "run_id" => self.run_id = Some(value),
            "stage" => self.stage = Some(value),
            _ => {}
        }
    }
}

#[derive(Default)]
struct JsonFieldVisitor {
    fields: Map<String, Value>,
    message: Option<String>,
    context: SpanContext,
}

impl JsonFieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if CONTEXT_FIELDS.contains(&field.name()) {
            if let Value::String(s) = value {
                self.context.set(field.name(), s);
            }
        } else if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, Value::String(format!("{:?}", value)));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::Number(value.into()));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.insert(field, Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::Bool(value));
    }
}

/// JSONL tracing layer; writes to stderr unless given another writer.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = JsonFieldVisitor::default();
        attrs.record(&mut visitor);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.context);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let ts = Utc::now();
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let mut context = visitor.context;
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(span_ctx) = span.extensions().get::<SpanContext>() {
                    if context.run_id.is_none() {
                        context.run_id.clone_from(&span_ctx.run_id);
                    }
                    if context.stage.is_none() {
                        context.stage.clone_from(&span_ctx.stage);
                    }
                }
            }
        }

        let level: Level = (*event.metadata().level()).into();
        let mut obj = Map::new();
        obj.insert("ts".to_string(), Value::String(ts.to_rfc3339()));
        obj.insert("level".to_string(), serde_json::json!(level));
        obj.insert(
            "event".to_string(),
            Value::String(event.metadata().target().to_string()),
        );
        if let Some(id) = context.run_id {
            obj.insert("run_id".to_string(), Value::String(id));
        }
        if let Some(stage) = context.stage {
            obj.insert("stage".to_string(), Value::String(stage));
        }
        if let Some(msg) = visitor.message {
            obj.insert("message".to_string(), Value::String(msg));
        }
        if !visitor.fields.is_empty() {
            obj.insert("fields".to_string(), Value::Object(visitor.fields));
        }

        let json = serde_json::to_string(&Value::Object(obj)).unwrap_or_default();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    struct BufWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for BufWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> Vec<Value> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let subscriber =
            tracing_subscriber::registry().with(JsonlLayer::new(BufWriter(buffer.clone())));
        tracing::subscriber::with_default(subscriber, f);
        let output = buffer.lock().unwrap();
        String::from_utf8_lossy(&output)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn event_fields_and_target() {
        let lines = capture(|| {
            tracing::info!(
                target: "consensus.finished",
                run_id = "cs-20260115-143022-a7xq",
                stage = "consensus",
                flagged = 3u64,
                rate = 0.5,
                message = "done"
            );
        });
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["event"], "consensus.finished");
        assert_eq!(line["level"], "info");
        assert_eq!(line["run_id"], "cs-20260115-143022-a7xq");
        assert_eq!(line["stage"], "consensus");
        assert_eq!(line["message"], "done");
        assert_eq!(line["fields"]["flagged"], 3);
        assert_eq!(line["fields"]["rate"], 0.5);
        assert!(line["fields"].get("run_id").is_none());
        assert!(line["ts"].is_string());
    }

    #[test]
    fn context_is_inherited_from_span() {
        let lines = capture(|| {
            let span = tracing::info_span!("run", run_id = "cs-x", stage = "detect");
            let _guard = span.enter();
            tracing::warn!(target: "detect.method_skipped", method = "lof", message = "skip");
        });
        assert_eq!(lines[0]["run_id"], "cs-x");
        assert_eq!(lines[0]["stage"], "detect");
        assert_eq!(lines[0]["level"], "warn");
        assert_eq!(lines[0]["fields"]["method"], "lof");
    }

    #[test]
    fn bare_event_is_valid_json() {
        let lines = capture(|| tracing::error!(target: "internal_error", "boom"));
        assert_eq!(lines[0]["message"], "boom");
        assert!(lines[0].get("fields").is_none());
    }
}
