//! Structured logging for cs-core.
//!
//! Two output modes on stderr:
//! - human-readable lines for interactive use
//! - JSONL for pipelines and agents
//!
//! Stdout is reserved for command payloads.
//!
//! ```ignore
//! use cs_core::logging::{init_logging, LogConfig, LogContext, Stage, event_names};
//! use cs_core::log_event;
//!
//! init_logging(&LogConfig::from_env(None, None));
//! let ctx = LogContext::new(cs_common::RunId::new().to_string());
//! log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "starting", claims = 120usize);
//! ```

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, LogEvent, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Later calls are ignored.
///
/// Event names are used as tracing targets, so the filter is level-only;
/// `RUST_LOG` has already been folded into `config.level`.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::new(config.level.to_string());

    let result = match config.format {
        LogFormat::Human => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(JsonlLayer::stderr())
            .try_init(),
    };
    // Already installed (tests, embedding); keep the existing subscriber.
    let _ = result;
}

/// Emit a tracing event named `$event` carrying the context's run id and a stage.
///
/// ```ignore
/// log_event!(ctx, WARN, event_names::DETECT_METHOD_SKIPPED, Stage::Detect,
///     "method skipped", method = "lof", required = 21usize);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::info!(
            target: $event,
            run_id = %$ctx.run_id,
            stage = %$stage,
            $($key = $val,)*
            message = $msg,
        )
    };
    ($ctx:expr, DEBUG, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::debug!(
            target: $event,
            run_id = %$ctx.run_id,
            stage = %$stage,
            $($key = $val,)*
            message = $msg,
        )
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::warn!(
            target: $event,
            run_id = %$ctx.run_id,
            stage = %$stage,
            $($key = $val,)*
            message = $msg,
        )
    };
    ($ctx:expr, ERROR, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::error!(
            target: $event,
            run_id = %$ctx.run_id,
            stage = %$stage,
            $($key = $val,)*
            message = $msg,
        )
    };
}
