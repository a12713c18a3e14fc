//! Observability
//!
//! Structured logging through `tracing`. Every record carries an `event`
//! field holding a stable name from [`Event`] (or a scope-derived
//! `<NAME>_BEGIN` / `_COMPLETE` / `_FAILED` / `_INCOMPLETE`), plus one
//! field per operation-specific key (see [`KNOWN_FIELDS`]), so the JSON
//! format can be queried by key.
//!
//! # Usage
//!
//! ```ignore
//! use dbvault::observability::{log_event_with_fields, Event, OperationScope};
//!
//! log_event_with_fields(Event::RestoreSwapComplete, &[("database", "shop")]);
//!
//! let scope = OperationScope::new("BACKUP");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod scope;

pub use events::Event;
pub use scope::OperationScope;

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber, writing to stderr. `RUST_LOG` overrides
/// the default `info` filter. Calling it twice keeps the first subscriber.
pub fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn log_event(event: Event) {
    emit(event.level(), event.as_str(), &[]);
}

pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    emit(event.level(), event.as_str(), fields);
}

/// Keys recorded as fields of their own. Any other key is folded into the
/// `extra` field as `key=value`.
pub const KNOWN_FIELDS: &[&str] = &[
    "database",
    "live_database",
    "preserved_database",
    "scratch_database",
    "maintenance_database",
    "fallback_database",
    "record_id",
    "pending_id",
    "artifact_id",
    "kind",
    "table",
    "reference",
    "path",
    "payload",
    "bytes",
    "compressed_size",
    "uncompressed_size",
    "result",
    "reason",
    "cause",
    "code",
    "ledger_restored",
    "ledger_error",
    "drop_hint",
    "schedule",
    "expression",
    "environment",
    "addr",
    "elapsed_ms",
];

/// Key/value pairs of one event
struct Fields<'a>(&'a [(&'a str, &'a str)]);

impl<'a> Fields<'a> {
    /// Last value given for `key`
    fn get(&self, key: &str) -> Option<&'a str> {
        self.0.iter().rev().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    fn extra(&self) -> Option<String> {
        let rendered: Vec<String> = self
            .0
            .iter()
            .filter(|(key, _)| !KNOWN_FIELDS.contains(key))
            .map(|(key, value)| {
                if value.contains(char::is_whitespace) {
                    format!("{}={:?}", key, value)
                } else {
                    format!("{}={}", key, value)
                }
            })
            .collect();
        (!rendered.is_empty()).then(|| rendered.join(" "))
    }
}

// `tracing` needs field names and the level at compile time, so every
// known key is spelled out once per level. Absent keys are not recorded.
macro_rules! structured_event {
    ($level:expr, $event:expr, $fields:expr) => {
        tracing::event!(
            $level,
            event = $event,
            database = $fields.get("database"),
            live_database = $fields.get("live_database"),
            preserved_database = $fields.get("preserved_database"),
            scratch_database = $fields.get("scratch_database"),
            maintenance_database = $fields.get("maintenance_database"),
            fallback_database = $fields.get("fallback_database"),
            record_id = $fields.get("record_id"),
            pending_id = $fields.get("pending_id"),
            artifact_id = $fields.get("artifact_id"),
            kind = $fields.get("kind"),
            table = $fields.get("table"),
            reference = $fields.get("reference"),
            path = $fields.get("path"),
            payload = $fields.get("payload"),
            bytes = $fields.get("bytes"),
            compressed_size = $fields.get("compressed_size"),
            uncompressed_size = $fields.get("uncompressed_size"),
            result = $fields.get("result"),
            reason = $fields.get("reason"),
            cause = $fields.get("cause"),
            code = $fields.get("code"),
            ledger_restored = $fields.get("ledger_restored"),
            ledger_error = $fields.get("ledger_error"),
            drop_hint = $fields.get("drop_hint"),
            schedule = $fields.get("schedule"),
            expression = $fields.get("expression"),
            environment = $fields.get("environment"),
            addr = $fields.get("addr"),
            elapsed_ms = $fields.get("elapsed_ms"),
            extra = $fields.extra().as_deref(),
        )
    };
}

pub(crate) fn emit(level: Level, event: &str, fields: &[(&str, &str)]) {
    let fields = Fields(fields);
    if level == Level::ERROR {
        structured_event!(Level::ERROR, event, fields);
    } else if level == Level::WARN {
        structured_event!(Level::WARN, event, fields);
    } else if level == Level::INFO {
        structured_event!(Level::INFO, event, fields);
    } else if level == Level::DEBUG {
        structured_event!(Level::DEBUG, event, fields);
    } else {
        structured_event!(Level::TRACE, event, fields);
    }
}
