use std::collections::{BTreeMap, VecDeque};
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

pub const DEFAULT_CAPACITY: usize = 200;

/// Span that wraps each CLI command; its `name` field is the command label.
pub const COMMAND_SPAN: &str = "command";

const REDACTED: &str = "<redacted>";
const SENSITIVE: [&str; 4] = ["password", "token", "cookie", "authorization"];

/// One span the event was recorded in, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanFrame {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl fmt::Display for SpanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.fields.is_empty() {
            let fields: Vec<String> = self
                .fields
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            write!(f, "{{{}}}", fields.join(" "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrailEntry {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub scope: Vec<SpanFrame>,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl TrailEntry {
    /// Label of the innermost command span the event happened in.
    pub fn command(&self) -> Option<&str> {
        self.scope
            .iter()
            .rev()
            .find(|frame| frame.name == COMMAND_SPAN)
            .and_then(|frame| frame.fields.get("name"))
            .map(String::as_str)
    }

    /// `timestamp LEVEL scope: target message | key=value ...`
    pub fn format_line(&self) -> String {
        let mut line = format!("{} {:<5} ", self.timestamp, self.level);
        if !self.scope.is_empty() {
            let scope: Vec<String> = self.scope.iter().map(SpanFrame::to_string).collect();
            line.push_str(&scope.join(":"));
            line.push_str(": ");
        }
        line.push_str(&self.target);
        line.push(' ');
        line.push_str(&self.message);
        if !self.fields.is_empty() {
            let fields: Vec<String> = self
                .fields
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            line.push_str(" | ");
            line.push_str(&fields.join(" "));
        }
        line
    }
}

/// The most recent events of this run, attached to crash reports.
///
/// Credential-bearing fields are redacted on the way in, so nothing here
/// needs scrubbing before upload.
#[derive(Clone)]
pub struct CrashTrail {
    entries: Arc<Mutex<VecDeque<TrailEntry>>>,
    capacity: usize,
}

impl CrashTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn entries(&self) -> Vec<TrailEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries().iter().map(TrailEntry::format_line).collect()
    }

    fn push(&self, entry: TrailEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        if self.capacity > 0 {
            entries.push_back(entry);
        }
    }
}

/// Feeds a [`CrashTrail`], keeping the span scope of every event.
#[derive(Clone)]
pub struct TrailLayer {
    trail: CrashTrail,
}

impl TrailLayer {
    pub fn new(trail: CrashTrail) -> Self {
        Self { trail }
    }
}

impl<S> Layer<S> for TrailLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = FieldCollector::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(SpanFrame {
            name: span.name().to_string(),
            fields: fields.fields,
        });
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = FieldCollector::default();
        values.record(&mut fields);
        if let Some(frame) = span.extensions_mut().get_mut::<SpanFrame>() {
            frame.fields.extend(fields.fields);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut fields = FieldCollector::default();
        event.record(&mut fields);
        let scope = ctx
            .event_scope(event)
            .map(|scope| {
                scope
                    .from_root()
                    .filter_map(|span| span.extensions().get::<SpanFrame>().cloned())
                    .collect()
            })
            .unwrap_or_default();
        let metadata = event.metadata();
        self.trail.push(TrailEntry {
            timestamp: format_timestamp(OffsetDateTime::now_utc()),
            level: metadata.level().to_string(),
            target: metadata.target().to_string(),
            scope,
            message: fields.message.unwrap_or_default(),
            fields: fields.fields,
        });
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: BTreeMap<String, String>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: String) {
        let name = field.name();
        if name == "message" {
            self.message = Some(value);
            return;
        }
        let lowered = name.to_ascii_lowercase();
        let value = if SENSITIVE.iter().any(|word| lowered.contains(word)) {
            REDACTED.to_string()
        } else {
            value
        };
        self.fields.insert(name.to_string(), value);
    }
}

impl Visit for FieldCollector {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        self.insert(field, format!("{value:?}"));
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| timestamp.unix_timestamp().to_string())
}
