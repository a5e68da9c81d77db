//! Tracing layer that routes `tracing` events into the composed sink
//!
//! Lets `tracing::info!` and friends, including events from dependencies,
//! land in the same files as the [`Logger`](super::Logger) output.

use chrono::Local;
use std::sync::Arc;
use tracing::{Event, Subscriber};
use tracing_subscriber::{layer::Context, Layer};

use super::record::{CallerLocation, Field, FieldValue, LogRecord};
use super::router::ComposedSink;
use crate::level::SeverityLevel;

pub struct PipelineLayer {
    sink: Arc<ComposedSink>,
}

impl PipelineLayer {
    pub fn new(sink: Arc<ComposedSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for PipelineLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let Some(level) = SeverityLevel::from_tracing(metadata.level()) else {
            return;
        };
        if !self.sink.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord {
            timestamp: Local::now(),
            level,
            logger_name: metadata.target().to_string(),
            caller: metadata
                .file()
                .map(|file| CallerLocation::new(file, metadata.line().unwrap_or(0))),
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
            stacktrace: None,
        };

        self.sink.write(&record);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<Field>,
}

impl FieldVisitor {
    fn push(&mut self, field: &tracing::field::Field, value: FieldValue) {
        self.fields.push(Field {
            key: field.name().to_string(),
            value,
        });
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let text = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.push(field, FieldValue::Str(text));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, FieldValue::Str(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push(field, FieldValue::I64(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push(field, FieldValue::U64(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.push(field, FieldValue::F64(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push(field, FieldValue::Bool(value));
    }
}
