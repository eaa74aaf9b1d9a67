//! A subscriber layer that keeps every span and event it sees, for assertions.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Dispatch, Event, Level, Span, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldValue {
    Str(String),
    I64(i64),
    U64(u64),
    Bool(bool),
}

impl FieldValue {
    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(value) => Some(value),
            _ => None,
        }
    }
}

type Fields = HashMap<String, FieldValue>;

#[derive(Debug, Clone)]
pub(crate) struct RecordedSpan {
    pub name: &'static str,
    pub parent: Option<&'static str>,
    pub fields: Fields,
    pub closes: usize,
}

impl RecordedSpan {
    pub(crate) fn str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(FieldValue::as_str)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedEvent {
    pub level: Level,
    pub parent: Option<&'static str>,
    pub fields: Fields,
}

#[derive(Debug, Default)]
struct State {
    spans: Vec<RecordedSpan>,
    ids: HashMap<u64, usize>,
    events: Vec<RecordedEvent>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Recorder {
    state: Arc<Mutex<State>>,
}

impl Recorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A dispatcher reporting to this recorder.
    pub(crate) fn dispatch(&self) -> Dispatch {
        Dispatch::new(tracing_subscriber::registry().with(self.clone()))
    }

    /// A `request` span recorded by `dispatch`, to parent queries under.
    pub(crate) fn request_span(dispatch: &Dispatch) -> Span {
        tracing::dispatcher::with_default(dispatch, || tracing::info_span!("request"))
    }

    pub(crate) fn spans(&self, name: &str) -> Vec<RecordedSpan> {
        self.lock()
            .spans
            .iter()
            .filter(|span| span.name == name)
            .cloned()
            .collect()
    }

    /// The single span called `name`.
    pub(crate) fn span(&self, name: &str) -> RecordedSpan {
        let mut spans = self.spans(name);
        assert_eq!(spans.len(), 1, "expected exactly one {name} span");
        spans.remove(0)
    }

    pub(crate) fn events(&self) -> Vec<RecordedEvent> {
        self.lock().events.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl<S> Layer<S> for Recorder
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = Fields::new();
        attrs.record(&mut FieldVisitor(&mut fields));

        let parent = attrs
            .parent()
            .cloned()
            .or_else(|| ctx.current_span().id().cloned())
            .filter(|_| !attrs.is_root())
            .and_then(|parent| ctx.span(&parent).map(|span| span.name()));

        let mut state = self.lock();
        let index = state.spans.len();
        state.spans.push(RecordedSpan {
            name: attrs.metadata().name(),
            parent,
            fields,
            closes: 0,
        });
        state.ids.insert(id.into_u64(), index);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        let mut state = self.lock();
        if let Some(&index) = state.ids.get(&id.into_u64()) {
            values.record(&mut FieldVisitor(&mut state.spans[index].fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut fields = Fields::new();
        event.record(&mut FieldVisitor(&mut fields));
        let parent = ctx.event_span(event).map(|span| span.name());

        self.lock().events.push(RecordedEvent {
            level: *event.metadata().level(),
            parent,
            fields,
        });
    }

    fn on_close(&self, id: Id, _ctx: Context<'_, S>) {
        let mut state = self.lock();
        if let Some(&index) = state.ids.get(&id.into_u64()) {
            state.spans[index].closes += 1;
        }
    }
}

struct FieldVisitor<'a>(&'a mut Fields);

impl Visit for FieldVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_owned(), FieldValue::Str(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0
            .insert(field.name().to_owned(), FieldValue::Str(value.to_owned()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_owned(), FieldValue::I64(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_owned(), FieldValue::U64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_owned(), FieldValue::Bool(value));
    }
}
