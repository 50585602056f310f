//! Shared test helpers for settlekit-core integration tests.
//!
//! Provides a harness that wires a [`FillText`] to an in-memory document, a
//! few application-style listeners that schedule work through the document's
//! pending-work tracker, and recording collaborators for tests that inject
//! their own.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use settlekit_core::config::SettleConfig;
use settlekit_core::control::{classify, ElementKind, ValueControl};
use settlekit_core::document::{Document, ElementRef};
use settlekit_core::error::DomError;
use settlekit_core::events::{DocumentDispatcher, DomEvent, EventDispatcher};
use settlekit_core::fill::FillText;
use settlekit_core::hooks::HookRegistry;
use settlekit_core::settled::{PendingGuard, PendingKind, SettleError, SettlednessOracle};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A document with a `FillText` wired to its in-memory collaborators.
pub struct Harness {
    pub doc: Document,
    pub hooks: Arc<HookRegistry>,
    pub fill: FillText,
}

impl Harness {
    /// Parses `html` and wires a sequencer with an empty hook registry.
    pub fn new(html: &str) -> Self {
        Self::with_settle(html, SettleConfig::default())
    }

    /// Like [`new`](Self::new) with explicit settle settings.
    pub fn with_settle(html: &str, settle: SettleConfig) -> Self {
        let doc = Document::from_html(html);
        let hooks = Arc::new(HookRegistry::new());
        let fill = FillText::for_document(&doc, Arc::clone(&hooks), settle);
        Self { doc, hooks, fill }
    }

    /// Element by id, panicking if absent.
    pub fn by_id(&self, id: &str) -> ElementRef {
        self.doc
            .get_element_by_id(id)
            .unwrap_or_else(|| panic!("no element with id {id}"))
    }

    /// Current value of the form control with `id`.
    pub fn value(&self, id: &str) -> String {
        value_of(&self.by_id(id))
    }

    /// `type@description` for every recorded event.
    pub fn events(&self) -> Vec<String> {
        self.doc
            .event_log()
            .into_iter()
            .map(|event| {
                let target = self
                    .doc
                    .element(event.target)
                    .map(|e| e.description())
                    .unwrap_or_default();
                format!("{}@{}", event.event_type, target)
            })
            .collect()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        // Listeners capture elements of the document and would keep it alive.
        self.doc.clear_listeners();
    }
}

/// Current value of a form control.
pub fn value_of(element: &ElementRef) -> String {
    match classify(element) {
        ElementKind::Control(control) => control.as_value_control().value(),
        other => panic!("not a form control: {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Application-style listeners
// ---------------------------------------------------------------------------

/// On every `change` of `source`, schedules a timer that copies its value
/// into `output`'s text after `delay`.
pub fn echo_on_change(doc: &Document, source: &ElementRef, output: &ElementRef, delay: Duration) {
    let pending = doc.pending().clone();
    let source_ref = source.clone();
    let output = output.clone();
    doc.add_event_listener(source, "change", move |_: &DomEvent, _: &Document| {
        let source = source_ref.clone();
        let output = output.clone();
        pending.set_timeout(delay, move || output.set_inner_html(&value_of(&source)));
    });
}

/// Opens a request on every `input` event of `element`. Requests stay
/// outstanding until their guards are taken out of the returned slot.
pub fn hold_request_on_input(doc: &Document, element: &ElementRef) -> Arc<Mutex<Vec<PendingGuard>>> {
    let held = Arc::new(Mutex::new(Vec::new()));
    let pending = doc.pending().clone();
    let slot = Arc::clone(&held);
    doc.add_event_listener(element, "input", move |_: &DomEvent, _: &Document| {
        slot.lock().push(pending.track(PendingKind::Request));
    });
    held
}

// ---------------------------------------------------------------------------
// Injected collaborators
// ---------------------------------------------------------------------------

/// Dispatcher that records each fired event type before delegating to the
/// in-memory dispatcher.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub fired: Mutex<Vec<String>>,
    inner: DocumentDispatcher,
}

#[async_trait]
impl EventDispatcher for RecordingDispatcher {
    async fn fire_event(&self, element: &ElementRef, event_type: &str) -> Result<(), DomError> {
        self.fired.lock().push(event_type.to_string());
        self.inner.fire_event(element, event_type).await
    }
}

/// Oracle that sleeps for `delay` and counts how often it was consulted.
pub struct SlowOracle {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl SlowOracle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettlednessOracle for SlowOracle {
    async fn settled(&self) -> Result<(), SettleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
