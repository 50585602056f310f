//! Synthetic DOM events.
//!
//! [`DocumentDispatcher`] delivers events to listeners registered with
//! [`Document::add_event_listener`], records each event in the document's
//! event log, and then yields to the runtime so work the handlers spawned gets
//! a chance to start before the caller continues.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::document::{Document, ElementRef, NodeId};
use crate::error::DomError;

/// Event types that propagate to ancestors.
const BUBBLING_EVENTS: &[&str] = &[
    "input", "change", "focusin", "focusout", "click", "keydown", "keyup", "keypress", "submit",
];

/// A dispatched event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomEvent {
    /// Event type, e.g. `input`.
    pub event_type: String,
    /// The element the event was fired on.
    pub target: NodeId,
    /// Whether the event propagates to ancestors.
    pub bubbles: bool,
    /// Whether the event is cancelable.
    pub cancelable: bool,
}

impl DomEvent {
    /// Builds an event of `event_type` on `target` with the standard
    /// bubbling behaviour for that type.
    pub fn new(event_type: impl Into<String>, target: NodeId) -> Self {
        let event_type = event_type.into();
        let bubbles = BUBBLING_EVENTS.contains(&event_type.as_str());
        Self {
            cancelable: bubbles && event_type != "input" && event_type != "change",
            bubbles,
            event_type,
            target,
        }
    }
}

/// Receives dispatched events.
///
/// Listeners run synchronously during dispatch. Asynchronous reactions
/// should be spawned through the document's
/// [`PendingWork`](crate::settled::PendingWork) so the settledness check
/// waits for them.
pub trait EventListener: Send + Sync {
    /// Handles one event.
    fn handle_event(&self, event: &DomEvent, document: &Document);
}

impl<F> EventListener for F
where
    F: Fn(&DomEvent, &Document) + Send + Sync,
{
    fn handle_event(&self, event: &DomEvent, document: &Document) {
        self(event, document)
    }
}

/// Synthesizes and dispatches named events on elements.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    /// Fires `event_type` on `element` and waits for handler-triggered work
    /// to be flushed.
    async fn fire_event(&self, element: &ElementRef, event_type: &str) -> Result<(), DomError>;
}

/// [`EventDispatcher`] over the in-memory [`Document`].
#[derive(Debug, Clone, Default)]
pub struct DocumentDispatcher;

impl DocumentDispatcher {
    /// Creates a dispatcher.
    pub fn new() -> Self {
        Self
    }

    /// Delivers `event` synchronously. Used directly by the focus controller,
    /// which fires several events in one step.
    pub(crate) fn deliver(element: &ElementRef, event: DomEvent) {
        let document = element.document();
        let path = document.propagation_path(event.target, event.bubbles);
        let listeners = document.listeners_for(&path, &event.event_type);
        trace!(
            event = %event.event_type,
            target = %element.description(),
            listeners = listeners.len(),
            "dispatching event"
        );
        document.record_event(event.clone());
        for listener in listeners {
            listener.handle_event(&event, document);
        }
    }
}

#[async_trait]
impl EventDispatcher for DocumentDispatcher {
    async fn fire_event(&self, element: &ElementRef, event_type: &str) -> Result<(), DomError> {
        if !element.is_connected() {
            return Err(DomError::Detached(element.description()));
        }
        Self::deliver(element, DomEvent::new(event_type, element.id()));
        tokio::task::yield_now().await;
        Ok(())
    }
}
