//! Focus management.

use async_trait::async_trait;
use tracing::trace;

use crate::control::is_content_editable;
use crate::document::ElementRef;
use crate::error::DomError;
use crate::events::{DocumentDispatcher, DomEvent};

/// Moves input focus to an element.
#[async_trait]
pub trait FocusController: Send + Sync {
    /// Focuses `element`, firing the usual focus events.
    async fn focus(&self, element: &ElementRef) -> Result<(), DomError>;
}

/// True if `element` can receive focus.
///
/// Form controls (including buttons), links with an `href`, elements with a
/// `tabindex`, and content-editable elements are focusable. Disabled
/// controls are not.
pub fn is_focusable(element: &ElementRef) -> bool {
    match element.tag_name().as_str() {
        "input" | "textarea" | "select" | "button" => !element.has_attribute("disabled"),
        "a" | "area" if element.has_attribute("href") => true,
        _ => element.has_attribute("tabindex") || is_content_editable(element),
    }
}

/// [`FocusController`] over the in-memory document.
///
/// Blurs the previously active element (`blur`, then `focusout`), marks the
/// new element active, then fires `focus` and `focusin` on it. Focusing the
/// element that already has focus does nothing.
#[derive(Debug, Clone, Default)]
pub struct DocumentFocus;

impl DocumentFocus {
    /// Creates a focus controller.
    pub fn new() -> Self {
        Self
    }

    /// Removes focus from `element` if it is the active element.
    pub async fn blur(&self, element: &ElementRef) -> Result<(), DomError> {
        let document = element.document();
        if document.active_element().as_ref() != Some(element) {
            return Ok(());
        }
        document.set_active(None);
        DocumentDispatcher::deliver(element, DomEvent::new("blur", element.id()));
        DocumentDispatcher::deliver(element, DomEvent::new("focusout", element.id()));
        tokio::task::yield_now().await;
        Ok(())
    }
}

#[async_trait]
impl FocusController for DocumentFocus {
    async fn focus(&self, element: &ElementRef) -> Result<(), DomError> {
        if !element.is_connected() {
            return Err(DomError::Detached(element.description()));
        }
        if !is_focusable(element) {
            return Err(DomError::NotFocusable(element.description()));
        }

        let document = element.document();
        let previous = document.active_element();
        if previous.as_ref() == Some(element) {
            return Ok(());
        }
        if let Some(previous) = previous {
            self.blur(&previous).await?;
        }

        trace!(element = %element.description(), "focus");
        document.set_active(Some(element.id()));
        DocumentDispatcher::deliver(element, DomEvent::new("focus", element.id()));
        DocumentDispatcher::deliver(element, DomEvent::new("focusin", element.id()));
        tokio::task::yield_now().await;
        Ok(())
    }
}
