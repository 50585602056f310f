//! Error types for DOM access and the fill interaction.
//!
//! [`FillError`] is what callers of [`FillText`](crate::fill::FillText) see.
//! Validation variants carry the human-readable target description so a
//! failing test points at the element it tried to fill.

use thiserror::Error;

use crate::hooks::HookError;
use crate::settled::SettleError;

/// Errors raised by the in-memory DOM and its collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The selector uses syntax outside the supported subset.
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector {
        /// The selector as written.
        selector: String,
        /// What the parser tripped over.
        reason: String,
    },

    /// The element has been removed from the document.
    #[error("Element '{0}' is no longer attached to the document")]
    Detached(String),

    /// Focus was requested on an element that cannot take focus.
    #[error("Element '{0}' is not focusable")]
    NotFocusable(String),
}

/// Errors that fail a single `fillText` call.
///
/// Every variant is fatal to the call; nothing is retried internally.
#[derive(Error, Debug)]
pub enum FillError {
    /// No target was supplied, or the selector was empty.
    #[error("Must pass an element, selector, or descriptor to `fillText`.")]
    MissingTarget,

    /// The target did not resolve to a connected element.
    #[error("Element not found when calling `fillText('{description}')`.")]
    ElementNotFound {
        /// Description of the unresolved target.
        description: String,
    },

    /// No text was supplied. An empty string is valid text.
    #[error("Must provide `text` when calling `fillText('{description}')`.")]
    MissingText {
        /// Description of the target.
        description: String,
    },

    /// The form control is disabled.
    #[error("Can not `fillText` disabled '{description}'.")]
    Disabled {
        /// Description of the target.
        description: String,
    },

    /// The form control is read-only.
    #[error("Can not `fillText` readonly '{description}'.")]
    ReadOnly {
        /// Description of the target.
        description: String,
    },

    /// The text is longer than the control's `maxlength`.
    #[error("Can not `fillText` '{description}' with text: '{text}' that exceeds maxlength: '{max_length}'.")]
    MaxLengthExceeded {
        /// Description of the target.
        description: String,
        /// The rejected text.
        text: String,
        /// The declared maximum length.
        max_length: usize,
    },

    /// The element is neither a form control nor content-editable.
    #[error("`fillText` is only usable on form controls or contenteditable elements, got '{description}'.")]
    Unsupported {
        /// Description of the target.
        description: String,
    },

    /// A start or end hook failed.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The target could not be resolved (e.g. invalid selector).
    #[error("Could not resolve target: {0}")]
    Resolve(DomError),

    /// Focusing the element failed.
    #[error("Could not focus element: {0}")]
    Focus(DomError),

    /// Dispatching `input` or `change` failed.
    #[error("Could not dispatch event: {0}")]
    Dispatch(DomError),

    /// The application did not settle.
    #[error(transparent)]
    Settle(#[from] SettleError),
}

impl FillError {
    /// Returns true for the validation failures that are checked before any
    /// mutation happens.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FillError::MissingTarget
                | FillError::ElementNotFound { .. }
                | FillError::MissingText { .. }
                | FillError::Disabled { .. }
                | FillError::ReadOnly { .. }
                | FillError::MaxLengthExceeded { .. }
                | FillError::Unsupported { .. }
        )
    }
}
