//! Scripted actions and their log records.
//!
//! Scripts are JSON arrays of [`ActionType`] values, tagged by `type`:
//!
//! ```json
//! [
//!   {"type": "FillText", "selector": "#email", "text": "a@b.c"},
//!   {"type": "FillText", "selector": "Name", "text": "Ada", "by_label": true},
//!   {"type": "WaitForSettled", "timeout_ms": 2000},
//!   {"type": "GetValue", "selector": "#email"}
//! ]
//! ```
//!
//! # Example
//!
//! ```
//! use settlekit_core::action::{ActionLog, ActionResult, ActionType};
//!
//! let action = ActionType::FillText {
//!     selector: "#email".to_string(),
//!     text: Some("a@b.c".to_string()),
//!     by_label: false,
//! };
//! let log = ActionLog::new(action, ActionResult::Success, Some(3));
//! println!("Action {} at {}", log.id, log.timestamp);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The result of executing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionResult {
    /// The action completed successfully.
    Success,

    /// The action failed with the given error message.
    Failure(String),
}

/// Actions a script can perform against a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActionType {
    /// Fill text into a form control or content-editable element.
    FillText {
        /// CSS selector, or label text when `by_label` is set.
        selector: String,
        /// The text to fill. Omitting it is reported as missing text.
        #[serde(default)]
        text: Option<String>,
        /// Treat `selector` as the text of a `<label>`.
        #[serde(default)]
        by_label: bool,
    },

    /// Read the value of a form control.
    GetValue {
        /// CSS selector.
        selector: String,
    },

    /// Read the text content of an element.
    GetText {
        /// CSS selector.
        selector: String,
    },

    /// Wait until no application work is outstanding.
    WaitForSettled {
        /// Overrides the configured settle timeout.
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Log a comment (for documentation purposes).
    LogComment {
        /// The comment text.
        message: String,
    },
}

impl ActionType {
    /// Returns a short, static name for this action type suitable for use in
    /// tracing span metadata.
    pub fn name(&self) -> &'static str {
        match self {
            ActionType::FillText { .. } => "fill_text",
            ActionType::GetValue { .. } => "get_value",
            ActionType::GetText { .. } => "get_text",
            ActionType::WaitForSettled { .. } => "wait_for_settled",
            ActionType::LogComment { .. } => "log_comment",
        }
    }
}

/// A logged action with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    /// Unique identifier for this log entry.
    pub id: Uuid,

    /// When the action finished.
    pub timestamp: DateTime<Utc>,

    /// The action that was performed.
    pub action: ActionType,

    /// The result of the action.
    pub result: ActionResult,

    /// Data returned by the action (JSON snapshot, value, or text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// How long the action took in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ActionLog {
    /// Creates a new action log entry with a fresh id and the current time.
    pub fn new(action: ActionType, result: ActionResult, duration_ms: Option<u64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            result,
            data: None,
            duration_ms,
        }
    }

    /// Attaches returned data.
    pub fn with_data(mut self, data: Option<String>) -> Self {
        self.data = data;
        self
    }

    /// Returns true if the action succeeded.
    pub fn succeeded(&self) -> bool {
        matches!(self.result, ActionResult::Success)
    }
}
