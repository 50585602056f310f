//! Script execution against an in-memory document.
//!
//! [`ActionExecutor`] runs [`ActionType`]s one at a time. It is what the CLI
//! drives, and it is a convenient way to replay a recorded interaction in a
//! test without wiring the collaborators by hand.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use settlekit_core::action::ActionType;
//! use settlekit_core::config::SettleConfig;
//! use settlekit_core::document::Document;
//! use settlekit_core::executor::ActionExecutor;
//! use settlekit_core::hooks::HookRegistry;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let doc = Document::from_html(r#"<input id="email">"#);
//!     let executor = ActionExecutor::new(doc, Arc::new(HookRegistry::new()), SettleConfig::default());
//!
//!     let result = executor
//!         .execute(ActionType::FillText {
//!             selector: "#email".to_string(),
//!             text: Some("a@b.c".to_string()),
//!             by_label: false,
//!         })
//!         .await;
//!
//!     assert!(result.success);
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info_span, Instrument};

use crate::action::{ActionLog, ActionResult, ActionType};
use crate::config::SettleConfig;
use crate::control::{classify, ElementKind, ValueControl};
use crate::document::{Document, ElementRef};
use crate::element::ElementSnapshot;
use crate::fill::FillText;
use crate::hooks::HookRegistry;
use crate::settled::{SettlednessOracle, Settler};
use crate::target::{DocumentResolver, ElementResolver, Target};

/// Result of executing an action.
///
/// Contains success/failure status along with optional data returned
/// by the action (element snapshot, value, or text).
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Whether the action completed successfully.
    pub success: bool,
    /// Human-readable description of the result.
    pub message: String,
    /// Additional data returned by the action.
    pub data: Option<String>,
}

impl ExecutionResult {
    /// Creates a successful result with a message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a failure result with an error message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    /// Adds data to the result.
    pub fn with_data(mut self, data: String) -> Self {
        self.data = Some(data);
        self
    }
}

/// Executes scripted actions against one [`Document`].
pub struct ActionExecutor {
    document: Document,
    fill: FillText,
    resolver: DocumentResolver,
    settle: SettleConfig,
}

impl ActionExecutor {
    /// Creates an executor that fills through the in-memory collaborators of
    /// `document` and notifies `hooks`.
    pub fn new(document: Document, hooks: Arc<HookRegistry>, settle: SettleConfig) -> Self {
        let fill = FillText::for_document(&document, hooks, settle);
        Self::with_fill(document, fill, settle)
    }

    /// Creates an executor around an already wired [`FillText`].
    pub fn with_fill(document: Document, fill: FillText, settle: SettleConfig) -> Self {
        Self {
            resolver: DocumentResolver::new(document.clone()),
            document,
            fill,
            settle,
        }
    }

    /// Returns the document actions run against.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Executes an action and returns the result.
    pub async fn execute(&self, action: ActionType) -> ExecutionResult {
        let action_name = action.name();
        let span = info_span!("execute_action", action = action_name);
        async {
            let start = Instant::now();
            let result = self.execute_inner(action).await;
            let elapsed = start.elapsed();
            debug!(elapsed_ms = elapsed.as_millis() as u64, success = result.success, "action complete");
            result
        }
        .instrument(span)
        .await
    }

    /// Executes `actions` in order, stopping after the first failure.
    ///
    /// Returns one log entry per executed action, so a failed script's log
    /// ends with the failing entry.
    pub async fn run_script(&self, actions: Vec<ActionType>) -> Vec<ActionLog> {
        let mut logs = Vec::with_capacity(actions.len());
        for action in actions {
            let start = Instant::now();
            let result = self.execute(action.clone()).await;
            let duration_ms = start.elapsed().as_millis() as u64;
            let outcome = if result.success {
                ActionResult::Success
            } else {
                ActionResult::Failure(result.message)
            };
            let log = ActionLog::new(action, outcome, Some(duration_ms)).with_data(result.data);
            let failed = !log.succeeded();
            logs.push(log);
            if failed {
                break;
            }
        }
        logs
    }

    async fn execute_inner(&self, action: ActionType) -> ExecutionResult {
        match action {
            ActionType::FillText {
                selector,
                text,
                by_label,
            } => {
                let target = if by_label {
                    Target::label(selector.as_str())
                } else {
                    Target::selector(selector.as_str())
                };
                let description = target.description();
                match self.fill.fill_text(Some(target.clone()), text.as_deref()).await {
                    Ok(()) => {
                        let result = ExecutionResult::success(format!("Filled '{}'", description));
                        match self.lookup(&target).await {
                            Ok(element) => attach_snapshot(result, element.snapshot()),
                            Err(_) => result,
                        }
                    }
                    Err(e) => ExecutionResult::failure(e.to_string()),
                }
            }

            ActionType::GetValue { selector } => {
                let element = match self.lookup(&Target::selector(selector.as_str())).await {
                    Ok(element) => element,
                    Err(message) => return ExecutionResult::failure(message),
                };
                match classify(&element) {
                    ElementKind::Control(control) => {
                        ExecutionResult::success(format!("Got value for '{}'", selector))
                            .with_data(control.as_value_control().value())
                    }
                    ElementKind::ContentEditable(_) | ElementKind::Unsupported(_) => {
                        ExecutionResult::failure(format!("Element '{}' has no value", selector))
                    }
                }
            }

            ActionType::GetText { selector } => match self.lookup(&Target::selector(selector.as_str())).await {
                Ok(element) => {
                    ExecutionResult::success(format!("Got text for '{}'", selector)).with_data(element.text_content())
                }
                Err(message) => ExecutionResult::failure(message),
            },

            ActionType::WaitForSettled { timeout_ms } => {
                let timeout = timeout_ms.map(Duration::from_millis).or_else(|| self.settle.timeout());
                let settler = Settler::new(self.document.pending().clone(), self.settle).with_timeout(timeout);
                match settler.settled().await {
                    Ok(()) => ExecutionResult::success("Settled"),
                    Err(e) => ExecutionResult::failure(e.to_string()),
                }
            }

            ActionType::LogComment { message } => ExecutionResult::success(format!("Logged: {}", message)),
        }
    }

    async fn lookup(&self, target: &Target) -> Result<ElementRef, String> {
        match self.resolver.resolve(target).await {
            Ok(Some(element)) => Ok(element),
            Ok(None) => Err(format!("Element '{}' not found", target.description())),
            Err(e) => Err(e.to_string()),
        }
    }
}

fn attach_snapshot(result: ExecutionResult, snapshot: ElementSnapshot) -> ExecutionResult {
    match serde_json::to_string(&snapshot) {
        Ok(json) => result.with_data(json),
        Err(e) => ExecutionResult::failure(format!("JSON serialization error: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settled::PendingKind;

    fn executor(html: &str) -> ActionExecutor {
        ActionExecutor::new(
            Document::from_html(html),
            Arc::new(HookRegistry::new()),
            SettleConfig::default(),
        )
    }

    fn fill(selector: &str, text: Option<&str>, by_label: bool) -> ActionType {
        ActionType::FillText {
            selector: selector.to_string(),
            text: text.map(str::to_string),
            by_label,
        }
    }

    #[tokio::test]
    async fn fill_returns_snapshot() {
        let executor = executor(r#"<input id="email">"#);
        let result = executor.execute(fill("#email", Some("a@b.c"), false)).await;

        assert!(result.success, "{}", result.message);
        let snapshot: ElementSnapshot = serde_json::from_str(&result.data.unwrap()).unwrap();
        assert_eq!(snapshot.value.as_deref(), Some("a@b.c"));
        assert!(snapshot.focused);
    }

    #[tokio::test]
    async fn fill_by_label() {
        let executor = executor(r#"<label for="n">Name</label><input id="n">"#);
        let result = executor.execute(fill("Name", Some("Ada"), true)).await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.message, "Filled 'label \"Name\"'");

        let value = executor
            .execute(ActionType::GetValue {
                selector: "#n".to_string(),
            })
            .await;
        assert_eq!(value.data.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn fill_failure_carries_message() {
        let executor = executor(r#"<input id="email" disabled>"#);
        let result = executor.execute(fill("#email", Some("x"), false)).await;
        assert!(!result.success);
        assert_eq!(result.message, "Can not `fillText` disabled '#email'.");
    }

    #[tokio::test]
    async fn get_value_of_non_control_fails() {
        let executor = executor(r#"<p id="p">hello <b>there</b></p>"#);
        let value = executor
            .execute(ActionType::GetValue {
                selector: "#p".to_string(),
            })
            .await;
        assert!(!value.success);

        let text = executor
            .execute(ActionType::GetText {
                selector: "#p".to_string(),
            })
            .await;
        assert_eq!(text.data.as_deref(), Some("hello there"));
    }

    #[tokio::test]
    async fn missing_element_fails_lookup() {
        let executor = executor("<div></div>");
        let result = executor
            .execute(ActionType::GetText {
                selector: "#nope".to_string(),
            })
            .await;
        assert!(!result.success);
        assert!(result.message.contains("#nope"));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_settled_honors_timeout_override() {
        let executor = executor("<div></div>");
        let _guard = executor.document().pending().track(PendingKind::Request);

        let result = executor
            .execute(ActionType::WaitForSettled { timeout_ms: Some(50) })
            .await;
        assert!(!result.success);
        assert!(result.message.contains("requests=1"), "{}", result.message);
    }

    #[tokio::test]
    async fn script_stops_at_first_failure() {
        let executor = executor(r#"<input id="a"><input id="b" readonly>"#);
        let logs = executor
            .run_script(vec![
                fill("#a", Some("one"), false),
                fill("#b", Some("two"), false),
                ActionType::LogComment {
                    message: "never".to_string(),
                },
            ])
            .await;

        assert_eq!(logs.len(), 2);
        assert!(logs[0].succeeded());
        assert!(matches!(&logs[1].result, ActionResult::Failure(m) if m.contains("readonly")));
        assert!(logs.iter().all(|log| log.duration_ms.is_some()));
    }
}
