//! End-to-end script tests.
//!
//! These tests exercise the full path:
//!   JSON script -> ActionType -> ActionExecutor -> FillText -> document -> ActionLog

mod common;

use std::sync::Arc;
use std::time::Duration;

use settlekit_core::action::{ActionResult, ActionType};
use settlekit_core::config::{SettleConfig, SettlekitConfig};
use settlekit_core::document::Document;
use settlekit_core::element::ElementSnapshot;
use settlekit_core::executor::ActionExecutor;
use settlekit_core::hooks::HookRegistry;

const PAGE: &str = r#"
    <form>
      <label>Name <input id="name"></label>
      <textarea id="about"></textarea>
      <div id="editor" contenteditable></div>
      <p id="greeting"></p>
    </form>
"#;

fn executor() -> ActionExecutor {
    let doc = Document::from_html(PAGE);
    let name = doc.get_element_by_id("name").unwrap();
    let greeting = doc.get_element_by_id("greeting").unwrap();
    common::echo_on_change(&doc, &name, &greeting, Duration::from_millis(30));
    ActionExecutor::new(doc, Arc::new(HookRegistry::with_logging()), SettleConfig::default())
}

fn parse(script: &str) -> Vec<ActionType> {
    serde_json::from_str(script).expect("script should parse")
}

#[tokio::test(start_paused = true)]
async fn script_runs_to_completion() {
    let executor = executor();
    let logs = executor
        .run_script(parse(
            r##"[
                {"type": "LogComment", "message": "fill the form"},
                {"type": "FillText", "selector": "Name", "text": "Ada", "by_label": true},
                {"type": "FillText", "selector": "#editor", "text": "<i>rich</i>"},
                {"type": "WaitForSettled", "timeout_ms": 1000},
                {"type": "GetText", "selector": "#greeting"},
                {"type": "GetValue", "selector": "#name"}
            ]"##,
        ))
        .await;

    assert_eq!(logs.len(), 6);
    assert!(logs.iter().all(|log| log.succeeded()), "{:?}", logs);
    assert_eq!(logs[4].data.as_deref(), Some("Ada"));
    assert_eq!(logs[5].data.as_deref(), Some("Ada"));

    let editor: ElementSnapshot = serde_json::from_str(logs[2].data.as_deref().unwrap()).unwrap();
    assert_eq!(editor.inner_html, "<i>rich</i>");
    assert!(editor.focused);
}

#[tokio::test]
async fn failing_step_ends_the_log() {
    let executor = executor();
    let logs = executor
        .run_script(parse(
            r##"[
                {"type": "FillText", "selector": "#about", "text": "hello"},
                {"type": "FillText", "selector": "#greeting", "text": "nope"},
                {"type": "GetValue", "selector": "#about"}
            ]"##,
        ))
        .await;

    assert_eq!(logs.len(), 2);
    match &logs[1].result {
        ActionResult::Failure(message) => assert!(message.contains("#greeting"), "{message}"),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn fill_without_text_is_reported() {
    let executor = executor();
    let result = executor
        .execute(ActionType::FillText {
            selector: "#about".to_string(),
            text: None,
            by_label: false,
        })
        .await;

    assert!(!result.success);
    assert_eq!(result.message, "Must provide `text` when calling `fillText('#about')`.");
}

#[tokio::test]
async fn blank_selector_is_a_missing_target() {
    let executor = executor();
    let result = executor
        .execute(ActionType::FillText {
            selector: "  ".to_string(),
            text: Some("x".to_string()),
            by_label: false,
        })
        .await;

    assert!(!result.success);
    assert!(result.message.starts_with("Must pass an element"));
}

#[test]
fn config_file_drives_settle_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"settle": {"poll_interval_ms": 5, "timeout_ms": 250}}"#).unwrap();

    let config = SettlekitConfig::load_from(&path).unwrap();

    assert_eq!(config.settle.poll_interval(), Duration::from_millis(5));
    assert_eq!(config.settle.timeout(), Some(Duration::from_millis(250)));
}
