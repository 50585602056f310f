//! # settlekit-core
//!
//! Settled-aware form interaction helpers for UI tests.
//!
//! The centrepiece is [`fill::FillText`], which fills text into a form
//! control or content-editable element the way a user would: it focuses the
//! element, assigns the value, fires `input` then `change`, and resolves only
//! once the application has no outstanding work. Start and end hooks bracket
//! every call.
//!
//! Everything the helper touches is reached through a trait, so a test can
//! swap in its own element lookup, focus, event dispatch, or settledness
//! check. The crate ships in-memory implementations of all of them over a
//! small DOM model.
//!
//! ## Modules
//!
//! - [`document`] - In-memory document tree with element handles
//! - [`markup`] - HTML fragment parsing and serialization helpers
//! - [`selector`] - CSS selector subset used for lookups
//! - [`target`] - Targets (element, selector, descriptor) and their resolution
//! - [`control`] - Form control classification and value access
//! - [`guard`] - `maxlength` checks
//! - [`events`] - DOM events, listeners, and dispatch
//! - [`focus`] - Focus management
//! - [`settled`] - Outstanding-work tracking and the settledness oracle
//! - [`hooks`] - Start/end lifecycle hooks
//! - [`fill`] - The `fillText` interaction
//! - [`element`] - Serializable element snapshots
//! - [`action`] - Scriptable actions and their logs
//! - [`executor`] - Action execution engine with result handling
//! - [`config`] - Persistent configuration
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use settlekit_core::config::SettleConfig;
//! use settlekit_core::document::Document;
//! use settlekit_core::events::DomEvent;
//! use settlekit_core::fill::FillText;
//! use settlekit_core::hooks::HookRegistry;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let doc = Document::from_html(r#"<form><input id="q"><p id="echo"></p></form>"#);
//!     let echo = doc.get_element_by_id("echo").unwrap();
//!     let input = doc.get_element_by_id("q").unwrap();
//!
//!     // The application updates the page on a timer after each change.
//!     let pending = doc.pending().clone();
//!     let listener = doc.add_event_listener(&input, "change", move |_: &DomEvent, _: &Document| {
//!         let echo = echo.clone();
//!         pending.set_timeout(Duration::from_millis(5), move || echo.set_inner_html("updated"));
//!     });
//!
//!     let fill = FillText::for_document(&doc, Arc::new(HookRegistry::new()), SettleConfig::default());
//!     fill.fill("#q", "rust").await.unwrap();
//!
//!     assert_eq!(doc.get_element_by_id("echo").unwrap().text_content(), "updated");
//!
//!     // The listener holds an element of `doc`; removing it lets the tree drop.
//!     listener.remove();
//! }
//! ```

pub mod action;
pub mod config;
pub mod control;
pub mod document;
pub mod element;
pub mod error;
pub mod events;
pub mod executor;
pub mod fill;
pub mod focus;
pub mod guard;
pub mod hooks;
pub mod markup;
pub mod selector;
pub mod settled;
pub mod target;
