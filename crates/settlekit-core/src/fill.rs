//! The `fillText` interaction.
//!
//! [`FillText`] simulates a user typing text into a form control or a
//! content-editable element and resolves once the application has settled.
//! One call runs these steps strictly in order, each awaiting the previous:
//!
//! 1. `start` hooks for `fillText`, with the caller's target and text
//! 2. validation (target present, resolvable, text present, element
//!    fillable); nothing is mutated unless every check passes
//! 3. focus the element
//! 4. assign the value (form controls) or the inner markup (content-editable)
//! 5. fire `input`, then `change`
//! 6. wait for the settledness oracle
//! 7. `end` hooks, again with the caller's original target and text
//!
//! There is no cancellation and no timeout at this layer; wrap the returned
//! future in `tokio::time::timeout` if one is needed. Two concurrent calls on
//! the same element are not serialized against each other.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use settlekit_core::config::SettleConfig;
//! use settlekit_core::control::{classify, ElementKind, ValueControl};
//! use settlekit_core::document::Document;
//! use settlekit_core::fill::FillText;
//! use settlekit_core::hooks::HookRegistry;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let doc = Document::from_html(r#"<input id="name">"#);
//!     let fill = FillText::for_document(&doc, Arc::new(HookRegistry::new()), SettleConfig::default());
//!
//!     fill.fill("#name", "hello world").await.unwrap();
//!
//!     let input = doc.get_element_by_id("name").unwrap();
//!     match classify(&input) {
//!         ElementKind::Control(control) => assert_eq!(control.as_value_control().value(), "hello world"),
//!         _ => unreachable!(),
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info_span, Instrument};

use crate::config::SettleConfig;
use crate::control::{classify, ElementKind, FormControl};
use crate::document::{Document, ElementRef};
use crate::error::FillError;
use crate::events::{DocumentDispatcher, EventDispatcher};
use crate::focus::{DocumentFocus, FocusController};
use crate::guard::guard_for_maxlength;
use crate::hooks::{HookArgs, HookPhase, HookRegistry};
use crate::settled::{SettlednessOracle, Settler};
use crate::target::{describe_optional, DocumentResolver, ElementResolver, Target};

/// Operation name used for hooks and error messages.
pub const FILL_TEXT: &str = "fillText";

/// Where a fill call is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPhase {
    Idle,
    Validating,
    Focusing,
    Mutating,
    DispatchingInput,
    DispatchingChange,
    Settling,
    Done,
    Failed,
}

impl fmt::Display for FillPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FillPhase::Idle => "idle",
            FillPhase::Validating => "validating",
            FillPhase::Focusing => "focusing",
            FillPhase::Mutating => "mutating",
            FillPhase::DispatchingInput => "dispatching_input",
            FillPhase::DispatchingChange => "dispatching_change",
            FillPhase::Settling => "settling",
            FillPhase::Done => "done",
            FillPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct PhaseTracker {
    current: FillPhase,
}

impl PhaseTracker {
    fn advance(&mut self, next: FillPhase) {
        debug!(from = %self.current, to = %next, "fill phase");
        self.current = next;
    }
}

/// The single mutation strategy chosen for a request.
enum Mutation {
    Value(FormControl),
    Markup(ElementRef),
}

impl Mutation {
    fn element(&self) -> &ElementRef {
        match self {
            Mutation::Value(control) => control.element(),
            Mutation::Markup(element) => element,
        }
    }

    fn apply(&self, text: &str) {
        match self {
            Mutation::Value(control) => control.as_value_control().set_value(text),
            // Markup is injected as-is. Fixtures rely on this to build rich
            // content; escaping is the caller's business.
            Mutation::Markup(element) => element.set_inner_html(text),
        }
    }
}

/// Runs `fillText` against injected collaborators.
pub struct FillText {
    resolver: Arc<dyn ElementResolver>,
    focus: Arc<dyn FocusController>,
    dispatcher: Arc<dyn EventDispatcher>,
    settled: Arc<dyn SettlednessOracle>,
    hooks: Arc<HookRegistry>,
}

impl fmt::Debug for FillText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillText").field("hooks", &self.hooks).finish_non_exhaustive()
    }
}

impl FillText {
    /// Creates a sequencer from its collaborators.
    pub fn new(
        resolver: Arc<dyn ElementResolver>,
        focus: Arc<dyn FocusController>,
        dispatcher: Arc<dyn EventDispatcher>,
        settled: Arc<dyn SettlednessOracle>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        Self {
            resolver,
            focus,
            dispatcher,
            settled,
            hooks,
        }
    }

    /// Wires the in-memory implementations of every collaborator for
    /// `document`.
    pub fn for_document(document: &Document, hooks: Arc<HookRegistry>, config: SettleConfig) -> Self {
        Self::new(
            Arc::new(DocumentResolver::new(document.clone())),
            Arc::new(DocumentFocus::new()),
            Arc::new(DocumentDispatcher::new()),
            Arc::new(Settler::new(document.pending().clone(), config)),
            hooks,
        )
    }

    /// The hook registry this sequencer notifies.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Shorthand for [`fill_text`](Self::fill_text) with both arguments present.
    pub async fn fill(&self, target: impl Into<Target>, text: &str) -> Result<(), FillError> {
        self.fill_text(Some(target.into()), Some(text)).await
    }

    /// Fills `text` into `target` and waits for the application to settle.
    ///
    /// Either argument may be absent, mirroring callers that pass nothing;
    /// absence is reported as [`FillError::MissingTarget`] or
    /// [`FillError::MissingText`] after the `start` hooks have run.
    pub async fn fill_text(&self, target: Option<Target>, text: Option<&str>) -> Result<(), FillError> {
        let span = info_span!("fill_text", target = %describe_optional(target.as_ref()));
        async {
            let mut phase = PhaseTracker {
                current: FillPhase::Idle,
            };
            let result = self.run(target, text, &mut phase).await;
            match &result {
                Ok(()) => debug!("fill complete"),
                Err(error) => {
                    debug!(failed_in = %phase.current, %error, "fill failed");
                    phase.advance(FillPhase::Failed);
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        target: Option<Target>,
        text: Option<&str>,
        phase: &mut PhaseTracker,
    ) -> Result<(), FillError> {
        let args = HookArgs {
            target,
            text: text.map(str::to_string),
        };
        self.hooks.run(FILL_TEXT, HookPhase::Start, &args).await?;

        phase.advance(FillPhase::Validating);
        let (mutation, text) = self.validate(args.target.as_ref(), text).await?;
        let element = mutation.element().clone();

        phase.advance(FillPhase::Focusing);
        self.focus.focus(&element).await.map_err(FillError::Focus)?;

        phase.advance(FillPhase::Mutating);
        mutation.apply(text);

        phase.advance(FillPhase::DispatchingInput);
        self.dispatcher
            .fire_event(&element, "input")
            .await
            .map_err(FillError::Dispatch)?;

        phase.advance(FillPhase::DispatchingChange);
        self.dispatcher
            .fire_event(&element, "change")
            .await
            .map_err(FillError::Dispatch)?;

        phase.advance(FillPhase::Settling);
        self.settled.settled().await?;

        self.hooks.run(FILL_TEXT, HookPhase::End, &args).await?;
        phase.advance(FillPhase::Done);
        Ok(())
    }

    /// Checks run in a fixed order and the first failure wins.
    async fn validate<'t>(
        &self,
        target: Option<&Target>,
        text: Option<&'t str>,
    ) -> Result<(Mutation, &'t str), FillError> {
        let target = match target {
            Some(target) if !target.is_missing() => target,
            _ => return Err(FillError::MissingTarget),
        };
        let description = target.description();

        let element = self
            .resolver
            .resolve(target)
            .await
            .map_err(FillError::Resolve)?
            .ok_or_else(|| FillError::ElementNotFound {
                description: description.clone(),
            })?;

        let text = text.ok_or_else(|| FillError::MissingText {
            description: description.clone(),
        })?;

        let mutation = match classify(&element) {
            ElementKind::Control(control) => {
                let value = control.as_value_control();
                if value.is_disabled() {
                    return Err(FillError::Disabled { description });
                }
                if value.is_read_only() {
                    return Err(FillError::ReadOnly { description });
                }
                guard_for_maxlength(&control, text, &description)?;
                Mutation::Value(control)
            }
            ElementKind::ContentEditable(element) => Mutation::Markup(element),
            ElementKind::Unsupported(_) => return Err(FillError::Unsupported { description }),
        };
        Ok((mutation, text))
    }
}
