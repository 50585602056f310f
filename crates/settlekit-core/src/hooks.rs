//! Lifecycle hooks for interaction helpers.
//!
//! A [`HookRegistry`] keeps, per operation name and [`HookPhase`], an ordered
//! list of hooks. Helpers run the `start` hooks before doing anything and the
//! `end` hooks after the application has settled, passing the arguments the
//! helper was called with.
//!
//! The registry is an ordinary value: construct one, register hooks on it,
//! and hand it to the helpers that should honour it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use settlekit_core::hooks::{HookArgs, HookFailure, HookPhase, HookRegistry};
//!
//! let registry = Arc::new(HookRegistry::new());
//! let handle = registry.register("fillText", HookPhase::Start, |args: &HookArgs| -> Result<(), HookFailure> {
//!     println!("filling {:?}", args.text);
//!     Ok(())
//! });
//! assert_eq!(registry.len("fillText", HookPhase::Start), 1);
//! handle.unregister();
//! assert_eq!(registry.len("fillText", HookPhase::Start), 0);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fill::FILL_TEXT;
use crate::target::{describe_optional, Target};

/// When a hook runs relative to its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    /// Before validation or any DOM change.
    Start,
    /// After the application has settled.
    End,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::Start => f.write_str("start"),
            HookPhase::End => f.write_str("end"),
        }
    }
}

/// The failure a hook reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure(pub String);

impl From<String> for HookFailure {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HookFailure {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// A hook failed, aborting the operation it was attached to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{operation}` {phase} hook failed: {message}")]
pub struct HookError {
    /// The operation the hook was registered for.
    pub operation: String,
    /// The phase it ran in.
    pub phase: HookPhase,
    /// What the hook reported.
    pub message: String,
}

/// The arguments an operation was called with.
#[derive(Debug, Clone)]
pub struct HookArgs {
    /// The target as passed by the caller (not the resolved element).
    pub target: Option<Target>,
    /// The text as passed by the caller.
    pub text: Option<String>,
}

/// A lifecycle callback.
///
/// Synchronous closures taking `&HookArgs` implement this directly; hooks
/// that need to await implement it by hand.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Runs the hook.
    async fn run(&self, args: &HookArgs) -> Result<(), HookFailure>;
}

#[async_trait]
impl<F> Hook for F
where
    F: Fn(&HookArgs) -> Result<(), HookFailure> + Send + Sync,
{
    async fn run(&self, args: &HookArgs) -> Result<(), HookFailure> {
        self(args)
    }
}

type HookKey = (String, HookPhase);
type HookList = Vec<(u64, Arc<dyn Hook>)>;

#[derive(Default)]
struct RegistryInner {
    hooks: RwLock<HashMap<HookKey, HookList>>,
    next_id: AtomicU64,
}

/// Ordered hook lists keyed by operation and phase.
#[derive(Default)]
pub struct HookRegistry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks = self.inner.hooks.read();
        let mut map = f.debug_map();
        for ((operation, phase), list) in hooks.iter() {
            map.entry(&format!("{}:{}", operation, phase), &list.len());
        }
        map.finish()
    }
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with a `start` hook on `fillText` that logs each
    /// call at debug level.
    pub fn with_logging() -> Self {
        let registry = Self::new();
        // Never unregistered; lives as long as the registry.
        let _ = registry.register(FILL_TEXT, HookPhase::Start, |args: &HookArgs| -> Result<(), HookFailure> {
            debug!(
                operation = FILL_TEXT,
                target = %describe_optional(args.target.as_ref()),
                text = ?args.text,
                "interaction"
            );
            Ok(())
        });
        registry
    }

    /// Appends `hook` to the list for (`operation`, `phase`).
    pub fn register(
        &self,
        operation: impl Into<String>,
        phase: HookPhase,
        hook: impl Hook + 'static,
    ) -> HookHandle {
        let key = (operation.into(), phase);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .hooks
            .write()
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(hook)));
        HookHandle {
            registry: Arc::downgrade(&self.inner),
            key,
            id,
        }
    }

    /// Number of hooks registered for (`operation`, `phase`).
    pub fn len(&self, operation: &str, phase: HookPhase) -> usize {
        self.inner
            .hooks
            .read()
            .get(&(operation.to_string(), phase))
            .map_or(0, Vec::len)
    }

    /// Returns true if no hooks are registered at all.
    pub fn is_empty(&self) -> bool {
        self.inner.hooks.read().values().all(Vec::is_empty)
    }

    /// Runs the hooks for (`operation`, `phase`) one after another in
    /// registration order. The first failure stops the run.
    ///
    /// The list is snapshotted first, so hooks may register or unregister
    /// hooks without deadlocking; such changes apply to the next run.
    pub async fn run(&self, operation: &str, phase: HookPhase, args: &HookArgs) -> Result<(), HookError> {
        let hooks: Vec<Arc<dyn Hook>> = self
            .inner
            .hooks
            .read()
            .get(&(operation.to_string(), phase))
            .map(|list| list.iter().map(|(_, hook)| Arc::clone(hook)).collect())
            .unwrap_or_default();

        for hook in hooks {
            if let Err(HookFailure(message)) = hook.run(args).await {
                warn!(operation, %phase, %message, "hook failed");
                return Err(HookError {
                    operation: operation.to_string(),
                    phase,
                    message,
                });
            }
        }
        Ok(())
    }
}

/// Handle for removing a registered hook.
#[must_use = "dropping the handle keeps the hook registered with no way to remove it"]
#[derive(Debug)]
pub struct HookHandle {
    registry: Weak<RegistryInner>,
    key: HookKey,
    id: u64,
}

impl HookHandle {
    /// Removes the hook. Does nothing if the registry is gone.
    pub fn unregister(self) {
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        let mut hooks = inner.hooks.write();
        if let Some(list) = hooks.get_mut(&self.key) {
            list.retain(|(id, _)| *id != self.id);
        }
    }
}
