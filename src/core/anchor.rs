use crate::core::flags::Flags;
use crate::core::hook::{Hook, HookLogic, Passthrough};
use crate::core::options::HookOptions;
use crate::core::telemetry::Tracer;
use crate::core::{Chainable, HookRef, HookTarget, Settings, Thing};
use crate::error::{HookError, Result};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub const DEFAULT_ANCHOR_NAME: &str = "Anchor";

/// Setting key selecting the [`FanOutPolicy`] (`"fail_fast"` or `"continue"`).
pub const FAN_OUT_KEY: &str = "fan_out";

/// What an anchor does when one of its children fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOutPolicy {
    /// Stop at the first failing child and return its error.
    #[default]
    FailFast,
    /// Run every child, then report all failures as one [`HookError::FanOut`].
    Continue,
}

/// A hook that also fans out to an ordered collection of child hooks.
///
/// An anchor really just is a [`Hook`] plus the collection, so it derefs to the
/// inner hook for everything the two share. Children run after the successor
/// chain and before the anchor's own post-process, one at a time, in insertion
/// order. The same hook may appear several times and runs once per occurrence.
pub struct Anchor {
    hook: Hook,
    hooks: Mutex<Vec<HookRef>>,
    policy: FanOutPolicy,
}

/// The Deref is needed to reach the inner `Hook` of the `Anchor` easily
impl std::ops::Deref for Anchor {
    type Target = Hook;

    fn deref(&self) -> &Self::Target {
        &self.hook
    }
}

impl Anchor {
    pub fn new<L: HookLogic>(behaviour: L) -> Self {
        Self::with_options(behaviour, HookOptions::default())
    }

    /// Creates an anchor; the `fan_out` setting picks the failure policy.
    pub fn with_options<L: HookLogic>(behaviour: L, options: impl Into<HookOptions>) -> Self {
        let mut defaults = Settings::new();
        defaults.insert(FAN_OUT_KEY.to_string(), "fail_fast".into());

        let hook = Hook::build(
            behaviour,
            options.into(),
            DEFAULT_ANCHOR_NAME,
            defaults,
            Flags::anchor(),
        );
        let policy = match hook.setting::<FanOutPolicy>(FAN_OUT_KEY) {
            Ok(policy) => policy.unwrap_or_default(),
            Err(e) => {
                log::warn!(
                    "Anchor '{}' has an invalid '{}' setting ({}), using fail_fast.",
                    hook.name(),
                    FAN_OUT_KEY,
                    e
                );
                FanOutPolicy::default()
            }
        };

        Anchor {
            hook,
            hooks: Mutex::new(Vec::new()),
            policy,
        }
    }

    /// An anchor whose own lifecycle does nothing; only its links matter.
    pub fn empty() -> Self {
        Self::new(Passthrough)
    }

    pub fn with_policy(mut self, policy: FanOutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FanOutPolicy {
        self.policy
    }

    /// A snapshot of the children, in execution order.
    pub fn hooks(&self) -> Vec<HookRef> {
        self.hooks_mut().clone()
    }

    /// Direct access to the children collection.
    ///
    /// Nothing here is checked; prefer [`push_hook`](Anchor::push_hook), which
    /// refuses cycles and resolves identifiers. Do not hold the guard across
    /// a call to `process`.
    pub fn hooks_mut(&self) -> MutexGuard<'_, Vec<HookRef>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a child. Identifiers are resolved through the registry;
    /// non-hooks and hooks that would form a cycle are ignored.
    pub fn push_hook(&self, target: impl Into<HookTarget>) -> Result<Option<HookRef>> {
        let Some(hook) = self.hook.resolve(target.into())? else {
            return Ok(None);
        };
        if hook.reaches(self.id()) {
            log::warn!(
                "Warning: Adding '{}' to anchor '{}' would form a cycle, ignoring it.",
                hook.name(),
                self.name()
            );
            return Ok(None);
        }
        self.hooks_mut().push(hook.clone());
        Ok(Some(hook))
    }

    async fn fan_out(&self, thing: &mut Thing, tracer: Option<&dyn Tracer>) -> Result<()> {
        let children = self.hooks();
        if children.is_empty() {
            return Ok(());
        }
        log::trace!(
            "Anchor '{}' fanning out to {} hook(s)",
            self.name(),
            children.len()
        );

        match self.policy {
            FanOutPolicy::FailFast => {
                for child in &children {
                    child.run_traced(thing, tracer).await?;
                }
                Ok(())
            }
            FanOutPolicy::Continue => {
                let mut failures = Vec::new();
                for child in &children {
                    if let Err(e) = child.run_traced(thing, tracer).await {
                        log::warn!("Anchor '{}' child failed: {}", self.name(), e);
                        failures.push(e);
                    }
                }
                if failures.is_empty() {
                    Ok(())
                } else {
                    Err(HookError::FanOut {
                        anchor: self.name().to_string(),
                        failures,
                    })
                }
            }
        }
    }
}

#[async_trait]
impl Chainable for Anchor {
    fn id(&self) -> Uuid {
        self.hook.id()
    }

    fn name(&self) -> &str {
        self.hook.name()
    }

    fn flags(&self) -> Flags {
        self.hook.flags()
    }

    fn set_own_flags(&self, value: bool) {
        self.hook.set_own_flags(value);
    }

    fn successor(&self) -> Option<HookRef> {
        self.hook.successor()
    }

    fn take_successor(&self) -> Option<HookRef> {
        self.hook.take_successor()
    }

    fn children(&self) -> Vec<HookRef> {
        self.hooks()
    }

    fn attach(&self, target: HookTarget) -> Result<Option<HookRef>> {
        self.hook.attach(target)
    }

    async fn enter(&self, thing: &mut Thing, tracer: Option<&dyn Tracer>) -> Result<()> {
        self.hook.check_and_execute(thing, tracer).await
    }

    async fn leave(&self, thing: &mut Thing, tracer: Option<&dyn Tracer>) -> Result<()> {
        self.fan_out(thing, tracer).await?;
        self.hook.finish(thing, tracer).await
    }
}
