use crate::core::flags::{FlagCell, Flags};
use crate::core::options::HookOptions;
use crate::core::registry::HookRegistry;
use crate::core::telemetry::{PhaseOutcome, TraceEntry, Tracer};
use crate::core::{AsAny, Chainable, HookRef, HookTarget, Phase, Settings, Thing};
use crate::error::{HookError, Result};

use async_trait::async_trait;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

pub const DEFAULT_HOOK_NAME: &str = "Hook";

/// A unit of work in a processing chain.
///
/// A `Hook` runs a three-phase lifecycle over the shared [`Thing`]:
/// 1. **Pre-process**: a gate; returning `false` skips execute (may mutate the thing)
/// 2. **Execute**: the main work, only when the gate and the `execute` flag allow it
/// 3. **Post-process**: runs after the whole successor chain, if the `post_process` flag allows it
///
/// Hooks are shared through [`HookRef`]s and link to at most one successor;
/// linking more appends to the tail of the chain.
pub struct Hook {
    /// Internal hook data including settings, flags and the successor link
    pub(crate) data: HookCore,
    /// The logic implementation that defines the hook's behavior
    pub(crate) behaviour: Box<dyn HookLogic>,
}

/// Internal data structure for a hook.
pub struct HookCore {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) settings: Settings,
    pub(crate) flags: FlagCell,
    pub(crate) successor: RwLock<Option<HookRef>>,
    pub(crate) registry: Option<Arc<HookRegistry>>,
}

impl Drop for HookCore {
    fn drop(&mut self) {
        let mut next = self
            .successor
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        while let Some(unit) = next {
            next = match Arc::strong_count(&unit) {
                1 => unit.take_successor(),
                _ => None,
            };
        }
    }
}

impl Hook {
    /// Creates a new hook with the given logic and default options.
    pub fn new<L: HookLogic>(behaviour: L) -> Self {
        Self::with_options(behaviour, HookOptions::default())
    }

    /// Creates a new hook with the given logic and options.
    ///
    /// # Arguments
    /// * `behaviour` - An implementation of [`HookLogic`] that defines the hook's behavior
    /// * `options` - Name, extra settings and registry; see [`HookOptions`]
    pub fn with_options<L: HookLogic>(behaviour: L, options: impl Into<HookOptions>) -> Self {
        Self::build(
            behaviour,
            options.into(),
            DEFAULT_HOOK_NAME,
            Settings::new(),
            Flags::hook(),
        )
    }

    /// A hook that does nothing but pass the thing along.
    pub fn passthrough() -> Self {
        Self::new(Passthrough)
    }

    pub(crate) fn build<L: HookLogic>(
        mut behaviour: L,
        options: HookOptions,
        default_name: &str,
        mut defaults: Settings,
        flags: Flags,
    ) -> Self {
        defaults.extend(behaviour.defaults());
        let (name, settings) = options.merge(default_name, defaults);
        behaviour.configure(&settings);

        Hook {
            data: HookCore {
                id: Uuid::new_v4(),
                name,
                settings,
                flags: FlagCell::new(flags),
                successor: RwLock::new(None),
                registry: options.registry,
            },
            behaviour: Box::new(behaviour),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.data.settings
    }

    /// Reads one setting into `T`. `Ok(None)` if the key is absent.
    pub fn setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.data
            .settings
            .get(key)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(HookError::from)
    }

    /// The concrete logic behind this hook, if it is an `L`.
    pub fn logic<L: HookLogic>(&self) -> Option<&L> {
        let behaviour: &dyn HookLogic = &*self.behaviour;
        behaviour.as_any().downcast_ref::<L>()
    }

    /// Overwrites this hook's flags only, without touching the rest of the chain.
    pub fn replace_flags(&self, flags: Flags) {
        self.data.flags.replace(flags);
    }

    /// Attaches a hook (or an identifier to resolve) at the tail of the chain.
    ///
    /// Equivalent to `self.attach(target.into())`.
    pub fn set_hook(&self, target: impl Into<HookTarget>) -> Result<Option<HookRef>> {
        self.attach(target.into())
    }

    /// Turns a target into a unit, resolving identifiers through the registry.
    ///
    /// `Ok(None)` means the target is not a hook and should be ignored.
    pub(crate) fn resolve(&self, target: HookTarget) -> Result<Option<HookRef>> {
        match target {
            HookTarget::Hook(hook) => Ok(Some(hook)),
            HookTarget::Named { identifier, args } => {
                let registry = self
                    .data
                    .registry
                    .as_ref()
                    .ok_or_else(|| HookError::NoRegistry(identifier.clone()))?;
                log::debug!("Hook '{}' resolving '{}'", self.data.name, identifier);
                registry.resolve(&identifier, &args).map(Some)
            }
            HookTarget::Nothing => {
                log::debug!("Hook '{}' ignoring a non-hook target", self.data.name);
                Ok(None)
            }
        }
    }

    /// Pre-process, then execute if the gate and the `execute` flag allow it.
    pub(crate) async fn check_and_execute(
        &self,
        thing: &mut Thing,
        tracer: Option<&dyn Tracer>,
    ) -> Result<()> {
        let settings = &self.data.settings;
        let proceed = self
            .invoke(
                Phase::PreProcess,
                tracer,
                self.behaviour.pre_process(settings, thing),
            )
            .await?;

        if proceed && self.data.flags.get().execute {
            self.invoke(Phase::Execute, tracer, self.behaviour.execute(settings, thing))
                .await
        } else {
            log::trace!(
                "Hook '{}' skipping execute (gate: {}, flags: {:?})",
                self.data.name,
                proceed,
                self.data.flags.get()
            );
            self.trace(tracer, Phase::Execute, PhaseOutcome::Skipped);
            Ok(())
        }
    }

    pub(crate) async fn finish(&self, thing: &mut Thing, tracer: Option<&dyn Tracer>) -> Result<()> {
        if self.data.flags.get().post_process {
            self.invoke(
                Phase::PostProcess,
                tracer,
                self.behaviour.post_process(&self.data.settings, thing),
            )
            .await
        } else {
            log::trace!("Hook '{}' skipping post-process", self.data.name);
            self.trace(tracer, Phase::PostProcess, PhaseOutcome::Skipped);
            Ok(())
        }
    }

    /// Installs `hook` as the direct successor, unless it would close a cycle.
    fn link(&self, hook: HookRef) -> Result<Option<HookRef>> {
        if hook.reaches(self.data.id) {
            log::warn!(
                "Warning: Attaching '{}' to '{}' would form a cycle, ignoring it.",
                hook.name(),
                self.data.name
            );
            return Ok(None);
        }

        *self
            .data
            .successor
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&hook));
        Ok(Some(hook))
    }

    /// Awaits one phase, turning both errors and panics into a [`HookError`] tagged with this hook.
    async fn invoke<T, F>(&self, phase: Phase, tracer: Option<&dyn Tracer>, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let outcome = AssertUnwindSafe(fut).catch_unwind().await;
        let result = match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(HookError::Lifecycle {
                hook: self.data.name.clone(),
                phase,
                source: Box::new(source),
            }),
            Err(payload) => Err(HookError::Panicked {
                hook: self.data.name.clone(),
                phase,
                message: panic_message(&*payload),
            }),
        };

        match &result {
            Ok(_) => self.trace(tracer, phase, PhaseOutcome::Ran),
            Err(e) => {
                log::debug!("{}", e);
                self.trace(tracer, phase, PhaseOutcome::Failed);
            }
        }
        result
    }

    fn trace(&self, tracer: Option<&dyn Tracer>, phase: Phase, outcome: PhaseOutcome) {
        if let Some(t) = tracer {
            t.record(TraceEntry::new(self.data.id, &self.data.name, phase, outcome));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[async_trait]
impl Chainable for Hook {
    fn id(&self) -> Uuid {
        self.data.id
    }

    fn name(&self) -> &str {
        &self.data.name
    }

    fn flags(&self) -> Flags {
        self.data.flags.get()
    }

    fn set_own_flags(&self, value: bool) {
        self.data.flags.set_all(value);
    }

    fn successor(&self) -> Option<HookRef> {
        self.data
            .successor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take_successor(&self) -> Option<HookRef> {
        self.data
            .successor
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn attach(&self, target: HookTarget) -> Result<Option<HookRef>> {
        let Some(hook) = self.resolve(target)? else {
            return Ok(None);
        };

        let Some(mut tail) = self.successor() else {
            return self.link(hook);
        };
        while let Some(next) = tail.successor() {
            tail = next;
        }
        tail.attach(HookTarget::Hook(hook))
    }

    async fn enter(&self, thing: &mut Thing, tracer: Option<&dyn Tracer>) -> Result<()> {
        self.check_and_execute(thing, tracer).await
    }

    async fn leave(&self, thing: &mut Thing, tracer: Option<&dyn Tracer>) -> Result<()> {
        self.finish(thing, tracer).await
    }
}

/// Defines the behavior of a hook.
///
/// Every phase has a pass-through default, so a hook with no overrides leaves
/// the thing untouched. Implement only what you need.
#[async_trait]
pub trait HookLogic: AsAny + Send + Sync + 'static {
    /// Type-level default settings. Caller options override them.
    fn defaults(&self) -> Settings {
        Settings::new()
    }

    /// Called once at construction with the merged settings.
    fn configure(&mut self, _settings: &Settings) {}

    /// Decide whether execute should run. May mutate the thing.
    async fn pre_process(&self, _settings: &Settings, _thing: &mut Thing) -> Result<bool> {
        Ok(true)
    }

    async fn execute(&self, _settings: &Settings, _thing: &mut Thing) -> Result<()> {
        Ok(())
    }

    /// Runs after the successor chain (and an anchor's children) finished.
    async fn post_process(&self, _settings: &Settings, _thing: &mut Thing) -> Result<()> {
        Ok(())
    }
}

/// Logic with every phase left at its default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl HookLogic for Passthrough {}

/// Reads a counter out of the thing, treating anything missing or non-numeric as zero.
#[cfg(test)]
pub(crate) fn tally(thing: &Thing, key: &str) -> u64 {
    thing
        .get(key)
        .and_then(crate::core::HookValue::as_u64)
        .unwrap_or_default()
}

/// Increments a counter in the thing, creating it at 1.
#[cfg(test)]
pub(crate) fn bump(thing: &mut Thing, key: &str) -> u64 {
    let next = tally(thing, key) + 1;
    thing.insert(key.to_string(), next.into());
    next
}
