pub mod anchor;
pub mod flags;
pub mod hook;
pub mod options;
pub mod registry;
pub mod telemetry;

use crate::error::Result;
use async_trait::async_trait;
use flags::Flags;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use telemetry::Tracer;
use uuid::Uuid;

/// The Alias for serde_json::Value, used for settings and payload entries.
pub type HookValue = serde_json::Value;

/// The payload ("thing") every hook in a chain works on.
pub type Thing = HashMap<String, HookValue>;

/// A hook's merged configuration.
pub type Settings = HashMap<String, HookValue>;

/// A shared handle to anything that can take part in a chain.
pub type HookRef = Arc<dyn Chainable>;

/// The three lifecycle phases a hook goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreProcess,
    Execute,
    PostProcess,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            Phase::PreProcess => "pre-process",
            Phase::Execute => "execute",
            Phase::PostProcess => "post-process",
        };
        f.write_str(phase)
    }
}

/// The capability every successor and child must have.
///
/// [`Hook`](hook::Hook) and [`Anchor`](anchor::Anchor) implement it; a chain
/// stores its links as [`HookRef`] so it never cares which one it is talking to.
///
/// Implementors provide their own half of the lifecycle (`enter` and `leave`);
/// walking the successor chain is done here, one link at a time, so chain
/// length never grows the call stack. Only nested children recurse.
#[async_trait]
pub trait Chainable: Send + Sync + 'static {
    /// Unique per instance, unlike the name.
    fn id(&self) -> Uuid;

    fn name(&self) -> &str;

    /// A copy of the current flag set.
    fn flags(&self) -> Flags;

    /// Sets every flag on this unit only.
    fn set_own_flags(&self, value: bool);

    fn successor(&self) -> Option<HookRef>;

    /// Detaches and returns the successor link.
    ///
    /// Dropping a hook uses it to unlink its chain one link at a time.
    fn take_successor(&self) -> Option<HookRef> {
        None
    }

    /// Units this one fans out to, in order. Plain hooks have none.
    fn children(&self) -> Vec<HookRef> {
        Vec::new()
    }

    /// Attaches `target` at the tail of the successor chain.
    ///
    /// Returns the attached unit, or `None` when the target was ignored.
    fn attach(&self, target: HookTarget) -> Result<Option<HookRef>>;

    /// Pre-process and execute of this unit alone.
    async fn enter(&self, thing: &mut Thing, tracer: Option<&dyn Tracer>) -> Result<()>;

    /// Fan-out (if any) and post-process of this unit alone.
    async fn leave(&self, thing: &mut Thing, tracer: Option<&dyn Tracer>) -> Result<()>;

    /// Sets every flag on this unit and everything reachable from it.
    fn set_flags(&self, value: bool) {
        self.set_own_flags(value);
        for child in self.children() {
            child.set_flags(value);
        }
        let mut next = self.successor();
        while let Some(unit) = next {
            unit.set_own_flags(value);
            for child in unit.children() {
                child.set_flags(value);
            }
            next = unit.successor();
        }
    }

    /// True if the unit with `id` is this one or reachable from it.
    fn reaches(&self, id: Uuid) -> bool {
        if self.id() == id || self.children().iter().any(|c| c.reaches(id)) {
            return true;
        }
        let mut next = self.successor();
        while let Some(unit) = next {
            if unit.id() == id || unit.children().iter().any(|c| c.reaches(id)) {
                return true;
            }
            next = unit.successor();
        }
        false
    }

    /// Runs the lifecycle with the flags as they currently are.
    ///
    /// Every link enters on the way down; they leave in reverse order once the
    /// tail is done. The first error stops the run.
    async fn run_traced(&self, thing: &mut Thing, tracer: Option<&dyn Tracer>) -> Result<()> {
        self.enter(thing, tracer).await?;

        let mut entered: Vec<HookRef> = Vec::new();
        let mut next = self.successor();
        while let Some(unit) = next {
            log::trace!("'{}' descending into '{}'", self.name(), unit.name());
            unit.enter(thing, tracer).await?;
            next = unit.successor();
            entered.push(unit);
        }
        while let Some(unit) = entered.pop() {
            unit.leave(thing, tracer).await?;
        }

        self.leave(thing, tracer).await
    }

    async fn run(&self, thing: &mut Thing) -> Result<()> {
        self.run_traced(thing, None).await
    }

    /// Resets every flag in the reachable graph to `true`, then runs the lifecycle.
    async fn process(&self, thing: &mut Thing) -> Result<()> {
        self.set_flags(true);
        self.run_traced(thing, None).await
    }

    /// Same as [`process`](Chainable::process), recording every phase into
    /// `tracer` and flushing it once the run is over.
    async fn process_traced(&self, thing: &mut Thing, tracer: &dyn Tracer) -> Result<()> {
        self.set_flags(true);
        let result = self.run_traced(thing, Some(tracer)).await;
        tracer.flush();
        result
    }
}

impl dyn Chainable {
    /// Convenience over [`Chainable::attach`] accepting anything that converts into a target.
    pub fn set_hook(&self, target: impl Into<HookTarget>) -> Result<Option<HookRef>> {
        self.attach(target.into())
    }
}

/// A candidate for `set_hook` or an anchor's collection.
#[derive(Clone)]
pub enum HookTarget {
    /// An actual unit.
    Hook(HookRef),
    /// An identifier to resolve through the hook's registry, plus constructor arguments.
    Named {
        identifier: String,
        args: Vec<HookValue>,
    },
    /// Anything else. Ignored when attached.
    Nothing,
}

impl HookTarget {
    pub fn named(identifier: impl Into<String>, args: Vec<HookValue>) -> Self {
        HookTarget::Named {
            identifier: identifier.into(),
            args,
        }
    }

    /// Wraps any [`Chainable`] value.
    pub fn hook<C: Chainable>(hook: C) -> Self {
        HookTarget::Hook(Arc::new(hook))
    }

    /// Whether this candidate already is a processable unit.
    pub fn is_hook(&self) -> bool {
        matches!(self, HookTarget::Hook(_))
    }
}

impl std::fmt::Debug for HookTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookTarget::Hook(hook) => f
                .debug_struct("Hook")
                .field("id", &hook.id())
                .field("name", &hook.name())
                .finish(),
            HookTarget::Named { identifier, args } => f
                .debug_struct("Named")
                .field("identifier", identifier)
                .field("args", args)
                .finish(),
            HookTarget::Nothing => f.write_str("Nothing"),
        }
    }
}

impl From<HookRef> for HookTarget {
    fn from(hook: HookRef) -> Self {
        HookTarget::Hook(hook)
    }
}

impl From<&HookRef> for HookTarget {
    fn from(hook: &HookRef) -> Self {
        HookTarget::Hook(Arc::clone(hook))
    }
}

impl From<Arc<hook::Hook>> for HookTarget {
    fn from(hook: Arc<hook::Hook>) -> Self {
        HookTarget::Hook(hook)
    }
}

impl From<Arc<anchor::Anchor>> for HookTarget {
    fn from(anchor: Arc<anchor::Anchor>) -> Self {
        HookTarget::Hook(anchor)
    }
}

impl From<Option<HookRef>> for HookTarget {
    fn from(hook: Option<HookRef>) -> Self {
        hook.map_or(HookTarget::Nothing, HookTarget::Hook)
    }
}

impl From<&str> for HookTarget {
    fn from(identifier: &str) -> Self {
        HookTarget::named(identifier, Vec::new())
    }
}

impl From<String> for HookTarget {
    fn from(identifier: String) -> Self {
        HookTarget::named(identifier, Vec::new())
    }
}

/// A JSON string is an identifier; every other JSON value is not a hook.
impl From<HookValue> for HookTarget {
    fn from(value: HookValue) -> Self {
        match value {
            HookValue::String(identifier) => HookTarget::named(identifier, Vec::new()),
            _ => HookTarget::Nothing,
        }
    }
}

/// A helper trait that just provides the `as_any` method.
/// Needed to get the concrete logic back out of a hook.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::anchor::Anchor;
    use super::flags::FlagCell;
    use super::hook::{bump, tally, Hook, Passthrough};
    use super::telemetry::TraceEntry;
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::RwLock;

    /// A unit that is neither a `Hook` nor an `Anchor`.
    struct Beacon {
        id: Uuid,
        flags: FlagCell,
        next: RwLock<Option<HookRef>>,
    }

    impl Beacon {
        fn new() -> Self {
            Beacon {
                id: Uuid::new_v4(),
                flags: FlagCell::new(Flags::hook()),
                next: RwLock::new(None),
            }
        }
    }

    #[async_trait]
    impl Chainable for Beacon {
        fn id(&self) -> Uuid {
            self.id
        }

        fn name(&self) -> &str {
            "beacon"
        }

        fn flags(&self) -> Flags {
            self.flags.get()
        }

        fn set_own_flags(&self, value: bool) {
            self.flags.set_all(value);
        }

        fn successor(&self) -> Option<HookRef> {
            self.next.read().unwrap().clone()
        }

        fn attach(&self, target: HookTarget) -> Result<Option<HookRef>> {
            match target {
                HookTarget::Hook(hook) => {
                    *self.next.write().unwrap() = Some(hook.clone());
                    Ok(Some(hook))
                }
                _ => Ok(None),
            }
        }

        async fn enter(&self, thing: &mut Thing, _tracer: Option<&dyn Tracer>) -> Result<()> {
            bump(thing, "entered");
            Ok(())
        }

        async fn leave(&self, thing: &mut Thing, _tracer: Option<&dyn Tracer>) -> Result<()> {
            bump(thing, "left");
            Ok(())
        }
    }

    #[derive(Default)]
    struct FlushCounter {
        records: AtomicUsize,
        flushes: AtomicUsize,
    }

    impl Tracer for FlushCounter {
        fn record(&self, _entry: TraceEntry) {
            self.records.fetch_add(1, Ordering::SeqCst);
        }

        fn flush(&self) {
            self.flushes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_only_units_pass_the_capability_check() {
        let hook = Arc::new(Hook::passthrough());
        assert!(HookTarget::from(hook).is_hook());
        assert!(HookTarget::hook(Hook::new(Passthrough)).is_hook());

        assert!(!HookTarget::Nothing.is_hook());
        assert!(!HookTarget::from(None::<HookRef>).is_hook());
        assert!(!HookTarget::from(json!(null)).is_hook());
        assert!(!HookTarget::from(json!(42)).is_hook());
        assert!(!HookTarget::from(json!(true)).is_hook());
        assert!(!HookTarget::from(json!({"flags": {"chained": true}})).is_hook());
        assert!(!HookTarget::from("some-identifier").is_hook());
    }

    #[test]
    fn test_json_string_becomes_identifier() {
        match HookTarget::from(json!("audit")) {
            HookTarget::Named { identifier, args } => {
                assert_eq!(identifier, "audit");
                assert!(args.is_empty());
            }
            other => panic!("unexpected target: {other:?}"),
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::PreProcess.to_string(), "pre-process");
        assert_eq!(Phase::Execute.to_string(), "execute");
        assert_eq!(Phase::PostProcess.to_string(), "post-process");
    }

    #[tokio::test]
    async fn test_custom_unit_works_as_successor_and_child() {
        let beacon: HookRef = Arc::new(Beacon::new());
        assert!(HookTarget::from(&beacon).is_hook());

        let hook = Arc::new(Hook::passthrough());
        assert!(hook.set_hook(&beacon).unwrap().is_some());

        let anchor = Anchor::empty();
        assert!(anchor.push_hook(&beacon).unwrap().is_some());
        anchor.set_hook(hook).unwrap();
        assert!(anchor.reaches(beacon.id()));

        beacon.set_own_flags(false);
        let mut thing = Thing::new();
        anchor.process(&mut thing).await.unwrap();

        // once at the end of the chain, once as a child
        assert_eq!(tally(&thing, "entered"), 2);
        assert_eq!(tally(&thing, "left"), 2);
        assert!(beacon.flags().all(true));
    }

    #[tokio::test]
    async fn test_process_traced_flushes_once() {
        let hook = Hook::passthrough();
        hook.set_hook(Arc::new(Hook::passthrough())).unwrap();
        let tracer = FlushCounter::default();

        hook.process_traced(&mut Thing::new(), &tracer).await.unwrap();
        assert_eq!(tracer.records.load(Ordering::SeqCst), 6);
        assert_eq!(tracer.flushes.load(Ordering::SeqCst), 1);
    }
}
