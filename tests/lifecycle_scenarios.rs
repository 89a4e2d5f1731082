//! End-to-end lifecycle scenarios: tallies across repeated children, flag
//! resets between runs, flags cleared mid-run, and hooks attached by name.

use grapnel::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn tally(thing: &Thing, key: &str) -> u64 {
    thing.get(key).and_then(HookValue::as_u64).unwrap_or_default()
}

fn bump(thing: &mut Thing, key: &str) {
    let next = tally(thing, key) + 1;
    thing.insert(key.to_string(), next.into());
}

#[derive(Clone)]
struct TallyHook;

#[async_trait]
impl HookLogic for TallyHook {
    async fn pre_process(&self, _settings: &Settings, thing: &mut Thing) -> Result<bool> {
        bump(thing, "preTally");
        Ok(true)
    }

    async fn execute(&self, _settings: &Settings, thing: &mut Thing) -> Result<()> {
        bump(thing, "execTally");
        Ok(())
    }

    async fn post_process(&self, _settings: &Settings, thing: &mut Thing) -> Result<()> {
        bump(thing, "postTally");
        Ok(())
    }
}

/// Clears another hook's flags from inside its own execute phase.
struct SilenceTarget {
    target: HookRef,
}

#[async_trait]
impl HookLogic for SilenceTarget {
    async fn execute(&self, _settings: &Settings, _thing: &mut Thing) -> Result<()> {
        self.target.set_flags(false);
        Ok(())
    }
}

#[tokio::test]
async fn test_repeated_children_and_successor_each_count() {
    let mut thing = Thing::new();
    let anchor = Anchor::empty();
    let hook_a = Arc::new(Hook::new(TallyHook));

    for _ in 0..3 {
        anchor.hooks_mut().push(hook_a.clone());
    }
    anchor.set_hook(hook_a.clone()).unwrap();
    anchor.process(&mut thing).await.unwrap();

    assert_eq!(tally(&thing, "preTally"), 4);
    assert_eq!(tally(&thing, "execTally"), 4);
    assert_eq!(tally(&thing, "postTally"), 4);
}

#[tokio::test]
async fn test_flags_cleared_mid_run_skip_execute_and_post() {
    let target: HookRef = Arc::new(Hook::new(TallyHook));
    let root = Hook::new(SilenceTarget {
        target: target.clone(),
    });
    root.set_hook(&target).unwrap();

    let mut thing = Thing::new();
    root.process(&mut thing).await.unwrap();

    // the target still checked in, but neither executed nor post-processed
    assert_eq!(tally(&thing, "preTally"), 1);
    assert_eq!(tally(&thing, "execTally"), 0);
    assert_eq!(tally(&thing, "postTally"), 0);
    assert!(target.flags().all(false));
}

#[tokio::test]
async fn test_process_twice_with_cleared_flags_is_identical() {
    let anchor = Anchor::empty();
    let child = Arc::new(Hook::new(TallyHook));
    anchor.push_hook(child.clone()).unwrap();
    anchor.set_hook(Arc::new(Hook::new(TallyHook))).unwrap();

    let tracer = MemoryTracer::new();
    let mut first = Thing::new();
    anchor.set_flags(false);
    anchor.process_traced(&mut first, &tracer).await.unwrap();
    let first_trace: Vec<_> = tracer.entries().into_iter().map(|e| (e.hook_id, e.phase, e.outcome)).collect();

    tracer.clear();
    let mut second = Thing::new();
    anchor.set_flags(false);
    anchor.process_traced(&mut second, &tracer).await.unwrap();
    let second_trace: Vec<_> = tracer.entries().into_iter().map(|e| (e.hook_id, e.phase, e.outcome)).collect();

    assert_eq!(first, second);
    assert_eq!(first_trace, second_trace);
    assert_eq!(tally(&first, "postTally"), 2);
}

#[tokio::test]
async fn test_assemble_by_identifier() {
    let mut registry = HookRegistry::new();
    registry.register("tally", |args: &[HookValue]| {
        let options = args.first().cloned().map(HookOptions::from).unwrap_or_default();
        Ok(Arc::new(Hook::with_options(TallyHook, options)) as HookRef)
    });
    let registry = Arc::new(registry);

    let anchor = Anchor::with_options(Passthrough, HookOptions::new().registry(registry.clone()));
    let attached = anchor
        .set_hook(HookTarget::named("tally", vec![json!({"name": "first"})]))
        .unwrap()
        .unwrap();
    assert_eq!(attached.name(), "first");
    anchor.push_hook("tally").unwrap();

    let mut thing = Thing::new();
    anchor.process(&mut thing).await.unwrap();
    assert_eq!(tally(&thing, "preTally"), 2);

    let err = anchor.set_hook("unknown").err().unwrap();
    assert!(matches!(err, HookError::UnknownHook(_)));
    assert_eq!(registry.identifiers(), vec!["tally"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_chain_can_be_processed_from_a_spawned_task() {
    let anchor = Arc::new(Anchor::empty());
    anchor.push_hook(Arc::new(Hook::new(TallyHook))).unwrap();

    let handle = {
        let anchor = anchor.clone();
        tokio::spawn(async move {
            let mut thing = Thing::new();
            anchor.process(&mut thing).await.map(|_| thing)
        })
    };
    let thing = handle.await.unwrap().unwrap();
    assert_eq!(tally(&thing, "postTally"), 1);
}

#[tokio::test]
async fn test_long_mixed_chain_completes() {
    const LINKS: u64 = 4_000;
    let root: HookRef = Arc::new(Hook::new(TallyHook));
    let mut tail = root.clone();
    for i in 1..LINKS {
        let next: HookRef = if i % 2 == 0 {
            let anchor = Anchor::new(TallyHook);
            anchor.push_hook(Arc::new(Hook::new(TallyHook))).unwrap();
            Arc::new(anchor)
        } else {
            Arc::new(Hook::new(TallyHook))
        };
        tail.set_hook(&next).unwrap();
        tail = next;
    }

    let mut thing = Thing::new();
    root.process(&mut thing).await.unwrap();

    // every link plus one child per anchor
    let expected = LINKS + (LINKS - 1) / 2;
    assert_eq!(tally(&thing, "preTally"), expected);
    assert_eq!(tally(&thing, "execTally"), expected);
    assert_eq!(tally(&thing, "postTally"), expected);
}
