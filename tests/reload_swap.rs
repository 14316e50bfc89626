//! Reload swaps every binding at once, even with events arriving concurrently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hotscript::builtins::BuiltinTable;
use hotscript::dsl::{Compiler, Value};
use hotscript::hotkey::{
    DispatchConfig, DispatchOutcome, HotkeyPattern, HotkeyRegistry, KeyEvent, TerminalGrabber,
};
use hotscript::script::ScriptHost;

const KEYS: usize = 8;

fn builtins() -> Arc<BuiltinTable> {
    let mut table = BuiltinTable::new();
    table.register("tag", 1, |args| Ok(args[0].clone()));
    Arc::new(table)
}

/// Binds F1..F8 to return `tag`.
fn script(tag: &str) -> String {
    (1..=KEYS)
        .map(|n| format!("F{n} => tag(\"{tag}\")\n"))
        .collect()
}

fn registry() -> Arc<HotkeyRegistry> {
    let config = DispatchConfig {
        sync_budget: Duration::from_secs(5),
        ..DispatchConfig::default()
    };
    Arc::new(HotkeyRegistry::new(Arc::new(TerminalGrabber::new()), config).unwrap())
}

#[test]
fn snapshots_are_never_mixed() {
    let registry = registry();
    let builtins = builtins();
    let a = Compiler::compile(&script("A"), &builtins).unwrap();
    let b = Compiler::compile(&script("B"), &builtins).unwrap();
    registry.install(a.bindings.clone());

    let done = AtomicBool::new(false);
    thread::scope(|s| {
        for _ in 0..3 {
            s.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    let table = registry.snapshot();
                    assert_eq!(table.len(), KEYS);
                    let tags: Vec<Value> = (1..=KEYS as u8)
                        .map(|n| {
                            let binding = table.lookup(&HotkeyPattern::Function(n)).unwrap();
                            binding.unit.call().unwrap()
                        })
                        .collect();
                    assert!(tags.iter().all(|t| *t == tags[0]), "mixed set: {tags:?}");
                }
            });
        }

        for round in 0..200 {
            let next = if round % 2 == 0 { &b } else { &a };
            let report = registry.install(next.bindings.clone());
            assert_eq!(report.registered.len(), KEYS);
            assert!(report.failed.is_empty());
        }
        done.store(true, Ordering::Relaxed);
    });
}

#[test]
fn events_during_reload_always_match() {
    let registry = registry();
    let builtins = builtins();
    let a = Compiler::compile(&script("A"), &builtins).unwrap();
    let b = Compiler::compile(&script("B"), &builtins).unwrap();
    registry.install(a.bindings.clone());

    let done = AtomicBool::new(false);
    thread::scope(|s| {
        s.spawn(|| {
            let event = KeyEvent::from_pattern(&HotkeyPattern::Function(3));
            while !done.load(Ordering::Relaxed) {
                match registry.on_event(&event) {
                    DispatchOutcome::Completed(Value::Str(tag)) => {
                        assert!(tag == "A" || tag == "B")
                    }
                    other => panic!("event saw a half-updated registry: {other:?}"),
                }
            }
        });

        for round in 0..200 {
            let next = if round % 2 == 0 { &b } else { &a };
            registry.install(next.bindings.clone());
        }
        done.store(true, Ordering::Relaxed);
    });
}

#[test]
fn host_reload_replaces_only_on_success() {
    let registry = registry();
    let mut host = ScriptHost::new(builtins(), Arc::clone(&registry));
    host.load_source(&script("A")).unwrap();

    let f1 = KeyEvent::from_pattern(&HotkeyPattern::Function(1));
    assert_eq!(
        registry.on_event(&f1),
        DispatchOutcome::Completed(Value::from("A"))
    );

    let broken = format!("{}F9 => nope()\n", script("B"));
    assert!(host.load_source(&broken).is_err());
    assert_eq!(
        registry.on_event(&f1),
        DispatchOutcome::Completed(Value::from("A"))
    );

    host.load_source(&script("B")).unwrap();
    assert_eq!(
        registry.on_event(&f1),
        DispatchOutcome::Completed(Value::from("B"))
    );
    assert_eq!(registry.len(), KEYS);
}
