//! Property-based tests for fixture scope isolation

use proptest::prelude::*;
use proptest::test_runner::TestRunner;
use std::collections::BTreeSet;
use workflow_runtime::fixture::{
    current, in_new_scope, is_active, open_scope, open_scope_sync, register_value, resolve_as,
    value, SharedFixture,
};

fn names() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-z]{1,6}", 0..8)
}

fn visible() -> BTreeSet<String> {
    current().names().into_iter().collect()
}

fn providers(names: &BTreeSet<String>, tag: &str) -> Vec<SharedFixture> {
    names
        .iter()
        .map(|name| value(name.clone(), format!("{} {}", tag, name)))
        .collect()
}

/// Registrations made in a nested scope are visible inside it and gone
/// once it ends.
#[test]
fn test_nested_registrations_never_leak_to_parent() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let mut runner = TestRunner::default();

    runner
        .run(&(names(), names()), |(base, overrides)| {
            runtime.block_on(async {
                open_scope(providers(&base, "outer"), false, async {
                    in_new_scope(async {
                        for name in &overrides {
                            register_value(name.clone(), format!("inner {}", name)).unwrap();
                        }
                        for name in &overrides {
                            let got = resolve_as::<String>(name).await.unwrap();
                            assert_eq!(*got, format!("inner {}", name));
                        }
                        for name in base.difference(&overrides) {
                            let got = resolve_as::<String>(name).await.unwrap();
                            assert_eq!(*got, format!("outer {}", name));
                        }
                    })
                    .await;

                    assert_eq!(visible(), base);
                    for name in &base {
                        let got = resolve_as::<String>(name).await.unwrap();
                        assert_eq!(*got, format!("outer {}", name));
                    }
                })
                .await
                .unwrap();
            });
            Ok(())
        })
        .unwrap();
}

/// Copying scopes accumulate names level by level and each level is
/// restored exactly when its child returns.
#[test]
fn test_copied_scopes_restore_each_level() {
    fn descend(layers: &[BTreeSet<String>], expected: &BTreeSet<String>) {
        let Some((layer, rest)) = layers.split_first() else {
            return;
        };
        open_scope_sync(providers(layer, "layer"), true, || {
            let inside: BTreeSet<String> = expected.union(layer).cloned().collect();
            assert_eq!(visible(), inside);
            descend(rest, &inside);
            assert_eq!(visible(), inside);
        })
        .unwrap();
    }

    let mut runner = TestRunner::default();
    runner
        .run(&prop::collection::vec(names(), 1..6), |layers| {
            descend(&layers, &BTreeSet::new());
            assert!(!is_active());
            Ok(())
        })
        .unwrap();
}

/// A non-copying scope shows only its own providers, whatever encloses it.
#[test]
fn test_fresh_scope_hides_enclosing_names() {
    let mut runner = TestRunner::default();
    runner
        .run(&(names(), names()), |(outer, fresh)| {
            open_scope_sync(providers(&outer, "outer"), false, || {
                open_scope_sync(providers(&fresh, "fresh"), false, || {
                    assert_eq!(visible(), fresh);
                })
                .unwrap();
                assert_eq!(visible(), outer);
            })
            .unwrap();
            Ok(())
        })
        .unwrap();
}
