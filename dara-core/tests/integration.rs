//! Integration Tests for the Variable Store
//!
//! These tests drive the store the way views and action handlers do:
//! register, read, mutate through actions, and observe the handles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use dara_core::reactive::SubscriberId;
use dara_core::{
    reset_variables, ActionContext, AnyVariable, DaraEvent, DataVariable, DerivedDataVariable,
    DerivedResolver, DerivedVariable, MemoryHistory, PlainVariable, RegistryError, RequestExtras,
    Resolved, Store, StoreConfig, TriggerIndexValue, UrlHistory, UrlVariable,
};

/// Joins string forms of the inputs and counts calls.
#[derive(Default)]
struct JoinResolver {
    calls: AtomicUsize,
}

impl DerivedResolver for JoinResolver {
    fn resolve(&self, _: &DerivedVariable, args: &[Value], extras: &RequestExtras) -> Resolved {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let joined: Vec<String> = args.iter().map(Value::to_string).collect();
        let user = extras.headers.get("user").cloned().unwrap_or_default();
        Ok(json!(format!("{user}:{}", joined.join(","))))
    }

    fn resolve_data(&self, _: &DerivedDataVariable, args: &[Value], _: &RequestExtras) -> Resolved {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!(args))
    }
}

/// Returns `{"a": n}` where `n` counts calls.
#[derive(Default)]
struct CountingResolver {
    calls: AtomicUsize,
}

impl DerivedResolver for CountingResolver {
    fn resolve(&self, _: &DerivedVariable, _: &[Value], _: &RequestExtras) -> Resolved {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({ "a": n }))
    }

    fn resolve_data(&self, _: &DerivedDataVariable, _: &[Value], _: &RequestExtras) -> Resolved {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({ "a": n }))
    }
}

fn plain(uid: &str, default: Value) -> PlainVariable {
    PlainVariable {
        uid: uid.into(),
        default,
        nested: vec![],
    }
}

fn derived(uid: &str, variables: Vec<AnyVariable>) -> DerivedVariable {
    DerivedVariable {
        uid: uid.into(),
        variables,
        deps: None,
        nested: vec![],
    }
}

/// Registering makes a variable registered, and only then.
#[test]
fn registration_flips_is_registered() {
    let store = Store::new(Arc::new(JoinResolver::default()));
    let extras = RequestExtras::default();

    let p = plain("p", json!(0));
    let u = UrlVariable {
        uid: "u".into(),
        default: json!("x"),
        query: "u".into(),
    };
    let d = DataVariable {
        uid: "d".into(),
        filters: None,
    };
    let dv = derived("dv", vec![]);

    let all: Vec<AnyVariable> = vec![p.clone().into(), u.clone().into(), d.clone().into(), dv.clone().into()];
    assert!(all.iter().all(|v| !store.is_registered(v)));

    store.get_or_register_plain_variable(&p, &extras);
    store.get_or_register_url_variable(&u);
    store.get_or_register_data_variable(&d);
    store.get_or_register_derived_variable(&dv, &extras);

    assert!(all.iter().all(|v| store.is_registered(v)));
}

/// getAtom fails for derived kinds even when registered.
#[test]
fn get_atom_rejects_derived_kinds() {
    let store = Store::new(Arc::new(JoinResolver::default()));
    let extras = RequestExtras::default();
    let dv = derived("dv", vec![]);
    let ddv = DerivedDataVariable {
        uid: "ddv".into(),
        variables: vec![],
        deps: None,
        filters: None,
    };

    assert!(matches!(
        store.get_atom(&dv.clone().into(), &extras),
        Err(RegistryError::NotRegistered { .. })
    ));

    store.get_or_register_derived_variable(&dv, &extras);
    store.get_or_register_derived_data_variable(&ddv, &extras);

    assert!(matches!(
        store.get_atom(&dv.into(), &extras),
        Err(RegistryError::NoAtom { .. })
    ));
    assert!(matches!(
        store.get_atom(&ddv.into(), &extras),
        Err(RegistryError::NoAtom { .. })
    ));
}

/// Triggering bumps inc by exactly one and sets force, from any prior state.
#[test]
fn trigger_increments_by_one() {
    let store = Store::new(Arc::new(JoinResolver::default()));
    let dv: AnyVariable = derived("dv", vec![]).into();
    let trigger = store.get_or_register_trigger(&dv);

    trigger.set(TriggerIndexValue { force: false, inc: 41 });
    store.trigger_variable(&dv, true).unwrap();
    assert_eq!(trigger.get(), TriggerIndexValue { force: true, inc: 42 });

    store.trigger_variable(&dv, true).unwrap();
    assert_eq!(trigger.get(), TriggerIndexValue { force: true, inc: 43 });
}

/// A nested view and its base share one computation, and resetting or
/// triggering either one refreshes both.
#[test]
fn nested_derived_view_follows_reset_and_trigger() {
    let resolver = Arc::new(CountingResolver::default());
    let store = Store::new(resolver.clone());
    let ctx = ActionContext::new(store.clone(), RequestExtras::default());
    let base = derived("dv", vec![]);
    let view = DerivedVariable {
        nested: vec!["a".into()],
        ..base.clone()
    };
    let base: AnyVariable = base.into();
    let view: AnyVariable = view.into();

    assert_eq!(store.resolve_value(&view, &ctx.extras), Ok(json!(1)));
    assert_eq!(store.resolve_value(&base, &ctx.extras), Ok(json!({ "a": 1 })));
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    assert!(store
        .get_or_register_trigger(&view)
        .ptr_eq(&store.get_or_register_trigger(&base)));

    reset_variables(&ctx, &[serde_json::to_value(&base).unwrap()]).unwrap();
    assert_eq!(store.resolve_value(&view, &ctx.extras), Ok(json!(2)));
    assert_eq!(store.resolve_value(&base, &ctx.extras), Ok(json!({ "a": 2 })));
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);

    store.trigger_variable(&view, true).unwrap();
    assert_eq!(store.resolve_value(&base, &ctx.extras), Ok(json!({ "a": 3 })));
    assert_eq!(store.resolve_value(&view, &ctx.extras), Ok(json!(3)));
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
}

/// Reset-variables over a mixed list, in order.
#[test]
fn reset_variables_scenario() {
    let history = Arc::new(MemoryHistory::new());
    let store = Store::with_config(
        StoreConfig::default(),
        Arc::new(JoinResolver::default()),
        history.clone(),
    );
    let ctx = ActionContext::new(store.clone(), RequestExtras::default());

    let a = derived("A", vec![]);
    let b = UrlVariable {
        uid: "B".into(),
        default: json!("x"),
        query: "b".into(),
    };
    let c = DataVariable {
        uid: "C".into(),
        filters: None,
    };
    let d = plain("D", json!(0));

    let a_trigger = store.get_or_register_trigger(&a.clone().into());
    let inc_before = a_trigger.get().inc;
    store.set_url_variable(&b, json!("y"));
    let c_atom = store.get_or_register_data_variable(&c);
    c_atom.set(json!({ "rows": 3 }));
    let d_atom = store.get_or_register_plain_variable(&d, &ctx.extras);
    d_atom.set(json!(5));

    let payload: Vec<Value> = [
        AnyVariable::from(a),
        AnyVariable::from(b.clone()),
        AnyVariable::from(c),
        AnyVariable::from(d),
    ]
    .iter()
    .map(|v| serde_json::to_value(v).unwrap())
    .collect();

    reset_variables(&ctx, &payload).unwrap();

    assert_eq!(
        a_trigger.get(),
        TriggerIndexValue {
            force: true,
            inc: inc_before + 1
        }
    );
    assert_eq!(store.get_or_register_url_variable(&b).get(), json!("x"));
    assert_eq!(history.query_param("b").as_deref(), Some("x"));
    assert_eq!(c_atom.get(), json!({ "rows": 3 }));
    assert_eq!(d_atom.get(), json!(0));
}

/// One plain variable, two parameterizations: two members, one family.
#[test]
fn family_members_per_extras() {
    let store = Store::new(Arc::new(JoinResolver::default()));
    let p = plain("p", json!(1));
    let any: AnyVariable = p.clone().into();
    let alice = RequestExtras::default().with_header("user", "alice");
    let bob = RequestExtras::default().with_header("user", "bob");

    assert!(!store.is_registered(&any));
    let a = store.get_or_register_plain_variable(&p, &alice);
    assert!(store.is_registered(&any));
    let b = store.get_or_register_plain_variable(&p, &bob);

    assert!(!a.ptr_eq(&b));
    a.set(json!(10));
    assert_eq!(b.get(), json!(1));

    assert!(store.get_atom(&any, &alice).unwrap().ptr_eq(&a));
    assert!(store.get_atom(&any, &bob).unwrap().ptr_eq(&b));
}

/// Derived members are per extras too, and read their own member of the
/// plain inputs.
#[test]
fn derived_family_resolves_per_extras() {
    let store = Store::new(Arc::new(JoinResolver::default()));
    let p = plain("p", json!(1));
    let dv = derived("dv", vec![p.clone().into()]);
    let alice = RequestExtras::default().with_header("user", "alice");
    let bob = RequestExtras::default().with_header("user", "bob");

    store.get_or_register_plain_variable(&p, &bob).set(json!(2));

    let for_alice = store.get_or_register_derived_variable(&dv, &alice);
    let for_bob = store.get_or_register_derived_variable(&dv, &bob);
    assert!(!for_alice.ptr_eq(&for_bob));
    assert_eq!(for_alice.get(), Ok(json!("alice:1")));
    assert_eq!(for_bob.get(), Ok(json!("bob:2")));
}

/// Idempotent registration across every kind.
#[test]
fn repeated_registration_returns_same_handle() {
    let store = Store::new(Arc::new(JoinResolver::default()));
    let extras = RequestExtras::default();
    let u = UrlVariable {
        uid: "u".into(),
        default: json!(null),
        query: "u".into(),
    };
    let dv = derived("dv", vec![]);
    let trigger_of: AnyVariable = dv.clone().into();

    assert!(store
        .get_or_register_url_variable(&u)
        .ptr_eq(&store.get_or_register_url_variable(&u)));
    assert!(store
        .get_or_register_derived_variable(&dv, &extras)
        .ptr_eq(&store.get_or_register_derived_variable(&dv, &extras)));
    assert!(store
        .get_or_register_trigger(&trigger_of)
        .ptr_eq(&store.get_or_register_trigger(&trigger_of)));
}

/// A view subscribed to a derived selector hears about a reset.
#[test]
fn reset_reaches_derived_subscribers() {
    let resolver = Arc::new(JoinResolver::default());
    let store = Store::new(resolver.clone());
    let ctx = ActionContext::new(store.clone(), RequestExtras::default());
    let p = plain("p", json!(1));
    let dv = derived("dv", vec![p.clone().into()]);

    let selector = store.get_or_register_derived_variable(&dv, &ctx.extras);
    assert_eq!(selector.get(), Ok(json!(":1")));

    let renders = Arc::new(AtomicUsize::new(0));
    let renders_clone = renders.clone();
    selector.subscribe(SubscriberId::new(), move || {
        renders_clone.fetch_add(1, Ordering::SeqCst);
    });

    store.get_or_register_plain_variable(&p, &ctx.extras).set(json!(7));
    assert_eq!(renders.load(Ordering::SeqCst), 1);
    assert_eq!(selector.get(), Ok(json!(":7")));

    let payload = vec![serde_json::to_value(AnyVariable::from(p)).unwrap()];
    reset_variables(&ctx, &payload).unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 2);
    assert_eq!(selector.get(), Ok(json!(":1")));
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
}

/// Clearing the registries unregisters every variable.
#[test]
fn clear_registries_unregisters_all() {
    let store = Store::new(Arc::new(JoinResolver::default()));
    let extras = RequestExtras::default();
    let p = plain("p", json!(0));
    let d = DataVariable {
        uid: "d".into(),
        filters: None,
    };
    let dv = derived("dv", vec![p.clone().into()]);

    let before = store.get_or_register_plain_variable(&p, &extras);
    store.get_or_register_data_variable(&d);
    store.get_or_register_derived_variable(&dv, &extras).get().unwrap();

    store.clear_registries_for_test();

    for v in [AnyVariable::from(p.clone()), d.into(), dv.into()] {
        assert!(!store.is_registered(&v));
    }
    assert!(!store.get_or_register_plain_variable(&p, &extras).ptr_eq(&before));
}

/// Fresh derived values and first plain registrations are announced.
#[test]
fn store_publishes_events() {
    let store = Store::new(Arc::new(JoinResolver::default()));
    let mut rx = store.subscribe();
    let extras = RequestExtras::default();
    let p = plain("p", json!(3));
    let dv = derived("dv", vec![p.clone().into()]);

    store.get_or_register_derived_variable(&dv, &extras).get().unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], DaraEvent::PlainVariableLoaded { variable, .. } if variable.uid == "p"));
    assert!(matches!(&events[1], DaraEvent::DerivedVariableLoaded { value, .. } if *value == json!(":3")));
}
