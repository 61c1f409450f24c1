//! Benchmarks for handle lookup on the hot render path.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};

use dara_core::{
    AnyVariable, DerivedDataVariable, DerivedResolver, DerivedVariable, PlainVariable,
    RequestExtras, Resolved, Store,
};

struct Constant;

impl DerivedResolver for Constant {
    fn resolve(&self, _: &DerivedVariable, _: &[Value], _: &RequestExtras) -> Resolved {
        Ok(json!(1))
    }

    fn resolve_data(&self, _: &DerivedDataVariable, _: &[Value], _: &RequestExtras) -> Resolved {
        Ok(json!([]))
    }
}

fn registry_benchmarks(c: &mut Criterion) {
    let store = Store::new(Arc::new(Constant));
    let extras = RequestExtras::default();
    let variables: Vec<PlainVariable> = (0..256)
        .map(|i| PlainVariable {
            uid: format!("var-{i}"),
            default: json!(i),
            nested: vec![],
        })
        .collect();
    for variable in &variables {
        store.get_or_register_plain_variable(variable, &extras);
    }

    c.bench_function("get_or_register_plain_cached", |b| {
        b.iter(|| store.get_or_register_plain_variable(black_box(&variables[128]), &extras))
    });

    let any: AnyVariable = variables[64].clone().into();
    c.bench_function("is_registered_plain", |b| {
        b.iter(|| store.is_registered(black_box(&any)))
    });

    let derived = DerivedVariable {
        uid: "derived".into(),
        variables: variables.iter().take(8).cloned().map(AnyVariable::from).collect(),
        deps: None,
        nested: vec![],
    };
    let selector = store.get_or_register_derived_variable(&derived, &extras);
    c.bench_function("derived_refresh_cache_hit", |b| {
        b.iter(|| {
            selector.refresh();
            black_box(selector.get())
        })
    });
}

criterion_group!(benches, registry_benchmarks);
criterion_main!(benches);
