use criterion::{black_box, criterion_group, criterion_main, Criterion};
use v4vm::{CompiledFunction, Engine, Value};

fn bench_shape_transitions(c: &mut Criterion) {
    let mut engine = Engine::new();
    let keys: Vec<_> = (0..16).map(|i| engine.property_key(&format!("p{i}"))).collect();

    // after the first iteration every add follows a memoized transition
    c.bench_function("shape transitions 16 props", |b| {
        b.iter(|| {
            let o = engine.new_plain_object();
            for (i, key) in keys.iter().enumerate() {
                engine.put(o, *key, Value::Integer(i as i32), false).unwrap();
            }
            black_box(o)
        })
    });
}

fn bench_property_lookup(c: &mut Criterion) {
    let mut engine = Engine::new();
    let base = engine.new_plain_object();
    let depth = engine.property_key("depth");
    engine.put(base, depth, Value::Integer(3), false).unwrap();
    let derived = engine.new_object(Some(base));
    let leaf = engine.new_object(Some(derived));

    c.bench_function("prototype chain get", |b| {
        b.iter(|| black_box(engine.get(black_box(leaf), depth).unwrap()))
    });
}

fn bench_coercions(c: &mut Criterion) {
    let mut engine = Engine::new();
    let text = Value::String(engine.new_string("  12345.5  "));

    c.bench_function("string to number", |b| {
        b.iter(|| black_box(engine.to_number(black_box(text)).unwrap()))
    });
    c.bench_function("double to string", |b| {
        b.iter(|| black_box(engine.to_string(black_box(Value::Double(0.1 + 0.2))).unwrap()))
    });
    c.bench_function("loose equals", |b| {
        b.iter(|| black_box(engine.loose_equals(black_box(text), Value::Double(12345.5)).unwrap()))
    });
}

fn bench_calls(c: &mut Criterion) {
    let mut engine = Engine::new();
    let add = CompiledFunction::builder(&mut engine, "add")
        .formals(&["a", "b"])
        .host(|engine, ctx| {
            let a = engine.argument(ctx, 0);
            let b = engine.argument(ctx, 1);
            engine.add(a, b)
        });
    let global = engine.global_context();
    let f = engine.new_script_function(add, global);
    let args = [Value::Integer(1), Value::Integer(2)];

    c.bench_function("call flat context", |b| {
        b.iter(|| black_box(engine.call(f, Value::Undefined, black_box(&args)).unwrap()))
    });

    let with_arguments = CompiledFunction::builder(&mut engine, "count")
        .formals(&["a", "b"])
        .uses_arguments()
        .host(|engine, ctx| Ok(Value::Integer(engine.context(ctx).argument_count() as i32)));
    let g = engine.new_script_function(with_arguments, global);

    c.bench_function("call with arguments object", |b| {
        b.iter(|| {
            let r = engine.call(g, Value::Undefined, black_box(&args[..1])).unwrap();
            engine.collect_garbage();
            black_box(r)
        })
    });
}

criterion_group!(
    benches,
    bench_shape_transitions,
    bench_property_lookup,
    bench_coercions,
    bench_calls
);
criterion_main!(benches);
