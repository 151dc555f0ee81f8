//! Shared fixtures for snapshot integration tests

#![allow(dead_code)]

use stasis_core::{
    serialize_graph, unserialize_graph, Heap, HostData, HostValue, ObjectId, ScriptRuntime,
    SnapshotContext, SnapshotOptions, Value,
};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test harness (`RUST_LOG=stasis_core=trace`)
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Lay out the demo program the way a script loader would
pub fn load_program(heap: &mut Heap) {
    let root = heap.namespace();

    let engine = heap.define_namespace(root, "engine").unwrap();
    heap.bind_host_type(engine, "Vector2", &[]).unwrap();
    heap.bind_host_type(engine, "Color", &[]).unwrap();
    heap.bind_host_type(engine, "Entity", &["tag"]).unwrap();
    heap.bind_host_type(engine, "Blob", &[]).unwrap();

    let game = heap.define_namespace(root, "game").unwrap();
    let player = heap
        .define_class(game, "Player", &["name", "hp", "inventory"])
        .unwrap();
    heap.define_method(player, "heal", 1).unwrap();
    heap.define_class(game, "Item", &["label", "weight"]).unwrap();
    heap.define_function(game, "spawn", 2).unwrap();

    let util = heap.define_namespace(root, "util").unwrap();
    heap.define_function(util, "clamp", 3).unwrap();
}

/// A heap with the demo program loaded, and its snapshot context
pub fn fresh() -> (Heap, SnapshotContext) {
    fresh_with(SnapshotOptions::default())
}

/// Like [`fresh`], with explicit options
pub fn fresh_with(options: SnapshotOptions) -> (Heap, SnapshotContext) {
    init_logging();
    let mut heap = Heap::new();
    load_program(&mut heap);
    let ctx = SnapshotContext::with_options(&heap, options);
    (heap, ctx)
}

/// Serialize `root` out of `heap` and restore it into a freshly loaded heap
pub fn roundtrip(heap: &Heap, ctx: &SnapshotContext, root: Value) -> (Heap, Value) {
    let bytes = serialize_graph(ctx, heap, root).expect("serialize failed");
    let (mut restored, restored_ctx) = fresh();
    let value = unserialize_graph(&restored_ctx, &mut restored, &bytes).expect("unserialize failed");
    (restored, value)
}

/// Handle of a class by dotted path
pub fn class(heap: &Heap, path: &str) -> ObjectId {
    match heap.lookup(path) {
        Some(Value::Class(id)) => id,
        other => panic!("{} is not a class: {:?}", path, other),
    }
}

/// A host value bound through `engine.<binding>`
pub fn host(heap: &Heap, binding: &str, data: HostData) -> HostValue {
    let class = class(heap, &format!("engine.{}", binding));
    let type_id = heap.class_host_type(class).expect("not a host binding");
    HostValue::new(type_id, data)
}

/// Assert that two graphs have the same shape and the same sharing
///
/// Every object in `a` must map to exactly one object in `b` and back.
/// Host values compare by payload.
pub fn assert_isomorphic(a: &Heap, root_a: Value, b: &Heap, root_b: Value) {
    let mut forward: HashMap<ObjectId, ObjectId> = HashMap::new();
    let mut backward: HashMap<ObjectId, ObjectId> = HashMap::new();
    let mut work = vec![(root_a, root_b)];

    while let Some((va, vb)) = work.pop() {
        assert_eq!(va.kind(), vb.kind(), "kind differs: {:?} vs {:?}", va, vb);

        let (ia, ib) = match (va.object_id(), vb.object_id()) {
            (Some(ia), Some(ib)) => (ia, ib),
            _ => {
                assert_eq!(va, vb, "scalar differs");
                continue;
            }
        };

        if let (Value::UserData(_), Value::UserData(_)) = (va, vb) {
            assert_eq!(a.userdata(ia).map(|h| &h.data), b.userdata(ib).map(|h| &h.data));
            continue;
        }

        match (forward.get(&ia), backward.get(&ib)) {
            (Some(&mapped), _) => {
                assert_eq!(mapped, ib, "{:?} restored as two different objects", va);
                continue;
            }
            (None, Some(_)) => panic!("{:?} and another object collapsed into {:?}", va, vb),
            (None, None) => {
                forward.insert(ia, ib);
                backward.insert(ib, ia);
            }
        }

        match va {
            Value::String(_) => assert_eq!(a.string_bytes(ia), b.string_bytes(ib)),
            Value::Class(_) => assert_eq!(
                a.class(ia).map(|c| &c.name),
                b.class(ib).map(|c| &c.name)
            ),
            Value::Closure(_) => assert_eq!(
                a.closure(ia).map(|c| &c.name),
                b.closure(ib).map(|c| &c.name)
            ),
            Value::Array(_) => {
                let (ea, eb) = (a.array_elements(ia).unwrap(), b.array_elements(ib).unwrap());
                assert_eq!(ea.len(), eb.len(), "array length differs");
                work.extend(ea.iter().copied().zip(eb.iter().copied()));
            }
            Value::Instance(_) => {
                work.push((
                    Value::Class(a.instance_class(ia).unwrap()),
                    Value::Class(b.instance_class(ib).unwrap()),
                ));
                let (ma, mb) = (a.instance_members(ia).unwrap(), b.instance_members(ib).unwrap());
                assert_eq!(ma.len(), mb.len(), "member count differs");
                work.extend(ma.iter().copied().zip(mb.iter().copied()));
                assert_eq!(
                    a.instance_native(ia).map(|h| &h.data),
                    b.instance_native(ib).map(|h| &h.data)
                );
            }
            Value::Table(_) => {
                let ea = a.table_entries(ia).unwrap();
                let mut eb = b.table_entries(ib).unwrap();
                assert_eq!(ea.len(), eb.len(), "table size differs");

                let mut unmatched = Vec::new();
                for (ka, xa) in ea {
                    match translate_key(a, b, &forward, ka) {
                        Some(kb) => {
                            let pos = eb
                                .iter()
                                .position(|(k, _)| *k == kb)
                                .unwrap_or_else(|| panic!("key {:?} missing after restore", ka));
                            let (kb, xb) = eb.remove(pos);
                            work.push((ka, kb));
                            work.push((xa, xb));
                        }
                        None => unmatched.push((ka, xa)),
                    }
                }
                // Unmapped aggregate keys pair up with what is left, by kind
                for (ka, xa) in unmatched {
                    let pos = eb
                        .iter()
                        .position(|(k, _)| k.kind() == ka.kind())
                        .unwrap_or_else(|| panic!("key {:?} missing after restore", ka));
                    let (kb, xb) = eb.remove(pos);
                    work.push((ka, kb));
                    work.push((xa, xb));
                }
            }
            _ => {}
        }
    }
}

fn translate_key(
    a: &Heap,
    b: &Heap,
    forward: &HashMap<ObjectId, ObjectId>,
    key: Value,
) -> Option<Value> {
    match key {
        Value::String(id) => {
            let text = std::str::from_utf8(a.string_bytes(id)?).ok()?;
            b.interned(text)
        }
        Value::Class(id) => b.lookup(&static_path(a, id)?),
        _ => match key.object_id() {
            Some(id) => Value::from_object(key.kind(), *forward.get(&id)?),
            None => Some(key),
        },
    }
}

fn static_path(heap: &Heap, class: ObjectId) -> Option<String> {
    stasis_core::NameCache::build(heap)
        .name_of(class)
        .map(str::to_string)
}
