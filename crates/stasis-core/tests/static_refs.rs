//! Static references: classes and functions restored by name

mod common;

use common::{class, fresh, host, init_logging, load_program};
use stasis_core::{
    serialize_graph, unserialize_graph, Heap, HostData, ScriptRuntime, ShapePolicy,
    SnapshotContext, SnapshotError, SnapshotOptions, StaticKind, Value,
};

/// A heap whose program is laid out after unrelated definitions, so every
/// handle differs from the one in the saving heap
fn reloaded_program() -> Heap {
    init_logging();
    let mut heap = Heap::new();
    let root = heap.namespace();
    let mods = heap.define_namespace(root, "mods").unwrap();
    heap.define_class(mods, "Extra", &["a", "b"]).unwrap();
    heap.define_function(mods, "hook", 0).unwrap();
    heap.bind_host_type(mods, "Sprite", &[]).unwrap();
    load_program(&mut heap);
    heap
}

#[test]
fn test_class_resolves_to_reloaded_definition() {
    let (mut heap, ctx) = fresh();
    let saved_class = class(&heap, "game.Player");
    let root = heap.new_array(vec![Value::Class(saved_class)]).unwrap();
    let bytes = serialize_graph(&ctx, &heap, root).unwrap();

    let mut reloaded = reloaded_program();
    let ctx2 = SnapshotContext::new(&reloaded);
    let root2 = unserialize_graph(&ctx2, &mut reloaded, &bytes).unwrap();

    let current = class(&reloaded, "game.Player");
    assert_ne!(current, saved_class);
    assert_eq!(reloaded.array(root2).unwrap(), &[Value::Class(current)]);
}

#[test]
fn test_functions_and_methods_resolve_by_name() {
    let (mut heap, ctx) = fresh();
    let spawn = heap.lookup("game.spawn").unwrap();
    let heal = heap.lookup("game.Player.heal").unwrap();
    let clamp = heap.lookup("util.clamp").unwrap();
    let callbacks = heap.new_table().unwrap();
    heap.set_field(callbacks, "on_start", spawn).unwrap();
    heap.set_field(callbacks, "on_hit", heal).unwrap();
    heap.set_field(callbacks, "on_tick", clamp).unwrap();
    heap.set_field(callbacks, "again", spawn).unwrap();
    let bytes = serialize_graph(&ctx, &heap, callbacks).unwrap();

    let mut reloaded = reloaded_program();
    let ctx2 = SnapshotContext::new(&reloaded);
    let root = unserialize_graph(&ctx2, &mut reloaded, &bytes).unwrap();

    assert_eq!(reloaded.field(root, "on_start"), reloaded.lookup("game.spawn"));
    assert_eq!(reloaded.field(root, "on_hit"), reloaded.lookup("game.Player.heal"));
    assert_eq!(reloaded.field(root, "on_tick"), reloaded.lookup("util.clamp"));
    assert_eq!(reloaded.field(root, "again"), reloaded.lookup("game.spawn"));
}

#[test]
fn test_removed_class_fails_restore() {
    let (mut heap, ctx) = fresh();
    let item_class = class(&heap, "game.Item");
    let item = heap.new_instance(item_class, &[]).unwrap();
    let bytes = serialize_graph(&ctx, &heap, item).unwrap();

    let mut changed = Heap::new();
    load_program(&mut changed);
    let game = match changed.lookup("game") {
        Some(Value::Table(id)) => id,
        other => panic!("game namespace missing: {:?}", other),
    };
    changed.undefine(game, "Item").unwrap();
    let ctx2 = SnapshotContext::new(&changed);

    let err = unserialize_graph(&ctx2, &mut changed, &bytes).unwrap_err();
    match err {
        SnapshotError::UnresolvedStaticReference { kind, name } => {
            assert_eq!(kind, StaticKind::Class);
            assert_eq!(name, "game.Item");
        }
        other => panic!("expected unresolved reference, got {:?}", other),
    }
}

#[test]
fn test_removed_function_fails_restore() {
    let (mut heap, ctx) = fresh();
    let clamp = heap.lookup("util.clamp").unwrap();
    let root = heap.new_array(vec![clamp]).unwrap();
    let bytes = serialize_graph(&ctx, &heap, root).unwrap();

    let mut changed = Heap::new();
    let ns = changed.namespace();
    changed.define_namespace(ns, "util").unwrap();
    let ctx2 = SnapshotContext::new(&changed);

    assert!(matches!(
        unserialize_graph(&ctx2, &mut changed, &bytes),
        Err(SnapshotError::UnresolvedStaticReference {
            kind: StaticKind::Closure,
            ..
        })
    ));
}

#[test]
fn test_missing_host_binding_fails_restore() {
    let (mut heap, ctx) = fresh();
    let v = heap
        .new_userdata(host(&heap, "Vector2", HostData::Vector2 { x: 0.0, y: 0.0 }))
        .unwrap();
    let bytes = serialize_graph(&ctx, &heap, v).unwrap();

    let mut bare = Heap::new();
    let ctx2 = SnapshotContext::new(&bare);
    assert!(matches!(
        unserialize_graph(&ctx2, &mut bare, &bytes),
        Err(SnapshotError::UnresolvedStaticReference {
            kind: StaticKind::HostType,
            ..
        })
    ));
}

fn program_with_player(members: &[&str]) -> Heap {
    let mut heap = Heap::new();
    let root = heap.namespace();
    let game = heap.define_namespace(root, "game").unwrap();
    heap.define_class(game, "Player", members).unwrap();
    heap
}

fn saved_player() -> Vec<u8> {
    let mut heap = program_with_player(&["name", "hp"]);
    let ctx = SnapshotContext::new(&heap);
    let player = heap
        .new_instance(class(&heap, "game.Player"), &[Value::Integer(1), Value::Integer(2)])
        .unwrap();
    serialize_graph(&ctx, &heap, player).unwrap()
}

#[test]
fn test_shape_change_rejected_by_default() {
    let bytes = saved_player();
    let mut heap = program_with_player(&["name", "hp", "mana"]);
    let ctx = SnapshotContext::new(&heap);

    match unserialize_graph(&ctx, &mut heap, &bytes).unwrap_err() {
        SnapshotError::ShapeMismatch {
            class,
            expected,
            found,
        } => {
            assert_eq!(class, "game.Player");
            assert_eq!(expected, vec!["name", "hp"]);
            assert_eq!(found, vec!["name", "hp", "mana"]);
        }
        other => panic!("expected shape mismatch, got {:?}", other),
    }
}

#[test]
fn test_lenient_shape_fills_new_members_with_null() {
    let bytes = saved_player();
    let mut heap = program_with_player(&["name", "hp", "mana"]);
    let options = SnapshotOptions {
        shape_policy: ShapePolicy::Lenient,
        ..Default::default()
    };
    let ctx = SnapshotContext::with_options(&heap, options);

    let player = unserialize_graph(&ctx, &mut heap, &bytes).unwrap();
    assert_eq!(
        heap.instance_members(player.object_id().unwrap()).unwrap(),
        &[Value::Integer(1), Value::Integer(2), Value::Null]
    );
}

#[test]
fn test_lenient_shape_drops_removed_members() {
    let bytes = saved_player();
    let mut heap = program_with_player(&["name"]);
    let options = SnapshotOptions {
        shape_policy: ShapePolicy::Lenient,
        ..Default::default()
    };
    let ctx = SnapshotContext::with_options(&heap, options);

    let player = unserialize_graph(&ctx, &mut heap, &bytes).unwrap();
    assert_eq!(heap.instance(player).unwrap().members, vec![Value::Integer(1)]);
}

#[test]
fn test_reordered_members_rejected_by_default() {
    let bytes = saved_player();
    let mut heap = program_with_player(&["hp", "name"]);
    let ctx = SnapshotContext::new(&heap);
    let before = heap.object_count();

    assert!(matches!(
        unserialize_graph(&ctx, &mut heap, &bytes),
        Err(SnapshotError::ShapeMismatch { .. })
    ));
    assert_eq!(heap.object_count(), before);
}

#[test]
fn test_renamed_member_rejected_by_default() {
    let bytes = saved_player();
    let mut heap = program_with_player(&["name", "health"]);
    let ctx = SnapshotContext::new(&heap);

    match unserialize_graph(&ctx, &mut heap, &bytes).unwrap_err() {
        SnapshotError::ShapeMismatch { expected, found, .. } => {
            assert_eq!(expected, vec!["name", "hp"]);
            assert_eq!(found, vec!["name", "health"]);
        }
        other => panic!("expected shape mismatch, got {:?}", other),
    }
}

#[test]
fn test_lenient_shape_maps_members_by_name() {
    let bytes = saved_player();
    let mut heap = program_with_player(&["mana", "hp", "name"]);
    let options = SnapshotOptions {
        shape_policy: ShapePolicy::Lenient,
        ..Default::default()
    };
    let ctx = SnapshotContext::with_options(&heap, options);

    let player = unserialize_graph(&ctx, &mut heap, &bytes).unwrap();
    assert_eq!(
        heap.instance_members(player.object_id().unwrap()).unwrap(),
        &[Value::Null, Value::Integer(2), Value::Integer(1)]
    );
}

#[test]
fn test_class_reference_without_instances_ignores_shape() {
    let mut saved = program_with_player(&["name", "hp"]);
    let ctx = SnapshotContext::new(&saved);
    let root = saved
        .new_array(vec![Value::Class(class(&saved, "game.Player"))])
        .unwrap();
    let bytes = serialize_graph(&ctx, &saved, root).unwrap();

    let mut heap = program_with_player(&["hp", "name"]);
    let ctx2 = SnapshotContext::new(&heap);
    let root2 = unserialize_graph(&ctx2, &mut heap, &bytes).unwrap();
    assert_eq!(
        heap.array(root2).unwrap(),
        &[Value::Class(class(&heap, "game.Player"))]
    );
}
