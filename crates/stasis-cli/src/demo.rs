//! A small game program and some state for it
//!
//! `sample` saves this state and `verify --restore` restores against the
//! same program layout.

use anyhow::Context;
use stasis_core::{Heap, HeapError, HostData, HostValue, ObjectId, ScriptRuntime, Value};

pub fn load_program(heap: &mut Heap) -> Result<(), HeapError> {
    let root = heap.namespace();

    let engine = heap.define_namespace(root, "engine")?;
    heap.bind_host_type(engine, "Vector2", &[])?;
    heap.bind_host_type(engine, "Color", &[])?;
    heap.bind_host_type(engine, "Entity", &["tag"])?;
    heap.bind_host_type(engine, "Blob", &[])?;

    let game = heap.define_namespace(root, "game")?;
    let player = heap.define_class(game, "Player", &["name", "hp", "inventory"])?;
    heap.define_method(player, "heal", 1)?;
    heap.define_class(game, "Item", &["label", "weight"])?;
    heap.define_function(game, "spawn", 2)?;
    Ok(())
}

fn class(heap: &Heap, path: &str) -> anyhow::Result<ObjectId> {
    match heap.lookup(path) {
        Some(Value::Class(id)) => Ok(id),
        _ => anyhow::bail!("{} is not defined", path),
    }
}

/// Players sharing an item, a player referring back to the world, a
/// callback and a few host values
pub fn build_world(heap: &mut Heap) -> anyhow::Result<Value> {
    let player_class = class(heap, "game.Player")?;
    let item_class = class(heap, "game.Item")?;
    let entity_class = class(heap, "engine.Entity")?;
    let vector_type = heap
        .class_host_type(class(heap, "engine.Vector2")?)
        .context("engine.Vector2 is not a host binding")?;
    let entity_type = heap
        .class_host_type(entity_class)
        .context("engine.Entity is not a host binding")?;

    let world = heap.new_table()?;

    let label = heap.str("torch")?;
    let torch = heap.new_instance(item_class, &[label, Value::Float(0.5)])?;

    let mut players = Vec::new();
    for (name, hp) in [("ada", 100), ("brin", 75)] {
        let name = heap.str(name)?;
        let inventory = heap.new_array(vec![torch])?;
        let player = heap.new_instance(player_class, &[name, Value::Integer(hp), inventory])?;
        players.push(player);
    }
    let party = heap.new_array(players)?;

    let tag = heap.str("camera")?;
    let camera = heap.new_instance(entity_class, &[tag])?;
    let camera_id = camera.object_id().context("entity is not an object")?;
    heap.instance_set_native(camera_id, HostValue::new(entity_type, HostData::Entity(7)))?;
    let spawn_point = heap.new_userdata(HostValue::new(
        vector_type,
        HostData::Vector2 { x: 4.0, y: -2.0 },
    ))?;

    let on_spawn = heap.lookup("game.spawn").context("game.spawn is not defined")?;

    heap.set_field(world, "party", party)?;
    heap.set_field(world, "camera", camera)?;
    heap.set_field(world, "spawn_point", spawn_point)?;
    heap.set_field(world, "on_spawn", on_spawn)?;
    heap.set_field(world, "tick", Value::Integer(0))?;
    heap.set_field(world, "world", world)?;
    Ok(world)
}
