//! Graph unserializer
//!
//! Restoring runs in two passes over a parsed [`RawGraph`]:
//!
//! 1. **Allocate.** Every section record gets an empty shell: interned
//!    strings, empty tables, null-filled arrays and instances. Classes and
//!    functions are looked up by name instead, and each class used by an
//!    instance gets a slot map from its recorded member names to the slots
//!    of the loaded class. Afterwards every index in the buffer has a live
//!    target.
//! 2. **Populate.** Shells are filled in section order (arrays, tables,
//!    instances). References resolve by index into the pass 1 handles, never
//!    by recursive construction. A table entry whose key is an aggregate that
//!    has not been populated yet becomes a deferred [`Reference`], written
//!    once every shell is complete.
//!
//! Any failure aborts the restore. Shells allocated before the failure are
//! never reachable from a returned root and are left to the runtime.

use super::graph::{ClassRecord, InstanceRecord, RawGraph};
use super::processed::ProcessedObject;
use super::user_types::UserTypeTag;
use super::SnapshotContext;
use crate::config::ShapePolicy;
use crate::error::{DecodeError, SnapshotError, SnapshotResult, StaticKind};
use crate::heap::{HostData, HostValue, ScriptRuntime};
use crate::value::{ObjectId, Value, ValueKind};
use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};

/// Deferred table write
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Table receiving the entry
    pub target: ObjectId,
    /// Entry key
    pub key: ProcessedObject,
    /// Entry value
    pub value: ProcessedObject,
}

/// Recorded member slot -> slot of the loaded class
type SlotMap = Vec<Option<usize>>;

/// Rebuilds an object graph from a snapshot buffer
pub struct GraphUnserializer<'a, R: ScriptRuntime + ?Sized> {
    ctx: &'a SnapshotContext,
    rt: &'a mut R,
    classes: Vec<ObjectId>,
    layouts: Vec<Option<SlotMap>>,
    closures: Vec<ObjectId>,
    strings: Vec<ObjectId>,
    arrays: Vec<ObjectId>,
    tables: Vec<ObjectId>,
    instances: Vec<ObjectId>,
    populated: FxHashSet<(ValueKind, u32)>,
    deferred: Vec<Reference>,
}

impl<'a, R: ScriptRuntime + ?Sized> GraphUnserializer<'a, R> {
    /// Create an unserializer that restores into `rt`
    pub fn new(ctx: &'a SnapshotContext, rt: &'a mut R) -> Self {
        Self {
            ctx,
            rt,
            classes: Vec::new(),
            layouts: Vec::new(),
            closures: Vec::new(),
            strings: Vec::new(),
            arrays: Vec::new(),
            tables: Vec::new(),
            instances: Vec::new(),
            populated: FxHashSet::default(),
            deferred: Vec::new(),
        }
    }

    /// Restore a graph buffer and return its root
    pub fn unserialize(self, bytes: &[u8]) -> SnapshotResult<Value> {
        let graph = RawGraph::parse_with_limit(bytes, self.ctx.options().max_objects)?;
        self.restore(&graph)
    }

    /// Restore an already parsed graph and return its root
    pub fn restore(mut self, graph: &RawGraph) -> SnapshotResult<Value> {
        graph.validate()?;

        self.allocate(graph)?;
        debug!(objects = graph.object_count(), "Allocated snapshot shells");

        self.populate(graph)?;
        let deferred = std::mem::take(&mut self.deferred);
        debug!(deferred = deferred.len(), "Populated snapshot shells");
        for reference in deferred {
            let key = self.resolve(&reference.key)?;
            let value = self.resolve(&reference.value)?;
            self.rt.table_set(reference.target, key, value)?;
        }

        self.resolve(&graph.root)
    }

    /// Pass 1
    fn allocate(&mut self, graph: &RawGraph) -> SnapshotResult<()> {
        for record in &graph.classes {
            let class = self.ctx.names().resolve_class(&record.name);
            let class = self.require(class, StaticKind::Class, &record.name)?;
            self.classes.push(class);
        }
        self.layouts = vec![None; graph.classes.len()];
        for name in &graph.closures {
            let closure = self.ctx.names().resolve_closure(name);
            let closure = self.require(closure, StaticKind::Closure, name)?;
            self.closures.push(closure);
        }
        trace!(
            classes = self.classes.len(),
            closures = self.closures.len(),
            "Resolved static references"
        );

        for bytes in &graph.strings {
            let id = self.rt.alloc_string(bytes)?;
            self.strings.push(id);
        }
        for elements in &graph.arrays {
            let id = self.rt.alloc_array(elements.len())?;
            self.arrays.push(id);
        }
        for _ in &graph.tables {
            let id = self.rt.alloc_table()?;
            self.tables.push(id);
        }
        for record in &graph.instances {
            let index = class_index(record)?;
            let class = lookup(&self.classes, ValueKind::Class, index)?;
            if self.layouts[index as usize].is_none() {
                let layout = self.slot_map(&graph.classes[index as usize], class)?;
                self.layouts[index as usize] = Some(layout);
            }
            let id = self.rt.alloc_instance(class)?;
            self.instances.push(id);
        }
        Ok(())
    }

    /// Pass 2
    fn populate(&mut self, graph: &RawGraph) -> SnapshotResult<()> {
        for (index, elements) in graph.arrays.iter().enumerate() {
            let array = self.arrays[index];
            for (slot, element) in elements.iter().enumerate() {
                let value = self.resolve(element)?;
                self.rt.array_set(array, slot, value)?;
            }
            self.populated.insert((ValueKind::Array, index as u32));
        }
        trace!(arrays = graph.arrays.len(), "Populated arrays");

        for (index, entries) in graph.tables.iter().enumerate() {
            let table = self.tables[index];
            for (key, value) in entries {
                if self.is_unfinished(key) {
                    self.deferred.push(Reference {
                        target: table,
                        key: key.clone(),
                        value: value.clone(),
                    });
                    continue;
                }
                let key = self.resolve(key)?;
                let value = self.resolve(value)?;
                self.rt.table_set(table, key, value)?;
            }
            self.populated.insert((ValueKind::Table, index as u32));
        }
        trace!(tables = graph.tables.len(), "Populated tables");

        for (index, record) in graph.instances.iter().enumerate() {
            let instance = self.instances[index];
            let layout = class_index(record)
                .ok()
                .and_then(|class| self.layouts.get(class as usize).cloned().flatten())
                .unwrap_or_default();
            for (member, slot) in record.members.iter().zip(layout) {
                if let Some(slot) = slot {
                    let value = self.resolve(member)?;
                    self.rt.instance_set_member(instance, slot, value)?;
                }
            }
            if let Some(data) = &record.native {
                let native = self.host_value(data)?;
                self.rt.instance_set_native(instance, native)?;
            }
            self.populated.insert((ValueKind::Instance, index as u32));
        }
        trace!(instances = graph.instances.len(), "Populated instances");
        Ok(())
    }

    /// Map the recorded member layout of a class onto the loaded class
    fn slot_map(&self, record: &ClassRecord, class: ObjectId) -> SnapshotResult<SlotMap> {
        let loaded = self.rt.class_members(class).unwrap_or(&[]);
        if loaded == record.members.as_slice() {
            return Ok((0..loaded.len()).map(Some).collect());
        }
        match self.ctx.options().shape_policy {
            ShapePolicy::Reject => Err(SnapshotError::ShapeMismatch {
                class: record.name.clone(),
                expected: record.members.clone(),
                found: loaded.to_vec(),
            }),
            ShapePolicy::Lenient => {
                let layout: SlotMap = record
                    .members
                    .iter()
                    .map(|name| loaded.iter().position(|m| m == name))
                    .collect();
                warn!(
                    class = %record.name,
                    dropped = layout.iter().filter(|slot| slot.is_none()).count(),
                    added = loaded.len().saturating_sub(layout.iter().flatten().count()),
                    "Class shape changed, copying members by name"
                );
                Ok(layout)
            }
        }
    }

    fn require(&self, id: Option<ObjectId>, kind: StaticKind, name: &str) -> SnapshotResult<ObjectId> {
        id.ok_or_else(|| {
            self.ctx.content_error(SnapshotError::UnresolvedStaticReference {
                kind,
                name: name.to_string(),
            })
        })
    }

    fn host_value(&self, data: &HostData) -> SnapshotResult<HostValue> {
        let tag = UserTypeTag::of(data);
        let type_id = self.ctx.user_types().type_id_for(&*self.rt, tag);
        let type_id = self.require_host(type_id, tag)?;
        Ok(HostValue::new(type_id, data.clone()))
    }

    fn require_host<T>(&self, found: Option<T>, tag: UserTypeTag) -> SnapshotResult<T> {
        found.ok_or_else(|| {
            self.ctx.content_error(SnapshotError::UnresolvedStaticReference {
                kind: StaticKind::HostType,
                name: tag.binding_name().to_string(),
            })
        })
    }

    fn is_unfinished(&self, object: &ProcessedObject) -> bool {
        match *object {
            ProcessedObject::Ref { kind, index } => {
                matches!(kind, ValueKind::Table | ValueKind::Array | ValueKind::Instance)
                    && !self.populated.contains(&(kind, index))
            }
            _ => false,
        }
    }

    fn resolve(&mut self, object: &ProcessedObject) -> SnapshotResult<Value> {
        Ok(match object {
            ProcessedObject::Null => Value::Null,
            ProcessedObject::Bool(b) => Value::Bool(*b),
            ProcessedObject::Integer(i) => Value::Integer(*i),
            ProcessedObject::Float(f) => Value::Float(*f),
            ProcessedObject::UserData(data) => {
                let host = self.host_value(data)?;
                Value::UserData(self.rt.alloc_userdata(host)?)
            }
            ProcessedObject::Ref { kind, index } => {
                let handles: &[ObjectId] = match kind {
                    ValueKind::Class => &self.classes,
                    ValueKind::Closure => &self.closures,
                    ValueKind::String => &self.strings,
                    ValueKind::Array => &self.arrays,
                    ValueKind::Table => &self.tables,
                    ValueKind::Instance => &self.instances,
                    _ => &[],
                };
                let id = lookup(handles, *kind, *index)?;
                Value::from_object(*kind, id).ok_or(DecodeError::InvalidKindTag {
                    tag: kind.to_u8(),
                    offset: 0,
                })?
            }
        })
    }
}

fn class_index(record: &InstanceRecord) -> Result<u32, DecodeError> {
    match record.class {
        ProcessedObject::Ref {
            kind: ValueKind::Class,
            index,
        } => Ok(index),
        ref other => Err(DecodeError::UnexpectedKind {
            expected: ValueKind::Class,
            found: other.kind(),
        }),
    }
}

fn lookup(handles: &[ObjectId], kind: ValueKind, index: u32) -> Result<ObjectId, DecodeError> {
    handles
        .get(index as usize)
        .copied()
        .ok_or(DecodeError::IndexOutOfRange {
            kind,
            index,
            len: handles.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::Heap;

    fn graph_with_root(root: ProcessedObject) -> RawGraph {
        RawGraph {
            root,
            ..RawGraph::default()
        }
    }

    #[test]
    fn test_scalar_root() {
        let mut heap = Heap::new();
        let ctx = SnapshotContext::new(&heap);
        let root = GraphUnserializer::new(&ctx, &mut heap)
            .restore(&graph_with_root(ProcessedObject::Integer(9)))
            .unwrap();
        assert_eq!(root, Value::Integer(9));
    }

    #[test]
    fn test_self_keyed_table_is_deferred() {
        // T[T] = 1
        let mut graph = graph_with_root(ProcessedObject::reference(ValueKind::Table, 0));
        graph.tables = vec![vec![(
            ProcessedObject::reference(ValueKind::Table, 0),
            ProcessedObject::Integer(1),
        )]];

        let mut heap = Heap::new();
        let ctx = SnapshotContext::new(&heap);
        let root = GraphUnserializer::new(&ctx, &mut heap).restore(&graph).unwrap();

        let table = heap.table(root).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&root), Some(Value::Integer(1)));
    }

    #[test]
    fn test_dangling_index_rejected_before_allocation() {
        let mut graph = graph_with_root(ProcessedObject::reference(ValueKind::Table, 0));
        graph.tables = vec![vec![(
            ProcessedObject::Integer(0),
            ProcessedObject::reference(ValueKind::Array, 4),
        )]];

        let mut heap = Heap::new();
        let before = heap.object_count();
        let ctx = SnapshotContext::new(&heap);
        let err = GraphUnserializer::new(&ctx, &mut heap)
            .restore(&graph)
            .unwrap_err();

        assert!(matches!(
            err,
            SnapshotError::CorruptBuffer(DecodeError::IndexOutOfRange {
                kind: ValueKind::Array,
                index: 4,
                len: 0
            })
        ));
        assert_eq!(heap.object_count(), before);
    }

    #[test]
    fn test_missing_class_is_unresolved() {
        let mut graph = graph_with_root(ProcessedObject::reference(ValueKind::Class, 0));
        graph.classes = vec![ClassRecord::new("gone.Thing", Vec::new())];

        let mut heap = Heap::new();
        let ctx = SnapshotContext::new(&heap);
        let err = GraphUnserializer::new(&ctx, &mut heap)
            .restore(&graph)
            .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::UnresolvedStaticReference {
                kind: StaticKind::Class,
                ref name,
            } if name == "gone.Thing"
        ));
    }

    #[test]
    fn test_missing_host_binding_is_unresolved() {
        let graph = graph_with_root(ProcessedObject::UserData(HostData::Color([1, 2, 3, 4])));

        let mut heap = Heap::new();
        let ctx = SnapshotContext::new(&heap);
        let err = GraphUnserializer::new(&ctx, &mut heap)
            .restore(&graph)
            .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::UnresolvedStaticReference {
                kind: StaticKind::HostType,
                ..
            }
        ));
    }
}
