//! Stable names for static program values
//!
//! Classes and functions come from loaded program text and are never
//! content-serialized. Instead each one is recorded under its dotted path
//! in the namespace tree (`game.Player`, `game.Player.heal`, `util.clamp`)
//! and looked up again by that path when a snapshot is restored.
//!
//! The scan visits keys in byte order so the same program always yields
//! the same names, regardless of table insertion order.

use crate::heap::ScriptRuntime;
use crate::value::{ObjectId, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

/// Result of classifying a value against the name cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    /// Static code value with a stable name
    StaticByName(&'a str),
    /// Runtime state, serialized by content
    DynamicContent,
}

/// Walk the namespace tree and list every class and function with its path
///
/// Class methods are listed as `Class.method` right after their class.
/// Tables reachable twice are only descended into once.
pub fn scan_namespace<R: ScriptRuntime + ?Sized>(rt: &R) -> Vec<(String, Value)> {
    let mut found = Vec::new();
    let mut visited = FxHashSet::default();
    let mut stack = vec![(String::new(), rt.namespace())];

    while let Some((prefix, table)) = stack.pop() {
        if !visited.insert(table) {
            continue;
        }
        let Some(entries) = rt.table_entries(table) else {
            continue;
        };

        let mut named: Vec<(&[u8], Value)> = entries
            .iter()
            .filter_map(|(key, value)| match key {
                Value::String(id) => rt.string_bytes(*id).map(|bytes| (bytes, *value)),
                _ => None,
            })
            .collect();
        named.sort_by(|a, b| a.0.cmp(b.0));

        let mut nested = Vec::new();
        for (key, value) in named {
            let Ok(key) = std::str::from_utf8(key) else {
                continue;
            };
            let path = if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", prefix, key)
            };
            match value {
                Value::Table(child) => nested.push((path, child)),
                Value::Class(class) => {
                    let mut methods = rt.class_methods(class).unwrap_or_default();
                    methods.sort_by(|a, b| a.0.cmp(&b.0));
                    found.push((path.clone(), value));
                    for (method, closure) in methods {
                        found.push((format!("{}.{}", path, method), Value::Closure(closure)));
                    }
                }
                Value::Closure(_) => found.push((path, value)),
                _ => {}
            }
        }
        // Reverse so the stack pops nested namespaces in key order
        stack.extend(nested.into_iter().rev());
    }

    found
}

/// Bidirectional name table for static classes and functions
///
/// Built once after the program is loaded and before any runtime state
/// exists; read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct NameCache {
    classes: FxHashMap<String, ObjectId>,
    closures: FxHashMap<String, ObjectId>,
    names: FxHashMap<ObjectId, String>,
}

impl NameCache {
    /// Scan a runtime's namespace
    pub fn build<R: ScriptRuntime + ?Sized>(rt: &R) -> Self {
        let mut cache = Self::default();
        for (name, value) in scan_namespace(rt) {
            let (map, id) = match value {
                Value::Class(id) => (&mut cache.classes, id),
                Value::Closure(id) => (&mut cache.closures, id),
                _ => continue,
            };
            if cache.names.contains_key(&id) {
                // Reachable under several paths; the first one in scan order wins
                continue;
            }
            if map.contains_key(&name) {
                warn!(name = %name, "Duplicate static name, keeping first definition");
                continue;
            }
            map.insert(name.clone(), id);
            cache.names.insert(id, name);
        }
        debug!(
            classes = cache.classes.len(),
            closures = cache.closures.len(),
            "Built name cache"
        );
        cache
    }

    /// Classify a value as named static code or dynamic state
    pub fn classify(&self, value: Value) -> Classification<'_> {
        match value {
            Value::Class(id) | Value::Closure(id) => match self.names.get(&id) {
                Some(name) => Classification::StaticByName(name),
                None => Classification::DynamicContent,
            },
            _ => Classification::DynamicContent,
        }
    }

    /// Stable name of a class or function handle
    pub fn name_of(&self, id: ObjectId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Look up a class by stable name
    pub fn resolve_class(&self, name: &str) -> Option<ObjectId> {
        self.classes.get(name).copied()
    }

    /// Look up a function by stable name
    pub fn resolve_closure(&self, name: &str) -> Option<ObjectId> {
        self.closures.get(name).copied()
    }

    /// Number of named values
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if no static values were found
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
