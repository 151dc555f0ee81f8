//! Host-native value codec
//!
//! Host values cross into the script heap only through a fixed set of bound
//! types. Each has a one-byte tag on the wire and a fixed encoding:
//!
//! | Tag | Binding   | Encoding                     |
//! |-----|-----------|------------------------------|
//! | 1   | `Vector2` | `x: f64, y: f64`             |
//! | 2   | `Color`   | `rgba: [u8; 4]`              |
//! | 3   | `Entity`  | `handle: u64`                |
//! | 4   | `Blob`    | `len: u32, bytes: [u8; len]` |
//!
//! [`UserTypes`] maps the per-heap [`NativeTypeId`] of each binding to its
//! tag. The map is built on first use by scanning the namespace for classes
//! bound to a host type whose name matches a known binding.

use super::io::{BufferReader, BufferWriter};
use super::names::scan_namespace;
use crate::error::DecodeError;
use crate::heap::{HostData, NativeTypeId, ScriptRuntime};
use crate::value::Value;
use once_cell::unsync::OnceCell;
use rustc_hash::FxHashMap;
use tracing::debug;

/// Wire tag of a host-native type
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UserTypeTag {
    /// 2D vector
    Vector2 = 1,
    /// RGBA color
    Color = 2,
    /// Engine entity handle
    Entity = 3,
    /// Opaque byte buffer
    Blob = 4,
}

impl UserTypeTag {
    /// All known tags
    pub const ALL: [UserTypeTag; 4] = [
        UserTypeTag::Vector2,
        UserTypeTag::Color,
        UserTypeTag::Entity,
        UserTypeTag::Blob,
    ];

    /// Convert from a tag byte
    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u8 == tag)
    }

    /// Convert to a tag byte
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Class name the host binds this type under
    pub const fn binding_name(self) -> &'static str {
        match self {
            UserTypeTag::Vector2 => "Vector2",
            UserTypeTag::Color => "Color",
            UserTypeTag::Entity => "Entity",
            UserTypeTag::Blob => "Blob",
        }
    }

    /// Tag matching a payload's layout
    pub fn of(data: &HostData) -> Self {
        match data {
            HostData::Vector2 { .. } => UserTypeTag::Vector2,
            HostData::Color(_) => UserTypeTag::Color,
            HostData::Entity(_) => UserTypeTag::Entity,
            HostData::Blob(_) => UserTypeTag::Blob,
        }
    }

    fn from_binding_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.binding_name() == name)
    }
}

/// Write `userTypeTag` followed by the type-specific bytes
pub fn encode(data: &HostData, writer: &mut BufferWriter) {
    writer.write_u8(UserTypeTag::of(data).to_u8());
    match data {
        HostData::Vector2 { x, y } => {
            writer.write_f64(*x);
            writer.write_f64(*y);
        }
        HostData::Color(rgba) => writer.write_raw(rgba),
        HostData::Entity(handle) => writer.write_u64(*handle),
        HostData::Blob(bytes) => writer.write_bytes(bytes),
    }
}

/// Read `userTypeTag` and the type-specific bytes
pub fn decode(reader: &mut BufferReader<'_>) -> Result<HostData, DecodeError> {
    let offset = reader.position();
    let tag = reader.read_u8()?;
    let tag = UserTypeTag::from_u8(tag).ok_or(DecodeError::InvalidUserTypeTag { tag, offset })?;
    Ok(match tag {
        UserTypeTag::Vector2 => HostData::Vector2 {
            x: reader.read_f64()?,
            y: reader.read_f64()?,
        },
        UserTypeTag::Color => {
            let mut rgba = [0u8; 4];
            rgba.copy_from_slice(reader.read_raw(4)?);
            HostData::Color(rgba)
        }
        UserTypeTag::Entity => HostData::Entity(reader.read_u64()?),
        UserTypeTag::Blob => HostData::Blob(reader.read_bytes()?.to_vec()),
    })
}

/// Binding table between a heap's native type IDs and wire tags
#[derive(Debug, Default)]
pub struct UserTypes {
    bindings: OnceCell<Bindings>,
}

#[derive(Debug, Default)]
struct Bindings {
    by_id: FxHashMap<NativeTypeId, UserTypeTag>,
    by_tag: FxHashMap<UserTypeTag, NativeTypeId>,
}

impl UserTypes {
    /// Create an empty table; bindings are discovered on first use
    pub fn new() -> Self {
        Self::default()
    }

    fn bindings<R: ScriptRuntime + ?Sized>(&self, rt: &R) -> &Bindings {
        self.bindings.get_or_init(|| {
            let mut bindings = Bindings::default();
            for (path, value) in scan_namespace(rt) {
                let Value::Class(class) = value else { continue };
                let Some(type_id) = rt.class_host_type(class) else { continue };
                let binding = path.rsplit('.').next().unwrap_or(path.as_str());
                if let Some(tag) = UserTypeTag::from_binding_name(binding) {
                    bindings.by_id.insert(type_id, tag);
                    bindings.by_tag.entry(tag).or_insert(type_id);
                }
            }
            debug!(count = bindings.by_id.len(), "Discovered host type bindings");
            bindings
        })
    }

    /// Tag of a native type, or `None` if it is not a known binding
    pub fn identify<R: ScriptRuntime + ?Sized>(
        &self,
        rt: &R,
        type_id: NativeTypeId,
    ) -> Option<UserTypeTag> {
        self.bindings(rt).by_id.get(&type_id).copied()
    }

    /// Native type bound to a tag in this heap
    pub fn type_id_for<R: ScriptRuntime + ?Sized>(
        &self,
        rt: &R,
        tag: UserTypeTag,
    ) -> Option<NativeTypeId> {
        self.bindings(rt).by_tag.get(&tag).copied()
    }
}
