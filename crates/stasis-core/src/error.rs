//! Snapshot error types

use crate::value::{ObjectId, ValueKind};
use std::fmt;
use thiserror::Error;

/// Structural problems found while reading a snapshot buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Unexpected end of buffer
    #[error("Unexpected end of buffer at offset {offset}")]
    UnexpectedEnd {
        /// Offset of the read that ran past the end
        offset: usize,
    },

    /// Kind tag outside the known enumeration
    #[error("Invalid kind tag {tag} at offset {offset}")]
    InvalidKindTag {
        /// Tag byte found
        tag: u8,
        /// Offset of the tag
        offset: usize,
    },

    /// Host type tag outside the known enumeration
    #[error("Invalid host type tag {tag} at offset {offset}")]
    InvalidUserTypeTag {
        /// Tag byte found
        tag: u8,
        /// Offset of the tag
        offset: usize,
    },

    /// Static name that is not valid UTF-8
    #[error("Invalid UTF-8 name at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the name bytes
        offset: usize,
    },

    /// Boolean byte that is neither 0 nor 1
    #[error("Invalid boolean byte {value} at offset {offset}")]
    InvalidBool {
        /// Byte found
        value: u8,
        /// Offset of the byte
        offset: usize,
    },

    /// Reference index beyond the section it points into
    #[error("{kind} index {index} out of range ({len} allocated)")]
    IndexOutOfRange {
        /// Section kind
        kind: ValueKind,
        /// Index found
        index: u32,
        /// Section length
        len: usize,
    },

    /// A reference of the wrong kind where a specific kind is required
    #[error("Expected {expected} reference, found {found}")]
    UnexpectedKind {
        /// Kind required by the record
        expected: ValueKind,
        /// Kind found in the buffer
        found: ValueKind,
    },

    /// A declared length that cannot fit in the remaining bytes
    #[error("Declared length {declared} exceeds {remaining} remaining bytes at offset {offset}")]
    LengthOverflow {
        /// Declared element or byte count
        declared: usize,
        /// Bytes left in the buffer
        remaining: usize,
        /// Offset of the length field
        offset: usize,
    },

    /// Bytes left over after the last section
    #[error("{0} trailing bytes after last section")]
    TrailingBytes(usize),

    /// Instance record whose member count differs from its class record
    #[error("Instance of class {class} has {found} members, class records {expected}")]
    MemberCountMismatch {
        /// Index into the class section
        class: u32,
        /// Member count of the class record
        expected: usize,
        /// Member count of the instance record
        found: usize,
    },

    /// Object count beyond the configured limit
    #[error("Buffer declares {declared} objects, limit is {limit}")]
    TooManyObjects {
        /// Objects declared by the buffer
        declared: usize,
        /// Configured limit
        limit: usize,
    },
}

/// Failures reported by the runtime adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    /// The heap object limit has been reached
    #[error("Object limit of {limit} reached")]
    LimitExceeded {
        /// Configured limit
        limit: usize,
    },

    /// Instance allocation requested for something that is not a class
    #[error("Object {0} is not a class")]
    NotAClass(ObjectId),

    /// Handle does not refer to an object of the expected kind
    #[error("Object {object} is not a {expected}")]
    WrongKind {
        /// Offending handle
        object: ObjectId,
        /// Kind the operation requires
        expected: ValueKind,
    },

    /// Slot index past the end of an array or instance
    #[error("Slot {slot} out of range for {object} ({len} slots)")]
    SlotOutOfRange {
        /// Target object
        object: ObjectId,
        /// Requested slot
        slot: usize,
        /// Number of slots
        len: usize,
    },

    /// A scalar was passed where a heap object is required
    #[error("Expected a heap object, found {0}")]
    NotAnObject(ValueKind),

    /// A namespace entry with this name already exists
    #[error("'{0}' is already defined")]
    AlreadyDefined(String),
}

/// What a by-name reference points at
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StaticKind {
    /// A class definition
    Class,
    /// A function definition
    Closure,
    /// A host type binding
    HostType,
}

impl fmt::Display for StaticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticKind::Class => f.write_str("class"),
            StaticKind::Closure => f.write_str("function"),
            StaticKind::HostType => f.write_str("host type"),
        }
    }
}

/// Snapshot error types
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A class or function captured by name no longer exists by that name
    #[error("Unresolved {kind} reference '{name}'")]
    UnresolvedStaticReference {
        /// What the name refers to
        kind: StaticKind,
        /// The stable name recorded in the snapshot
        name: String,
    },

    /// A reachable value that this engine cannot represent
    #[error("Unsupported {kind} value: {reason}")]
    UnsupportedValueKind {
        /// Kind of the offending value
        kind: ValueKind,
        /// Why it cannot be represented
        reason: String,
    },

    /// Structural inconsistency in the buffer
    #[error("Corrupt snapshot buffer: {0}")]
    CorruptBuffer(#[from] DecodeError),

    /// The runtime could not allocate or fill a shell object
    #[error("Allocation failure: {0}")]
    AllocationFailure(#[from] HeapError),

    /// A class resolved by name has a different member layout than recorded
    #[error("Class '{class}' has members {found:?}, snapshot recorded {expected:?}")]
    ShapeMismatch {
        /// Stable class name
        class: String,
        /// Member slot names in the snapshot
        expected: Vec<String>,
        /// Member slot names of the loaded class
        found: Vec<String>,
    },

    /// Invalid magic number in snapshot envelope
    #[error("Invalid snapshot magic: {0:?}")]
    InvalidMagic([u8; 4]),

    /// Incompatible snapshot version
    #[error("Unsupported snapshot version {actual} (expected {expected})")]
    UnsupportedVersion {
        /// Version this build writes
        expected: u32,
        /// Version found in the envelope
        actual: u32,
    },

    /// Checksum verification failed
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the envelope
        expected: u32,
        /// Checksum computed over the payload
        actual: u32,
    },

    /// I/O error during snapshot read/write
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SnapshotError {
    /// Whether this error comes from untrusted input rather than program content
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            SnapshotError::CorruptBuffer(_)
                | SnapshotError::InvalidMagic(_)
                | SnapshotError::UnsupportedVersion { .. }
                | SnapshotError::ChecksumMismatch { .. }
        )
    }
}

/// Snapshot operation result
pub type SnapshotResult<T> = Result<T, SnapshotError>;
