//! Field registry
//!
//! Static mapping from logical entity attributes to wire keys and wire types.
//! The tables are declared next to the entity types (see [`super::entity`]);
//! this module indexes them once per process and answers lookups for both the
//! request encoder (`fields` parameter) and the projector.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use serde_json::Value;

use super::entity::{
    FileStats, PeersFrom, Peer, TorrentFile, TorrentInfo, Tracker, TrackerStats,
};
use super::error::{RegistryError, RegistryResult};
use super::projector::Projectable;

/// Declared type of a registered field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// JSON boolean
    Bool,
    /// Integer within the 32-bit signed range
    Int,
    /// Integer within the 64-bit signed range
    Int64,
    /// Any JSON number
    Float,
    /// JSON string
    String,
    /// Integer ordinal of a closed symbol set
    Enum,
    /// JSON array; element type recorded separately
    Array,
    /// JSON object projected as a nested entity
    Object,
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Bool => "bool",
            WireType::Int => "int",
            WireType::Int64 => "int64",
            WireType::Float => "float",
            WireType::String => "string",
            WireType::Enum => "enum",
            WireType::Array => "array",
            WireType::Object => "object",
        };
        f.write_str(name)
    }
}

/// Kind of a value as it actually appeared on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    /// `null`
    Null,
    /// `true` / `false`
    Bool,
    /// Number without a fractional part or exponent
    Integer,
    /// Number with a fractional part or exponent
    Float,
    /// String
    String,
    /// Array
    Array,
    /// Object
    Object,
}

impl WireKind {
    /// Classify a dynamic wire value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => WireKind::Null,
            Value::Bool(_) => WireKind::Bool,
            Value::Number(n) if n.is_i64() || n.is_u64() => WireKind::Integer,
            Value::Number(_) => WireKind::Float,
            Value::String(_) => WireKind::String,
            Value::Array(_) => WireKind::Array,
            Value::Object(_) => WireKind::Object,
        }
    }
}

impl fmt::Display for WireKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireKind::Null => "null",
            WireKind::Bool => "bool",
            WireKind::Integer => "integer",
            WireKind::Float => "float",
            WireKind::String => "string",
            WireKind::Array => "array",
            WireKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// Entity tables known to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// `torrent-get` torrent object
    Torrent,
    /// Element of `files`
    File,
    /// Element of `fileStats`
    FileStats,
    /// Element of `peers`
    Peer,
    /// `peersFrom` breakdown
    PeersFrom,
    /// Element of `trackers`
    Tracker,
    /// Element of `trackerStats`
    TrackerStats,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Torrent => "torrent",
            EntityKind::File => "file",
            EntityKind::FileStats => "file-stats",
            EntityKind::Peer => "peer",
            EntityKind::PeersFrom => "peers-from",
            EntityKind::Tracker => "tracker",
            EntityKind::TrackerStats => "tracker-stats",
        };
        f.write_str(name)
    }
}

/// Ordinal → symbol table of an enumeration field
pub type OrdinalTable = &'static [(i64, &'static str)];

/// A registered field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Attribute name on the Rust entity
    pub logical_name: &'static str,
    /// Key used on the wire
    pub wire_key: &'static str,
    /// Declared wire type
    pub wire_type: WireType,
    /// Element type when `wire_type` is [`WireType::Array`]
    pub element: Option<WireType>,
    /// Nested entity table for objects and arrays of objects
    pub nested: Option<EntityKind>,
    /// Ordinal mapping for enumerations (or arrays of them)
    pub ordinals: Option<OrdinalTable>,
}

impl FieldDescriptor {
    /// Symbol registered for a raw ordinal, if any.
    pub fn symbol_for(&self, raw: i64) -> Option<&'static str> {
        self.ordinals?
            .iter()
            .find(|(ordinal, _)| *ordinal == raw)
            .map(|(_, symbol)| *symbol)
    }
}

/// Indexed view of one entity's field table
#[derive(Debug)]
pub struct EntityFields {
    kind: EntityKind,
    fields: &'static [FieldDescriptor],
    by_name: HashMap<&'static str, &'static FieldDescriptor>,
    by_wire_key: HashMap<&'static str, &'static FieldDescriptor>,
}

impl EntityFields {
    fn index(kind: EntityKind, fields: &'static [FieldDescriptor]) -> Self {
        let by_name = fields.iter().map(|f| (f.logical_name, f)).collect();
        let by_wire_key = fields.iter().map(|f| (f.wire_key, f)).collect();
        Self {
            kind,
            fields,
            by_name,
            by_wire_key,
        }
    }

    /// Entity kind of this table
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Every descriptor in declaration order
    pub fn all(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    /// Look up a descriptor by logical name
    pub fn resolve(&self, logical_name: &str) -> RegistryResult<&'static FieldDescriptor> {
        self.by_name
            .get(logical_name)
            .copied()
            .ok_or_else(|| RegistryError::UnknownField {
                entity: self.kind,
                name: logical_name.to_string(),
            })
    }

    /// Look up a descriptor by wire key
    pub fn by_wire_key(&self, wire_key: &str) -> Option<&'static FieldDescriptor> {
        self.by_wire_key.get(wire_key).copied()
    }

    /// Wire keys for the given logical names, in caller order
    pub fn wire_keys_for<I, S>(&self, names: I) -> RegistryResult<Vec<&'static str>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| self.resolve(name.as_ref()).map(|f| f.wire_key))
            .collect()
    }
}

static FIELD_REGISTRY: OnceLock<FieldRegistry> = OnceLock::new();

/// Process-wide registry of every entity table
#[derive(Debug)]
pub struct FieldRegistry {
    entities: HashMap<EntityKind, EntityFields>,
}

impl FieldRegistry {
    /// Access the registry, building it on first use
    pub fn global() -> &'static FieldRegistry {
        FIELD_REGISTRY.get_or_init(|| {
            let mut registry = FieldRegistry {
                entities: HashMap::new(),
            };
            registry.register::<TorrentInfo>();
            registry.register::<TorrentFile>();
            registry.register::<FileStats>();
            registry.register::<Peer>();
            registry.register::<PeersFrom>();
            registry.register::<Tracker>();
            registry.register::<TrackerStats>();
            registry
        })
    }

    fn register<E: Projectable>(&mut self) {
        self.entities
            .insert(E::KIND, EntityFields::index(E::KIND, E::FIELDS));
    }

    /// Field table for an entity kind
    pub fn entity(&self, kind: EntityKind) -> &EntityFields {
        // Every EntityKind variant is registered in `global`.
        &self.entities[&kind]
    }

    /// Resolve a logical name within an entity kind
    pub fn resolve(
        &self,
        kind: EntityKind,
        logical_name: &str,
    ) -> RegistryResult<&'static FieldDescriptor> {
        self.entity(kind).resolve(logical_name)
    }

    /// Wire keys for logical names of an entity kind, in caller order
    pub fn wire_keys_for<I, S>(&self, kind: EntityKind, names: I) -> RegistryResult<Vec<&'static str>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.entity(kind).wire_keys_for(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_known_field() {
        let registry = FieldRegistry::global();
        let status = registry.resolve(EntityKind::Torrent, "status").unwrap();
        assert_eq!(status.wire_key, "status");
        assert_eq!(status.wire_type, WireType::Enum);
        assert_eq!(status.symbol_for(4), Some("downloading"));
        assert_eq!(status.symbol_for(99), None);

        let done = registry.resolve(EntityKind::Torrent, "percent_done").unwrap();
        assert_eq!(done.wire_key, "percentDone");
        assert_eq!(done.wire_type, WireType::Float);
    }

    #[test]
    fn test_resolve_unknown_field() {
        let err = FieldRegistry::global()
            .resolve(EntityKind::Torrent, "bogus")
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::UnknownField {
                entity: EntityKind::Torrent,
                name: "bogus".into()
            }
        );
    }

    #[test]
    fn test_wire_keys_preserve_caller_order() {
        let keys = FieldRegistry::global()
            .wire_keys_for(EntityKind::Torrent, ["name", "id", "rate_download", "file_count"])
            .unwrap();
        assert_eq!(keys, vec!["name", "id", "rateDownload", "file-count"]);
    }

    #[test]
    fn test_nested_descriptors() {
        let registry = FieldRegistry::global();
        let files = registry.resolve(EntityKind::Torrent, "files").unwrap();
        assert_eq!(files.wire_type, WireType::Array);
        assert_eq!(files.element, Some(WireType::Object));
        assert_eq!(files.nested, Some(EntityKind::File));

        let priorities = registry.resolve(EntityKind::Torrent, "priorities").unwrap();
        assert_eq!(priorities.element, Some(WireType::Enum));
        assert_eq!(priorities.symbol_for(-1), Some("low"));

        let peers_from = registry.resolve(EntityKind::Torrent, "peers_from").unwrap();
        assert_eq!(peers_from.wire_type, WireType::Object);
        assert_eq!(peers_from.element, None);
    }

    #[test]
    fn test_wire_keys_are_unique_per_entity() {
        let registry = FieldRegistry::global();
        for kind in [
            EntityKind::Torrent,
            EntityKind::File,
            EntityKind::FileStats,
            EntityKind::Peer,
            EntityKind::PeersFrom,
            EntityKind::Tracker,
            EntityKind::TrackerStats,
        ] {
            let table = registry.entity(kind);
            assert_eq!(table.by_name.len(), table.all().len(), "{kind}");
            assert_eq!(table.by_wire_key.len(), table.all().len(), "{kind}");
            for field in table.all() {
                assert_eq!(table.by_wire_key(field.wire_key), Some(field));
            }
        }
    }

    #[test]
    fn test_wire_kind_classification() {
        assert_eq!(WireKind::of(&json!(null)), WireKind::Null);
        assert_eq!(WireKind::of(&json!(3)), WireKind::Integer);
        assert_eq!(WireKind::of(&json!(u64::MAX)), WireKind::Integer);
        assert_eq!(WireKind::of(&json!(3.0)), WireKind::Float);
        assert_eq!(WireKind::of(&json!("x")), WireKind::String);
        assert_eq!(WireKind::of(&json!([])), WireKind::Array);
        assert_eq!(WireKind::of(&json!({})), WireKind::Object);
    }
}
