//! Partial-field projection
//!
//! Responses arrive as untyped `arguments` maps whose key set depends on the
//! fields the caller asked for. Projection is the second phase of decoding:
//! walk the requested [`Shape`], look each attribute up in the field registry,
//! and coerce the wire value only if its key is present. Attributes whose key
//! is absent stay [`Field::Unset`], which is distinct from any zero value.
//!
//! Coercion is strict. Integers widen into floats, but floats never narrow
//! into integers, and a present `null` is a type mismatch rather than unset.

use std::fmt;
use std::marker::PhantomData;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::error::{ProjectionError, ProjectionResult, RegistryResult};
use super::fields::{EntityKind, FieldDescriptor, FieldRegistry, OrdinalTable, WireKind, WireType};

/// Presence-tracking attribute of a projected entity
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    /// Not requested, or not present in the response
    Unset,
    /// Present in the response
    Set(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Unset
    }
}

impl<T> Field<T> {
    /// True when the attribute was present in the response
    pub fn is_set(&self) -> bool {
        matches!(self, Field::Set(_))
    }

    /// True when the attribute was not requested or not present
    pub fn is_unset(&self) -> bool {
        !self.is_set()
    }

    /// Borrow the value if set
    pub fn get(&self) -> Option<&T> {
        match self {
            Field::Set(value) => Some(value),
            Field::Unset => None,
        }
    }

}

impl<T: Copy> Field<T> {
    /// Copy the value out if set
    pub fn value(&self) -> Option<T> {
        self.get().copied()
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Field::Set(value),
            None => Field::Unset,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Set(value) => value.serialize(serializer),
            Field::Unset => serializer.serialize_none(),
        }
    }
}

/// Strict conversion from a dynamic wire value
///
/// The associated constants describe the wire form of the implementing type;
/// the registry descriptors are built from them, so a field's declared wire
/// type always agrees with the Rust type that receives it.
pub trait FromWire: Sized {
    /// Wire type this Rust type decodes from
    const WIRE_TYPE: WireType;
    /// Element type for arrays
    const ELEMENT: Option<WireType> = None;
    /// Nested entity kind for objects and arrays of objects
    const NESTED: Option<EntityKind> = None;
    /// Ordinal mapping for enumerations
    const ORDINALS: Option<OrdinalTable> = None;

    /// Coerce a present wire value.
    fn from_wire(value: &Value) -> ProjectionResult<Self>;
}

fn mismatch<T: FromWire>(value: &Value) -> ProjectionError {
    ProjectionError::mismatch(T::WIRE_TYPE, WireKind::of(value))
}

impl FromWire for bool {
    const WIRE_TYPE: WireType = WireType::Bool;

    fn from_wire(value: &Value) -> ProjectionResult<Self> {
        value.as_bool().ok_or_else(|| mismatch::<Self>(value))
    }
}

impl FromWire for i32 {
    const WIRE_TYPE: WireType = WireType::Int;

    fn from_wire(value: &Value) -> ProjectionResult<Self> {
        value
            .as_i64()
            .and_then(|raw| i32::try_from(raw).ok())
            .ok_or_else(|| mismatch::<Self>(value))
    }
}

impl FromWire for i64 {
    const WIRE_TYPE: WireType = WireType::Int64;

    fn from_wire(value: &Value) -> ProjectionResult<Self> {
        value.as_i64().ok_or_else(|| mismatch::<Self>(value))
    }
}

impl FromWire for f64 {
    const WIRE_TYPE: WireType = WireType::Float;

    fn from_wire(value: &Value) -> ProjectionResult<Self> {
        // Integers widen.
        value.as_f64().ok_or_else(|| mismatch::<Self>(value))
    }
}

impl FromWire for String {
    const WIRE_TYPE: WireType = WireType::String;

    fn from_wire(value: &Value) -> ProjectionResult<Self> {
        value
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| mismatch::<Self>(value))
    }
}

impl<T: FromWire> FromWire for Vec<T> {
    const WIRE_TYPE: WireType = WireType::Array;
    const ELEMENT: Option<WireType> = Some(T::WIRE_TYPE);
    const NESTED: Option<EntityKind> = T::NESTED;
    const ORDINALS: Option<OrdinalTable> = T::ORDINALS;

    fn from_wire(value: &Value) -> ProjectionResult<Self> {
        let items = value.as_array().ok_or_else(|| mismatch::<Self>(value))?;
        items
            .iter()
            .enumerate()
            .map(|(index, item)| T::from_wire(item).map_err(|err| err.at(&format!("[{index}]"))))
            .collect()
    }
}

/// An entity that can be materialized from a partial arguments map
pub trait Projectable: Default {
    /// Registry table of this entity
    const KIND: EntityKind;
    /// Field descriptors in declaration order
    const FIELDS: &'static [FieldDescriptor];

    /// Coerce `value` into the attribute named by `descriptor`.
    fn assign(&mut self, descriptor: &FieldDescriptor, value: &Value) -> ProjectionResult<()>;
}

/// Ordered set of attributes a caller asks for
pub struct Shape<E> {
    fields: Vec<&'static FieldDescriptor>,
    entity: PhantomData<fn() -> E>,
}

impl<E: Projectable> Shape<E> {
    /// Shape covering the named attributes, in caller order.
    ///
    /// Duplicates are collapsed to their first occurrence.
    pub fn new<I, S>(names: I) -> RegistryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let table = FieldRegistry::global().entity(E::KIND);
        let mut fields: Vec<&'static FieldDescriptor> = Vec::new();
        for name in names {
            let descriptor = table.resolve(name.as_ref())?;
            if !fields.iter().any(|f| f.logical_name == descriptor.logical_name) {
                fields.push(descriptor);
            }
        }
        Ok(Self {
            fields,
            entity: PhantomData,
        })
    }

    /// Shape covering every registered attribute
    pub fn full() -> Self {
        Self {
            fields: E::FIELDS.iter().collect(),
            entity: PhantomData,
        }
    }

    /// Descriptors in request order
    pub fn fields(&self) -> &[&'static FieldDescriptor] {
        &self.fields
    }

    /// Wire keys for the `fields` request parameter
    pub fn wire_keys(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.wire_key).collect()
    }

    /// Logical names in request order
    pub fn logical_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.logical_name).collect()
    }
}

impl<E> Clone for Shape<E> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for Shape<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.fields.iter().map(|d| d.logical_name))
            .finish()
    }
}

/// Materialize one entity from an arguments map.
pub fn project<E: Projectable>(arguments: &Map<String, Value>, shape: &Shape<E>) -> ProjectionResult<E> {
    let mut entity = E::default();
    for descriptor in shape.fields() {
        let Some(value) = arguments.get(descriptor.wire_key) else {
            continue;
        };
        entity
            .assign(descriptor, value)
            .map_err(|err| err.at(descriptor.logical_name))?;
    }
    Ok(entity)
}

/// Materialize a sequence of entities, preserving input order.
pub fn project_many<E: Projectable>(items: &[Value], shape: &Shape<E>) -> ProjectionResult<Vec<E>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let segment = format!("[{index}]");
            let map = item.as_object().ok_or_else(|| {
                ProjectionError::mismatch(WireType::Object, WireKind::of(item)).at(&segment)
            })?;
            project(map, shape).map_err(|err| err.at(&segment))
        })
        .collect()
}

/// Declare a projectable entity together with its registry table.
///
/// Each attribute names its Rust type and wire key; the logical name is the
/// attribute identifier and the wire type comes from the type's [`FromWire`]
/// implementation.
macro_rules! projectable {
    (
        $(#[$meta:meta])*
        pub struct $name:ident : $kind:path {
            $(
                $(#[$field_meta:meta])*
                $field:ident : $ty:ty = $wire:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[allow(missing_docs)]
        #[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                #[serde(skip_serializing_if = "Field::is_unset")]
                pub $field: $crate::rpc::projector::Field<$ty>,
            )*
        }

        impl $crate::rpc::projector::Projectable for $name {
            const KIND: $crate::rpc::fields::EntityKind = $kind;
            const FIELDS: &'static [$crate::rpc::fields::FieldDescriptor] = &[
                $(
                    $crate::rpc::fields::FieldDescriptor {
                        logical_name: stringify!($field),
                        wire_key: $wire,
                        wire_type: <$ty as $crate::rpc::projector::FromWire>::WIRE_TYPE,
                        element: <$ty as $crate::rpc::projector::FromWire>::ELEMENT,
                        nested: <$ty as $crate::rpc::projector::FromWire>::NESTED,
                        ordinals: <$ty as $crate::rpc::projector::FromWire>::ORDINALS,
                    },
                )*
            ];

            fn assign(
                &mut self,
                descriptor: &$crate::rpc::fields::FieldDescriptor,
                value: &serde_json::Value,
            ) -> $crate::rpc::error::ProjectionResult<()> {
                match descriptor.logical_name {
                    $(
                        stringify!($field) => {
                            self.$field = $crate::rpc::projector::Field::Set(
                                <$ty as $crate::rpc::projector::FromWire>::from_wire(value)?,
                            );
                        }
                    )*
                    other => {
                        return Err($crate::rpc::error::RegistryError::UnknownField {
                            entity: $kind,
                            name: other.to_string(),
                        }
                        .into());
                    }
                }
                Ok(())
            }
        }

        impl $crate::rpc::projector::FromWire for $name {
            const WIRE_TYPE: $crate::rpc::fields::WireType = $crate::rpc::fields::WireType::Object;
            const NESTED: Option<$crate::rpc::fields::EntityKind> = Some($kind);

            fn from_wire(value: &serde_json::Value) -> $crate::rpc::error::ProjectionResult<Self> {
                let map = value.as_object().ok_or_else(|| {
                    $crate::rpc::error::ProjectionError::mismatch(
                        $crate::rpc::fields::WireType::Object,
                        $crate::rpc::fields::WireKind::of(value),
                    )
                })?;
                $crate::rpc::projector::project(map, &$crate::rpc::projector::Shape::full())
            }
        }
    };
}

pub(crate) use projectable;
