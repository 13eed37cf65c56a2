//! Component type descriptors.
//!
//! A component type is described by a [`ComponentSchema`]: a name plus an
//! ordered list of fields, each carrying a [`FieldKind`]. A schema with no
//! fields is a **tag** — it stores nothing and exists only as a presence bit.
//!
//! Schemas are plain data resolved once at registration time; nothing is
//! inspected reflectively afterwards. Invalid schemas are rejected
//! immediately with a [`SchemaError`], never deferred to first use.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating or registering component schemas and
/// query specifications.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("duplicate component: {0}")]
    DuplicateComponent(String),
    #[error("component '{component}' declares duplicate field '{field}'")]
    DuplicateField { component: String, field: String },
    #[error("component '{component}' field '{field}' declares a zero-length array")]
    ZeroLengthArray { component: String, field: String },
    #[error("unknown component referenced: {0}")]
    UnknownComponent(String),
    #[error("component '{0}' is a tag and has no fields")]
    TagHasNoFields(String),
    #[error("component '{component}' has no field named '{field}'")]
    UnknownField { component: String, field: String },
}

/// The scalar element types a component field can store.
///
/// [`ScalarType::EntityRef`] is stored as a `u32` and is semantically a
/// foreign key to another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
    EntityRef,
}

impl ScalarType {
    /// The storage lane this scalar type occupies. Entity references share
    /// the `U32` lane.
    #[must_use]
    pub const fn lane(self) -> ScalarType {
        match self {
            ScalarType::EntityRef => ScalarType::U32,
            other => other,
        }
    }
}

/// The shape of a single component field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// One scalar value per entity.
    Scalar(ScalarType),
    /// A fixed-length array of scalars per entity.
    Array { elem: ScalarType, len: usize },
}

impl FieldKind {
    /// Element type of this field.
    #[must_use]
    pub const fn elem(self) -> ScalarType {
        match self {
            FieldKind::Scalar(s) => s,
            FieldKind::Array { elem, .. } => elem,
        }
    }

    /// Number of scalar lanes this field occupies per entity.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            FieldKind::Scalar(_) => 1,
            FieldKind::Array { len, .. } => len,
        }
    }
}

/// A named field within a component schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

/// Describes one component type: a name and its fields.
///
/// Build with [`ComponentSchema::new`] + [`ComponentSchema::field`] /
/// [`ComponentSchema::array`], or [`ComponentSchema::tag`] for a zero-size
/// marker type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSchema {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl ComponentSchema {
    /// Start a schema with the given component name and no fields yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// A tag component: no fields, no storage, presence tracked purely via
    /// the world's bitmask.
    #[must_use]
    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(name)
    }

    /// Add a scalar field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: ScalarType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Scalar(ty),
        });
        self
    }

    /// Add a fixed-length array field.
    #[must_use]
    pub fn array(mut self, name: impl Into<String>, elem: ScalarType, len: usize) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldKind::Array { elem, len },
        });
        self
    }

    /// An empty schema is a zero-sized tag.
    #[must_use]
    pub fn is_tag(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate the schema: field names must be unique and array lengths
    /// non-zero.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (i, field) in self.fields.iter().enumerate() {
            if let FieldKind::Array { len: 0, .. } = field.kind {
                return Err(SchemaError::ZeroLengthArray {
                    component: self.name.clone(),
                    field: field.name.clone(),
                });
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateField {
                    component: self.name.clone(),
                    field: field.name.clone(),
                });
            }
        }
        Ok(())
    }
}
