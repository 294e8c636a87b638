//! Attribute type definitions: primitives, collections and enums
//!
//! AttributeTypeDefs never change once created, so there is no patch type
//! for them.

use crate::Definition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of an AttributeTypeDef, as used by categorized enumeration queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeTypeDefCategory {
    Primitive,
    Collection,
    Enum,
}

impl AttributeTypeDefCategory {
    /// All queryable categories in canonical order
    pub const ALL: [AttributeTypeDefCategory; 3] = [
        AttributeTypeDefCategory::Primitive,
        AttributeTypeDefCategory::Collection,
        AttributeTypeDefCategory::Enum,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AttributeTypeDefCategory::Primitive => "PRIMITIVE",
            AttributeTypeDefCategory::Collection => "COLLECTION",
            AttributeTypeDefCategory::Enum => "ENUM",
        }
    }
}

impl fmt::Display for AttributeTypeDefCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Primitive value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    String,
    Date,
}

impl PrimitiveKind {
    pub fn label(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "BOOLEAN",
            PrimitiveKind::Byte => "BYTE",
            PrimitiveKind::Char => "CHAR",
            PrimitiveKind::Short => "SHORT",
            PrimitiveKind::Int => "INT",
            PrimitiveKind::Long => "LONG",
            PrimitiveKind::Float => "FLOAT",
            PrimitiveKind::Double => "DOUBLE",
            PrimitiveKind::BigInteger => "BIGINTEGER",
            PrimitiveKind::BigDecimal => "BIGDECIMAL",
            PrimitiveKind::String => "STRING",
            PrimitiveKind::Date => "DATE",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Shape of a collection value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionKind {
    Map,
    Array,
    Struct,
}

impl CollectionKind {
    pub fn label(&self) -> &'static str {
        match self {
            CollectionKind::Map => "MAP",
            CollectionKind::Array => "ARRAY",
            CollectionKind::Struct => "STRUCT",
        }
    }
}

/// One valid value of an enum attribute type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumElementDef {
    pub ordinal: u32,
    pub value: String,
    pub description: Option<String>,
}

impl EnumElementDef {
    pub fn new(ordinal: u32, value: impl Into<String>) -> Self {
        Self {
            ordinal,
            value: value.into(),
            description: None,
        }
    }
}

/// Category-specific body of an AttributeTypeDef
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeTypeDefKind {
    Primitive {
        primitive_def_category: Option<PrimitiveKind>,
    },
    Collection {
        collection_def_category: Option<CollectionKind>,
        argument_count: u32,
        #[serde(default)]
        argument_types: Vec<PrimitiveKind>,
    },
    Enum {
        #[serde(default)]
        element_defs: Vec<EnumElementDef>,
        default_value: Option<EnumElementDef>,
    },
    /// A category tag this engine does not recognise
    #[serde(other)]
    Unknown,
}

impl AttributeTypeDefKind {
    pub fn category(&self) -> Option<AttributeTypeDefCategory> {
        match self {
            AttributeTypeDefKind::Primitive { .. } => Some(AttributeTypeDefCategory::Primitive),
            AttributeTypeDefKind::Collection { .. } => Some(AttributeTypeDefCategory::Collection),
            AttributeTypeDefKind::Enum { .. } => Some(AttributeTypeDefCategory::Enum),
            AttributeTypeDefKind::Unknown => None,
        }
    }
}

/// Structural descriptor of a value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeTypeDef {
    pub guid: Option<String>,
    pub name: Option<String>,
    pub version: u64,
    pub version_name: Option<String>,
    pub description: Option<String>,
    pub description_guid: Option<String>,
    #[serde(flatten)]
    pub kind: AttributeTypeDefKind,
}

impl AttributeTypeDef {
    pub fn new(guid: impl Into<String>, name: impl Into<String>, kind: AttributeTypeDefKind) -> Self {
        Self {
            guid: Some(guid.into()),
            name: Some(name.into()),
            version: 1,
            version_name: Some("1.0".to_string()),
            description: None,
            description_guid: None,
            kind,
        }
    }

    /// Convenience constructor for a primitive type
    pub fn primitive(guid: impl Into<String>, kind: PrimitiveKind) -> Self {
        Self::new(
            guid,
            kind.label().to_lowercase(),
            AttributeTypeDefKind::Primitive {
                primitive_def_category: Some(kind),
            },
        )
    }

    pub fn category(&self) -> Option<AttributeTypeDefCategory> {
        self.kind.category()
    }
}

impl Definition for AttributeTypeDef {
    const MUTABLE: bool = false;

    fn guid(&self) -> Option<&str> {
        self.guid.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn version_name(&self) -> Option<&str> {
        self.version_name.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn description_guid(&self) -> Option<&str> {
        self.description_guid.as_deref()
    }

    /// Category refined with its subtype, for example `PRIMITIVE<STRING>`
    fn category_label(&self) -> String {
        match &self.kind {
            AttributeTypeDefKind::Primitive {
                primitive_def_category: Some(kind),
            } => format!("PRIMITIVE<{}>", kind),
            AttributeTypeDefKind::Primitive { .. } => "PRIMITIVE".to_string(),
            AttributeTypeDefKind::Collection {
                collection_def_category,
                argument_types,
                ..
            } => {
                let args: Vec<&str> = argument_types.iter().map(|a| a.label()).collect();
                match collection_def_category {
                    Some(kind) => format!("COLLECTION<{}<{}>>", kind.label(), args.join(",")),
                    None => format!("COLLECTION<{}>", args.join(",")),
                }
            }
            AttributeTypeDefKind::Enum { .. } => "ENUM".to_string(),
            AttributeTypeDefKind::Unknown => "UNKNOWN".to_string(),
        }
    }
}
