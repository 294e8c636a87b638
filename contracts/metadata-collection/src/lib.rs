//! Metadata Collection Contract
//!
//! This crate defines the formal interface through which a metadata
//! repository exposes its type system, together with the data model that
//! crosses that interface:
//!
//! - TypeDefs (entity, relationship and classification types)
//! - AttributeTypeDefs (primitive, collection and enum value types)
//! - TypeDef patches and galleries
//! - Type definition change notifications
//!
//! An in-memory implementation is provided for development and for
//! exercising conformance tooling without a live repository.

#![deny(unsafe_code)]

pub mod attribute;
pub mod contract;
pub mod event;
pub mod memory;
pub mod typedef;

pub use attribute::{
    AttributeTypeDef, AttributeTypeDefCategory, AttributeTypeDefKind, CollectionKind,
    EnumElementDef, PrimitiveKind,
};
pub use contract::{Definition, MetadataCollection, RepositoryError, Result, TypeDefGallery};
pub use event::{EventOriginator, TypeDefEvent, TypeDefEventKind};
pub use memory::InMemoryMetadataCollection;
pub use typedef::{
    Cardinality, ExternalStandardMapping, InstanceStatus, PropagationRule, RelationshipEndDef,
    TypeDef, TypeDefAttribute, TypeDefCategory, TypeDefKind, TypeDefLink, TypeDefPatch,
};
