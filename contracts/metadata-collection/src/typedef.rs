//! Type definitions for entities, relationships and classifications

use crate::Definition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a TypeDef, as used by categorized enumeration queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeDefCategory {
    Entity,
    Relationship,
    Classification,
}

impl TypeDefCategory {
    /// All queryable categories in canonical order
    pub const ALL: [TypeDefCategory; 3] = [
        TypeDefCategory::Entity,
        TypeDefCategory::Relationship,
        TypeDefCategory::Classification,
    ];

    /// Wire label of the category
    pub fn label(&self) -> &'static str {
        match self {
            TypeDefCategory::Entity => "ENTITY",
            TypeDefCategory::Relationship => "RELATIONSHIP",
            TypeDefCategory::Classification => "CLASSIFICATION",
        }
    }
}

impl fmt::Display for TypeDefCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Instance status values a type may allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Draft,
    Prepared,
    Proposed,
    Approved,
    Rejected,
    ApprovedConcept,
    Active,
    Deprecated,
    Other,
    Deleted,
}

/// Lightweight reference to another TypeDef
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDefLink {
    pub guid: Option<String>,
    pub name: Option<String>,
}

impl TypeDefLink {
    pub fn new(guid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            guid: Some(guid.into()),
            name: Some(name.into()),
        }
    }
}

/// Mapping of a type or attribute onto an external standard
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ExternalStandardMapping {
    /// Name of the standard (for example "DCAT")
    pub standard_name: Option<String>,
    /// Organization that owns the standard
    pub standard_organization: Option<String>,
    /// Identifier of the equivalent type within the standard
    pub standard_type_name: Option<String>,
}

impl ExternalStandardMapping {
    /// Number of the three identifying fields that carry a non-empty value
    pub fn populated_fields(&self) -> usize {
        [
            &self.standard_name,
            &self.standard_organization,
            &self.standard_type_name,
        ]
        .iter()
        .filter(|field| field.as_deref().is_some_and(|value| !value.is_empty()))
        .count()
    }
}

/// Cardinality of an attribute or relationship end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cardinality {
    AtMostOne,
    AnyNumber,
    AtLeastOne,
    ExactlyOne,
}

/// Attribute definition carried by a TypeDef
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefAttribute {
    pub attribute_name: String,
    /// Name of the AttributeTypeDef describing the value type
    pub attribute_type_name: Option<String>,
    pub attribute_description: Option<String>,
    pub cardinality: Option<Cardinality>,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub external_standard_mappings: Vec<ExternalStandardMapping>,
}

impl TypeDefAttribute {
    pub fn new(attribute_name: impl Into<String>, attribute_type_name: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            attribute_type_name: Some(attribute_type_name.into()),
            attribute_description: None,
            cardinality: Some(Cardinality::AtMostOne),
            is_unique: false,
            external_standard_mappings: Vec::new(),
        }
    }
}

/// One end of a relationship type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEndDef {
    pub entity_type: Option<TypeDefLink>,
    pub attribute_name: Option<String>,
    pub cardinality: Option<Cardinality>,
}

impl RelationshipEndDef {
    pub fn new(entity_type: TypeDefLink, attribute_name: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type),
            attribute_name: Some(attribute_name.into()),
            cardinality: Some(Cardinality::AnyNumber),
        }
    }
}

/// How classifications propagate across a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropagationRule {
    None,
    OneToTwo,
    TwoToOne,
    Both,
}

/// Category-specific body of a TypeDef
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeDefKind {
    Entity,
    Relationship {
        end_def1: Option<RelationshipEndDef>,
        end_def2: Option<RelationshipEndDef>,
        propagation_rule: Option<PropagationRule>,
    },
    Classification {
        #[serde(default)]
        valid_entity_defs: Vec<TypeDefLink>,
        #[serde(default)]
        propagatable: bool,
    },
    /// A category tag this engine does not recognise
    #[serde(other)]
    Unknown,
}

impl TypeDefKind {
    /// Queryable category, `None` for [`TypeDefKind::Unknown`]
    pub fn category(&self) -> Option<TypeDefCategory> {
        match self {
            TypeDefKind::Entity => Some(TypeDefCategory::Entity),
            TypeDefKind::Relationship { .. } => Some(TypeDefCategory::Relationship),
            TypeDefKind::Classification { .. } => Some(TypeDefCategory::Classification),
            TypeDefKind::Unknown => None,
        }
    }
}

/// Structural descriptor of an entity, relationship or classification type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub guid: Option<String>,
    pub name: Option<String>,
    pub version: u64,
    pub version_name: Option<String>,
    pub description: Option<String>,
    pub description_guid: Option<String>,
    pub origin: Option<String>,
    pub created_by: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub update_time: Option<DateTime<Utc>>,
    pub super_type: Option<TypeDefLink>,
    pub initial_status: Option<InstanceStatus>,
    #[serde(default)]
    pub valid_instance_statuses: Vec<InstanceStatus>,
    #[serde(default)]
    pub property_defs: Vec<TypeDefAttribute>,
    #[serde(default)]
    pub external_standard_mappings: Vec<ExternalStandardMapping>,
    #[serde(flatten)]
    pub kind: TypeDefKind,
}

impl TypeDef {
    /// Create a version 1 TypeDef with the usual defaults
    pub fn new(guid: impl Into<String>, name: impl Into<String>, kind: TypeDefKind) -> Self {
        Self {
            guid: Some(guid.into()),
            name: Some(name.into()),
            version: 1,
            version_name: Some("1.0".to_string()),
            description: None,
            description_guid: None,
            origin: None,
            created_by: None,
            create_time: None,
            updated_by: None,
            update_time: None,
            super_type: None,
            initial_status: Some(InstanceStatus::Active),
            valid_instance_statuses: vec![InstanceStatus::Active, InstanceStatus::Deleted],
            property_defs: Vec::new(),
            external_standard_mappings: Vec::new(),
            kind,
        }
    }

    /// Link to this TypeDef
    pub fn link(&self) -> TypeDefLink {
        TypeDefLink {
            guid: self.guid.clone(),
            name: self.name.clone(),
        }
    }

    /// Queryable category, `None` when the category is unknown
    pub fn category(&self) -> Option<TypeDefCategory> {
        self.kind.category()
    }

    /// All mappings on the type itself and on its attributes
    pub fn all_external_mappings(&self) -> impl Iterator<Item = &ExternalStandardMapping> {
        self.external_standard_mappings.iter().chain(
            self.property_defs
                .iter()
                .flat_map(|attr| attr.external_standard_mappings.iter()),
        )
    }

    /// Whether the type or any of its attributes carries a mapping
    pub fn has_external_mappings(&self) -> bool {
        self.all_external_mappings().next().is_some()
    }
}

impl Definition for TypeDef {
    const MUTABLE: bool = true;

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

    fn category_label(&self) -> String {
        match self.kind.category() {
            Some(category) => category.label().to_string(),
            None => "UNKNOWN".to_string(),
        }
    }
}

/// Delta applied to a TypeDef to move it to a new version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefPatch {
    pub type_def_guid: Option<String>,
    pub type_def_name: Option<String>,
    pub apply_to_version: u64,
    pub updated_version: u64,
    pub new_version_name: Option<String>,
    pub updated_by: Option<String>,
    pub update_time: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub property_defs: Option<Vec<TypeDefAttribute>>,
    pub external_standard_mappings: Option<Vec<ExternalStandardMapping>>,
    pub valid_instance_statuses: Option<Vec<InstanceStatus>>,
}

impl TypeDefPatch {
    /// Patch moving `type_def` one version forward
    pub fn for_type_def(type_def: &TypeDef) -> Self {
        Self {
            type_def_guid: type_def.guid.clone(),
            type_def_name: type_def.name.clone(),
            apply_to_version: type_def.version,
            updated_version: type_def.version + 1,
            new_version_name: Some(format!("{}.0", type_def.version + 1)),
            updated_by: None,
            update_time: None,
            description: None,
            property_defs: None,
            external_standard_mappings: None,
            valid_instance_statuses: None,
        }
    }

    /// Produce the patched TypeDef; `None` when the patch does not target `base`'s version
    pub fn apply(&self, base: &TypeDef) -> Option<TypeDef> {
        if base.version != self.apply_to_version || self.updated_version <= base.version {
            return None;
        }

        let mut patched = base.clone();
        patched.version = self.updated_version;
        patched.version_name = self.new_version_name.clone().or(patched.version_name);
        patched.updated_by = self.updated_by.clone();
        patched.update_time = self.update_time;
        if let Some(description) = &self.description {
            patched.description = Some(description.clone());
        }
        if let Some(property_defs) = &self.property_defs {
            patched.property_defs = property_defs.clone();
        }
        if let Some(mappings) = &self.external_standard_mappings {
            patched.external_standard_mappings = mappings.clone();
        }
        if let Some(statuses) = &self.valid_instance_statuses {
            patched.valid_instance_statuses = statuses.clone();
        }
        Some(patched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_category_deserializes() {
        let json = r#"{
            "guid": "g-1",
            "name": "Mystery",
            "version": 1,
            "version_name": "1.0",
            "category": "ANCHOR"
        }"#;
        let type_def: TypeDef = serde_json::from_str(json).unwrap();
        assert_eq!(type_def.kind, TypeDefKind::Unknown);
        assert_eq!(type_def.category(), None);
        assert_eq!(type_def.category_label(), "UNKNOWN");
    }

    #[test]
    fn test_relationship_deserializes() {
        let json = r#"{
            "guid": "g-2",
            "name": "AssetLocation",
            "version": 1,
            "category": "RELATIONSHIP",
            "end_def1": { "entity_type": { "guid": "g-a", "name": "Asset" }, "attribute_name": "asset", "cardinality": "ANY_NUMBER" },
            "end_def2": null,
            "propagation_rule": "NONE"
        }"#;
        let type_def: TypeDef = serde_json::from_str(json).unwrap();
        match type_def.kind {
            TypeDefKind::Relationship { end_def1, end_def2, .. } => {
                assert!(end_def1.is_some());
                assert!(end_def2.is_none());
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_mappings_include_attributes() {
        let mut type_def = TypeDef::new("g-1", "Asset", TypeDefKind::Entity);
        assert!(!type_def.has_external_mappings());

        let mut attr = TypeDefAttribute::new("qualifiedName", "string");
        attr.external_standard_mappings.push(ExternalStandardMapping {
            standard_name: Some("DCAT".into()),
            ..Default::default()
        });
        type_def.property_defs.push(attr);

        assert!(type_def.has_external_mappings());
        assert_eq!(type_def.all_external_mappings().count(), 1);
    }

    #[test]
    fn test_patch_apply() {
        let base = TypeDef::new("g-1", "Asset", TypeDefKind::Entity);
        let mut patch = TypeDefPatch::for_type_def(&base);
        patch.description = Some("An asset".into());
        patch.updated_by = Some("admin".into());

        let patched = patch.apply(&base).unwrap();
        assert_eq!(patched.version, 2);
        assert_eq!(patched.version_name.as_deref(), Some("2.0"));
        assert_eq!(patched.description.as_deref(), Some("An asset"));

        // A stale patch no longer applies
        assert!(patch.apply(&patched).is_none());
    }

    #[test]
    fn test_populated_fields() {
        let mapping = ExternalStandardMapping {
            standard_name: Some("DCAT".into()),
            standard_organization: Some("W3C".into()),
            standard_type_name: None,
        };
        assert_eq!(mapping.populated_fields(), 2);
        assert_eq!(ExternalStandardMapping::default().populated_fields(), 0);

        let blank_standard = ExternalStandardMapping {
            standard_name: Some(String::new()),
            ..mapping
        };
        assert_eq!(blank_standard.populated_fields(), 1);
    }
}
