//! Per-type compliance probes
//!
//! One test case per supported definition: structural validation, the
//! repository's own confirmation that it supports the definition, and round
//! trips through lookup by name, lookup by GUID and name search.

use crate::consistency::{assert_consistent, describe};
use crate::context::{ProbeContext, ProbeResult, Timing};
use crate::profile::Requirement;
use metadata_collection::{
    AttributeTypeDef, AttributeTypeDefKind, Definition, ExternalStandardMapping, TypeDef,
    TypeDefKind,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where the definition under test was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoverySource {
    /// The unfiltered enumeration
    AllTypes,
    /// A categorized enumeration only
    CategoryEnumeration,
}

impl DiscoverySource {
    pub fn label(&self) -> &'static str {
        match self {
            DiscoverySource::AllTypes => "all-types-enumeration",
            DiscoverySource::CategoryEnumeration => "category-enumeration",
        }
    }
}

/// Check one TypeDef the repository claims to support
pub async fn check_type_def(
    probe: &ProbeContext<'_>,
    type_def: &TypeDef,
    source: DiscoverySource,
) -> ProbeResult<()> {
    let (name, guid) = check_identity(probe, type_def)?;

    if type_def.version > 1 {
        probe.verify(
            type_def.updated_by.is_some() && type_def.update_time.is_some(),
            "type-def-update-audit",
            format!("{} at version {} records who updated it and when", name, type_def.version),
            Requirement::TypeDefStructure,
        );
    }
    let initial_status_valid = type_def
        .initial_status
        .is_some_and(|status| type_def.valid_instance_statuses.contains(&status));
    probe.verify(
        initial_status_valid,
        "type-def-initial-status",
        format!(
            "{} has initial status {:?} among its valid statuses {:?}",
            name, type_def.initial_status, type_def.valid_instance_statuses
        ),
        Requirement::TypeDefStructure,
    );

    probe.assert(
        type_def.category().is_some(),
        "type-def-category",
        format!("{} has category {}", name, type_def.category_label()),
        Requirement::TypeDefStructure,
    )?;

    match &type_def.kind {
        TypeDefKind::Entity => {}
        TypeDefKind::Relationship {
            end_def1, end_def2, ..
        } => {
            let defined = |end: &Option<metadata_collection::RelationshipEndDef>| {
                end.as_ref().is_some_and(|end| end.entity_type.is_some())
            };
            probe.assert(
                defined(end_def1),
                "relationship-end-1",
                format!("Relationship {} defines its first end", name),
                Requirement::TypeDefStructure,
            )?;
            probe.assert(
                defined(end_def2),
                "relationship-end-2",
                format!("Relationship {} defines its second end", name),
                Requirement::TypeDefStructure,
            )?;
        }
        TypeDefKind::Classification {
            valid_entity_defs, ..
        } => {
            probe.assert(
                !valid_entity_defs.is_empty(),
                "classification-valid-entities",
                format!("Classification {} can be attached to at least one entity type", name),
                Requirement::TypeDefStructure,
            )?;
        }
        // Already rejected by the category assertion
        TypeDefKind::Unknown => {}
    }

    let collection = probe.collection();
    let user_id = probe.user_id();

    let (supported, timing) = probe
        .call(
            "verify-type-def",
            Requirement::SupportedTypeVerification,
            "verify_type_def",
            collection.verify_type_def(user_id, type_def),
        )
        .await?;
    probe.assert_timed(
        supported,
        "verify-type-def",
        format!("Repository confirms it supports {}", describe(type_def)),
        Requirement::SupportedTypeVerification,
        &timing,
    )?;

    let (by_name, timing) = probe
        .call(
            "get-by-name",
            Requirement::TypeDefLookupByName,
            "get_type_def_by_name",
            collection.get_type_def_by_name(user_id, name),
        )
        .await?;
    let by_name = probe.require_timed(
        by_name,
        "get-by-name",
        format!("{} is retrievable by name", name),
        Requirement::TypeDefLookupByName,
        &timing,
    )?;
    assert_consistent(
        probe,
        "get-by-name-consistent",
        type_def,
        &by_name,
        Requirement::TypeDefLookupByName,
        &timing,
    )?;
    record_latency(probe, &timing);

    let (by_guid, timing) = probe
        .call(
            "get-by-guid",
            Requirement::TypeDefLookupByGuid,
            "get_type_def_by_guid",
            collection.get_type_def_by_guid(user_id, guid),
        )
        .await?;
    let by_guid = probe.require_timed(
        by_guid,
        "get-by-guid",
        format!("{} is retrievable by GUID {}", name, guid),
        Requirement::TypeDefLookupByGuid,
        &timing,
    )?;
    assert_consistent(
        probe,
        "get-by-guid-consistent",
        type_def,
        &by_guid,
        Requirement::TypeDefLookupByGuid,
        &timing,
    )?;
    record_latency(probe, &timing);

    let (gallery, timing) = probe
        .call(
            "find-by-name",
            Requirement::TypeNameSearch,
            "find_types_by_name",
            collection.find_types_by_name(user_id, name),
        )
        .await?;
    let gallery = probe.require_timed(
        gallery,
        "find-by-name",
        format!("Name search for {} returns a result", name),
        Requirement::TypeNameSearch,
        &timing,
    )?;
    probe.assert_timed(
        gallery
            .type_defs
            .iter()
            .any(|found| found.guid.as_deref() == Some(guid)),
        "find-by-name-contains",
        format!("Name search for {} returns the TypeDef itself", name),
        Requirement::TypeNameSearch,
        &timing,
    )?;

    if !probe.run().rest_attribute_type_defs().contains(name) {
        probe.assert_timed(
            gallery.attribute_type_defs.is_empty(),
            "find-by-name-no-attribute-types",
            format!(
                "Name search for {} returns no AttributeTypeDefs (found {})",
                name,
                gallery.attribute_type_defs.len()
            ),
            Requirement::TypeNameSearch,
            &timing,
        )?;
        probe.assert_timed(
            gallery.type_defs.len() == 1,
            "find-by-name-unique",
            format!(
                "Name search for {} returns exactly one TypeDef (found {})",
                name,
                gallery.type_defs.len()
            ),
            Requirement::TypeNameSearch,
            &timing,
        )?;
    }

    record_definition_properties(probe, type_def, source);
    if type_def.has_external_mappings() {
        probe.record_property(
            Requirement::ExternalStandardMapping,
            "external-mappings",
            type_def
                .all_external_mappings()
                .map(render_mapping)
                .collect::<Vec<_>>(),
        );
    }

    probe.run().rest_type_defs().record(type_def);
    debug!(type_def = %name, source = source.label(), "TypeDef compliance checked");
    Ok(())
}

/// Check one AttributeTypeDef the repository claims to support
pub async fn check_attribute_type_def(
    probe: &ProbeContext<'_>,
    attribute_type_def: &AttributeTypeDef,
    source: DiscoverySource,
) -> ProbeResult<()> {
    let (name, guid) = check_identity(probe, attribute_type_def)?;

    probe.assert(
        attribute_type_def.category().is_some(),
        "attribute-type-def-category",
        format!("{} has category {}", name, attribute_type_def.category_label()),
        Requirement::TypeDefStructure,
    )?;

    match &attribute_type_def.kind {
        AttributeTypeDefKind::Primitive {
            primitive_def_category,
        } => {
            probe.assert(
                primitive_def_category.is_some(),
                "primitive-kind",
                format!("Primitive {} names its primitive kind", name),
                Requirement::TypeDefStructure,
            )?;
        }
        AttributeTypeDefKind::Collection {
            argument_count,
            argument_types,
            ..
        } => {
            probe.assert(
                *argument_count > 0,
                "collection-argument-count",
                format!("Collection {} declares {} arguments", name, argument_count),
                Requirement::TypeDefStructure,
            )?;
            probe.assert(
                argument_types.len() == *argument_count as usize,
                "collection-argument-types",
                format!(
                    "Collection {} lists {} argument types for {} arguments",
                    name,
                    argument_types.len(),
                    argument_count
                ),
                Requirement::TypeDefStructure,
            )?;
        }
        AttributeTypeDefKind::Enum { element_defs, .. } => {
            probe.assert(
                !element_defs.is_empty(),
                "enum-elements",
                format!("Enum {} defines at least one element", name),
                Requirement::TypeDefStructure,
            )?;
        }
        // Already rejected by the category assertion
        AttributeTypeDefKind::Unknown => {}
    }

    let collection = probe.collection();
    let user_id = probe.user_id();

    let (supported, timing) = probe
        .call(
            "verify-attribute-type-def",
            Requirement::SupportedTypeVerification,
            "verify_attribute_type_def",
            collection.verify_attribute_type_def(user_id, attribute_type_def),
        )
        .await?;
    probe.assert_timed(
        supported,
        "verify-attribute-type-def",
        format!("Repository confirms it supports {}", describe(attribute_type_def)),
        Requirement::SupportedTypeVerification,
        &timing,
    )?;

    let (by_name, timing) = probe
        .call(
            "get-by-name",
            Requirement::TypeDefLookupByName,
            "get_attribute_type_def_by_name",
            collection.get_attribute_type_def_by_name(user_id, name),
        )
        .await?;
    let by_name = probe.require_timed(
        by_name,
        "get-by-name",
        format!("{} is retrievable by name", name),
        Requirement::TypeDefLookupByName,
        &timing,
    )?;
    assert_consistent(
        probe,
        "get-by-name-consistent",
        attribute_type_def,
        &by_name,
        Requirement::TypeDefLookupByName,
        &timing,
    )?;
    record_latency(probe, &timing);

    let (by_guid, timing) = probe
        .call(
            "get-by-guid",
            Requirement::TypeDefLookupByGuid,
            "get_attribute_type_def_by_guid",
            collection.get_attribute_type_def_by_guid(user_id, guid),
        )
        .await?;
    let by_guid = probe.require_timed(
        by_guid,
        "get-by-guid",
        format!("{} is retrievable by GUID {}", name, guid),
        Requirement::TypeDefLookupByGuid,
        &timing,
    )?;
    assert_consistent(
        probe,
        "get-by-guid-consistent",
        attribute_type_def,
        &by_guid,
        Requirement::TypeDefLookupByGuid,
        &timing,
    )?;
    record_latency(probe, &timing);

    record_definition_properties(probe, attribute_type_def, source);

    probe.run().rest_attribute_type_defs().record(attribute_type_def);
    debug!(attribute_type_def = %name, source = source.label(), "AttributeTypeDef compliance checked");
    Ok(())
}

fn check_identity<'d, D: Definition>(
    probe: &ProbeContext<'_>,
    definition: &'d D,
) -> ProbeResult<(&'d str, &'d str)> {
    let name = probe.require(
        definition.name().filter(|name| !name.is_empty()),
        "identity-name",
        "Definition has a name",
        Requirement::TypeDefIdentity,
    )?;
    let guid = probe.require(
        definition.guid().filter(|guid| !guid.is_empty()),
        "identity-guid",
        format!("{} has a GUID", name),
        Requirement::TypeDefIdentity,
    )?;
    probe.assert(
        definition.version() > 0,
        "identity-version",
        format!("{} has a positive version ({})", name, definition.version()),
        Requirement::TypeDefIdentity,
    )?;
    probe.assert(
        definition.version_name().is_some_and(|label| !label.is_empty()),
        "identity-version-name",
        format!("{} has a version name", name),
        Requirement::TypeDefIdentity,
    )?;
    Ok((name, guid))
}

fn record_definition_properties<D: Definition>(
    probe: &ProbeContext<'_>,
    definition: &D,
    source: DiscoverySource,
) {
    if let Some(guid) = definition.guid() {
        probe.record_property(Requirement::TypeDefIdentity, "guid", guid);
    }
    probe.record_property(
        Requirement::TypeDefStructure,
        "category",
        definition.category_label(),
    );
    let version = match definition.version_name() {
        Some(label) => format!("{} ({})", label, definition.version()),
        None => definition.version().to_string(),
    };
    probe.record_property(Requirement::TypeDefIdentity, "version", version);
    if let Some(description) = definition.description() {
        probe.record_property(Requirement::TypeDefStructure, "description", description);
    }
    if let Some(description_guid) = definition.description_guid() {
        probe.record_property(Requirement::TypeDefStructure, "description-guid", description_guid);
    }
    probe.record_property(Requirement::TypeDefStructure, "discovery-source", source.label());
}

fn record_latency(probe: &ProbeContext<'_>, timing: &Timing) {
    probe.record_property(
        Requirement::TypeRetrievalLatency,
        format!("{}-ms", timing.operation),
        timing.elapsed_ms(),
    );
}

fn render_mapping(mapping: &ExternalStandardMapping) -> String {
    format!(
        "{}/{}/{}",
        mapping.standard_organization.as_deref().unwrap_or("-"),
        mapping.standard_name.as_deref().unwrap_or("-"),
        mapping.standard_type_name.as_deref().unwrap_or("-")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::context::RunContext;
    use crate::evidence::{PropertyValue, TestCaseStatus};
    use metadata_collection::{
        CollectionKind, InMemoryMetadataCollection, PrimitiveKind, RelationshipEndDef,
        TypeDefLink,
    };
    use std::sync::Arc;

    fn asset() -> TypeDef {
        TypeDef::new("G1", "Asset", TypeDefKind::Entity)
    }

    fn run_with(collection: InMemoryMetadataCollection) -> RunContext {
        RunContext::new(RunConfig::new("cocoMDS1", "mc-1"), Arc::new(collection))
    }

    #[tokio::test]
    async fn test_supported_type_def_passes() {
        let collection = InMemoryMetadataCollection::new("mc-1", "cocoMDS1");
        collection.add_type_def(asset()).unwrap();
        let run = run_with(collection);

        let probe = run.probe("repository-supported-typedef-Asset");
        let outcome = check_type_def(&probe, &asset(), DiscoverySource::AllTypes).await;
        assert_eq!(probe.finish(outcome), TestCaseStatus::Passed);

        assert_eq!(run.recorder().failure_count(), 0);
        assert!(run.rest_type_defs().contains("Asset"));
        let category = run.recorder().properties_named("category");
        assert_eq!(category[0].value, PropertyValue::Text("ENTITY".into()));
    }

    #[tokio::test]
    async fn test_type_def_description_recorded() {
        let mut described = asset();
        described.description = Some("Something of value".into());
        described.description_guid = Some("g-glossary-asset".into());
        let collection = InMemoryMetadataCollection::new("mc-1", "cocoMDS1");
        collection.add_type_def(described.clone()).unwrap();
        let run = run_with(collection);

        let probe = run.probe("repository-supported-typedef-Asset");
        let outcome = check_type_def(&probe, &described, DiscoverySource::AllTypes).await;
        assert_eq!(probe.finish(outcome), TestCaseStatus::Passed);

        let description = run.recorder().properties_named("description");
        assert_eq!(description.len(), 1);
        assert_eq!(description[0].value, PropertyValue::Text("Something of value".into()));
        let description_guid = run.recorder().properties_named("description-guid");
        assert_eq!(description_guid.len(), 1);
        assert_eq!(description_guid[0].value, PropertyValue::Text("g-glossary-asset".into()));
    }

    #[tokio::test]
    async fn test_unsupported_type_def_aborts_at_verification() {
        let run = run_with(InMemoryMetadataCollection::new("mc-1", "cocoMDS1"));

        let probe = run.probe("repository-supported-typedef-Asset");
        let outcome = check_type_def(&probe, &asset(), DiscoverySource::AllTypes).await;
        assert_eq!(outcome.unwrap_err().assertion_id, "verify-type-def");
        assert!(!run.rest_type_defs().contains("Asset"));
    }

    #[tokio::test]
    async fn test_relationship_without_ends_aborts() {
        let relationship = TypeDef::new(
            "g-rel",
            "AssetLink",
            TypeDefKind::Relationship {
                end_def1: Some(RelationshipEndDef::new(TypeDefLink::new("G1", "Asset"), "from")),
                end_def2: None,
                propagation_rule: None,
            },
        );
        let run = run_with(InMemoryMetadataCollection::new("mc-1", "cocoMDS1"));

        let probe = run.probe("repository-supported-typedef-AssetLink");
        let outcome = check_type_def(&probe, &relationship, DiscoverySource::AllTypes).await;
        assert_eq!(outcome.unwrap_err().assertion_id, "relationship-end-2");
    }

    #[tokio::test]
    async fn test_missing_update_audit_is_soft() {
        let mut updated = asset();
        updated.version = 2;
        let collection = InMemoryMetadataCollection::new("mc-1", "cocoMDS1");
        collection.add_type_def(updated.clone()).unwrap();
        let run = run_with(collection);

        let probe = run.probe("repository-supported-typedef-Asset");
        let outcome = check_type_def(&probe, &updated, DiscoverySource::AllTypes).await;
        assert!(outcome.is_ok());
        assert_eq!(probe.finish(outcome), TestCaseStatus::Failed);
    }

    #[tokio::test]
    async fn test_shared_name_relaxes_uniqueness() {
        let collection = InMemoryMetadataCollection::new("mc-1", "cocoMDS1");
        let string_entity = TypeDef::new("g-string-entity", "string", TypeDefKind::Entity);
        let string = AttributeTypeDef::primitive("p-string", PrimitiveKind::String);
        collection.add_type_def(string_entity.clone()).unwrap();
        collection.add_attribute_type_def(string.clone()).unwrap();
        let run = run_with(collection);
        run.rest_attribute_type_defs().record(&string);

        let probe = run.probe("repository-supported-typedef-string");
        let outcome = check_type_def(&probe, &string_entity, DiscoverySource::AllTypes).await;
        assert_eq!(probe.finish(outcome), TestCaseStatus::Passed);
    }

    #[tokio::test]
    async fn test_collection_argument_mismatch_aborts() {
        let map = AttributeTypeDef::new(
            "c-map",
            "map<string,string>",
            AttributeTypeDefKind::Collection {
                collection_def_category: Some(CollectionKind::Map),
                argument_count: 2,
                argument_types: vec![PrimitiveKind::String],
            },
        );
        let run = run_with(InMemoryMetadataCollection::new("mc-1", "cocoMDS1"));

        let probe = run.probe("repository-supported-attribute-typedef-map");
        let outcome =
            check_attribute_type_def(&probe, &map, DiscoverySource::AllTypes).await;
        assert_eq!(outcome.unwrap_err().assertion_id, "collection-argument-types");
    }

    #[tokio::test]
    async fn test_supported_attribute_type_def_passes() {
        let string = AttributeTypeDef::primitive("p-string", PrimitiveKind::String);
        let collection = InMemoryMetadataCollection::new("mc-1", "cocoMDS1");
        collection.add_attribute_type_def(string.clone()).unwrap();
        let run = run_with(collection);

        let probe = run.probe("repository-supported-attribute-typedef-string");
        let outcome =
            check_attribute_type_def(&probe, &string, DiscoverySource::CategoryEnumeration).await;
        assert_eq!(probe.finish(outcome), TestCaseStatus::Passed);

        let category = run.recorder().properties_named("category");
        assert_eq!(
            category[0].value,
            PropertyValue::Text("PRIMITIVE<STRING>".into())
        );
    }
}
