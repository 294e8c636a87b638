//! External standard mapping probe
//!
//! Each mapping is filed under exactly one dimension, chosen by the first
//! populated field in the order standard name, organization, type
//! identifier. A mapping that populates more than one field is therefore
//! only counted under its first one; such mappings are flagged in the report.

use crate::context::{ProbeContext, ProbeResult};
use crate::profile::Requirement;
use metadata_collection::{ExternalStandardMapping, TypeDef};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Query dimension of `find_types_by_external_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MappingDimension {
    Standard,
    Organization,
    Identifier,
}

impl MappingDimension {
    pub fn label(&self) -> &'static str {
        match self {
            MappingDimension::Standard => "standard",
            MappingDimension::Organization => "organization",
            MappingDimension::Identifier => "identifier",
        }
    }
}

/// Bucket a mapping by its first populated field
pub fn classify(mapping: &ExternalStandardMapping) -> Option<(MappingDimension, &str)> {
    fn present(field: &Option<String>) -> Option<&str> {
        field.as_deref().filter(|value| !value.is_empty())
    }

    if let Some(standard) = present(&mapping.standard_name) {
        Some((MappingDimension::Standard, standard))
    } else if let Some(organization) = present(&mapping.standard_organization) {
        Some((MappingDimension::Organization, organization))
    } else {
        present(&mapping.standard_type_name).map(|id| (MappingDimension::Identifier, id))
    }
}

/// A mapping filed under one dimension while populating others
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousMapping {
    pub type_def_name: String,
    pub dimension: MappingDimension,
    pub key: String,
    pub populated_fields: usize,
}

impl std::fmt::Display for AmbiguousMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: mapping with {} populated fields counted only under {} '{}'",
            self.type_def_name,
            self.populated_fields,
            self.dimension.label(),
            self.key
        )
    }
}

/// Expected outcome of the external id queries for a set of TypeDefs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingCensus {
    /// Distinct TypeDef guids per bucket
    pub buckets: BTreeMap<(MappingDimension, String), BTreeSet<String>>,
    /// Number of TypeDefs carrying at least one mapping
    pub mapped_type_defs: usize,
    pub ambiguous: Vec<AmbiguousMapping>,
}

impl MappingCensus {
    pub fn expected_count(&self, dimension: MappingDimension, key: &str) -> usize {
        self.buckets
            .get(&(dimension, key.to_string()))
            .map_or(0, BTreeSet::len)
    }
}

/// Derive the expected buckets from the full TypeDef set
pub fn survey(type_defs: &[TypeDef]) -> MappingCensus {
    let mut census = MappingCensus::default();

    for type_def in type_defs {
        let name = type_def.name.clone().unwrap_or_default();
        let guid = type_def.guid.clone().unwrap_or_else(|| name.clone());

        if type_def.has_external_mappings() {
            census.mapped_type_defs += 1;
        }

        for mapping in type_def.all_external_mappings() {
            let Some((dimension, key)) = classify(mapping) else {
                continue;
            };

            if mapping.populated_fields() > 1 {
                census.ambiguous.push(AmbiguousMapping {
                    type_def_name: name.clone(),
                    dimension,
                    key: key.to_string(),
                    populated_fields: mapping.populated_fields(),
                });
            }

            census
                .buckets
                .entry((dimension, key.to_string()))
                .or_default()
                .insert(guid.clone());
        }
    }

    census
}

/// Check `find_types_by_external_id` for every bucket the TypeDefs imply
pub async fn check_external_mappings(
    probe: &ProbeContext<'_>,
    type_defs: &[TypeDef],
) -> ProbeResult<MappingCensus> {
    let census = survey(type_defs);
    let recorder = probe.run().recorder();

    for ambiguous in &census.ambiguous {
        warn!(
            type_def = %ambiguous.type_def_name,
            dimension = ambiguous.dimension.label(),
            key = %ambiguous.key,
            "External standard mapping populates more than one field"
        );
        recorder.flag(ambiguous.to_string());
    }
    if !census.ambiguous.is_empty() {
        probe.record_property(
            Requirement::ExternalStandardMapping,
            "ambiguous-mappings",
            census
                .ambiguous
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
        );
    }

    for ((dimension, key), guids) in &census.buckets {
        let (standard, organization, identifier) = match dimension {
            MappingDimension::Standard => (Some(key.as_str()), None, None),
            MappingDimension::Organization => (None, Some(key.as_str()), None),
            MappingDimension::Identifier => (None, None, Some(key.as_str())),
        };

        let (found, timing) = probe
            .call(
                "find-by-external-id",
                Requirement::ExternalStandardMapping,
                "find_types_by_external_id",
                probe.collection().find_types_by_external_id(
                    probe.user_id(),
                    standard,
                    organization,
                    identifier,
                ),
            )
            .await?;

        let found = found.map_or(0, |type_defs| type_defs.len());
        probe.verify_timed(
            found == guids.len(),
            "external-id-count",
            format!(
                "Search by {} '{}' returned {} TypeDefs; {} carry that mapping",
                dimension.label(),
                key,
                found,
                guids.len()
            ),
            Requirement::ExternalStandardMapping,
            &timing,
        );
    }

    probe.record_property(
        Requirement::ExternalStandardMapping,
        "mapped-typedef-count",
        census.mapped_type_defs,
    );

    info!(
        buckets = census.buckets.len(),
        mapped = census.mapped_type_defs,
        ambiguous = census.ambiguous.len(),
        "External standard mapping check complete"
    );
    Ok(census)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::context::RunContext;
    use metadata_collection::{InMemoryMetadataCollection, TypeDefAttribute, TypeDefKind};
    use std::sync::Arc;

    fn mapping(
        standard: Option<&str>,
        organization: Option<&str>,
        identifier: Option<&str>,
    ) -> ExternalStandardMapping {
        ExternalStandardMapping {
            standard_name: standard.map(Into::into),
            standard_organization: organization.map(Into::into),
            standard_type_name: identifier.map(Into::into),
        }
    }

    #[test]
    fn test_classify_precedence() {
        assert_eq!(
            classify(&mapping(Some("DCAT"), Some("W3C"), None)),
            Some((MappingDimension::Standard, "DCAT"))
        );
        assert_eq!(
            classify(&mapping(None, Some("W3C"), Some("Dataset"))),
            Some((MappingDimension::Organization, "W3C"))
        );
        assert_eq!(
            classify(&mapping(None, None, Some("Dataset"))),
            Some((MappingDimension::Identifier, "Dataset"))
        );
        assert_eq!(classify(&mapping(None, None, None)), None);
    }

    #[test]
    fn test_survey_counts_type_defs_once_per_bucket() {
        let mut asset = TypeDef::new("g-asset", "Asset", TypeDefKind::Entity);
        asset.external_standard_mappings.push(mapping(Some("DCAT"), None, None));
        let mut attribute = TypeDefAttribute::new("qualifiedName", "string");
        attribute
            .external_standard_mappings
            .push(mapping(Some("DCAT"), None, None));
        asset.property_defs.push(attribute);

        let mut dataset = TypeDef::new("g-dataset", "DataSet", TypeDefKind::Entity);
        dataset
            .external_standard_mappings
            .push(mapping(None, Some("W3C"), Some("Dataset")));

        let plain = TypeDef::new("g-plain", "Plain", TypeDefKind::Entity);

        let census = survey(&[asset, dataset, plain]);
        assert_eq!(census.expected_count(MappingDimension::Standard, "DCAT"), 1);
        assert_eq!(census.expected_count(MappingDimension::Organization, "W3C"), 1);
        assert_eq!(census.expected_count(MappingDimension::Identifier, "Dataset"), 0);
        assert_eq!(census.mapped_type_defs, 2);
        assert_eq!(census.ambiguous.len(), 1);
        assert_eq!(census.ambiguous[0].type_def_name, "DataSet");
    }

    #[test]
    fn test_blank_field_does_not_make_mapping_ambiguous() {
        let mut dataset = TypeDef::new("g-dataset", "DataSet", TypeDefKind::Entity);
        dataset
            .external_standard_mappings
            .push(mapping(Some(""), Some("W3C"), None));

        let census = survey(&[dataset]);
        assert!(census.ambiguous.is_empty());
        assert_eq!(census.expected_count(MappingDimension::Organization, "W3C"), 1);
        assert_eq!(census.expected_count(MappingDimension::Standard, ""), 0);
    }

    #[tokio::test]
    async fn test_ambiguous_mapping_flagged_not_failed() {
        let collection = InMemoryMetadataCollection::new("mc-1", "cocoMDS1");
        let mut dataset = TypeDef::new("g-dataset", "DataSet", TypeDefKind::Entity);
        dataset
            .external_standard_mappings
            .push(mapping(None, Some("W3C"), Some("Dataset")));
        collection.add_type_def(dataset.clone()).unwrap();

        let run = RunContext::new(RunConfig::new("cocoMDS1", "mc-1"), Arc::new(collection));
        let probe = run.probe("repository-typedefs-by-external-id");
        check_external_mappings(&probe, &[dataset]).await.unwrap();

        assert_eq!(run.recorder().failure_count(), 0);
        assert_eq!(run.recorder().flags().len(), 1);
        assert_eq!(
            run.recorder().properties_named("ambiguous-mappings").len(),
            1
        );
    }
}
