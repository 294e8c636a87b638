//! Categorical completeness probes
//!
//! Each category is enumerated on its own. Together the categories must
//! partition the unfiltered enumeration: every definition in exactly one
//! category, with the category sizes summing to the total.

use crate::context::{ProbeContext, ProbeResult, TypeRegistry};
use crate::profile::Requirement;
use metadata_collection::{
    AttributeTypeDef, AttributeTypeDefCategory, Definition, TypeDef, TypeDefCategory,
    TypeDefGallery,
};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use tracing::{info, warn};

/// Definitions found per category, keyed by name
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCensus<C: Ord> {
    pub members: BTreeMap<C, BTreeMap<String, u64>>,
    pub duplicates: Vec<String>,
}

impl<C: Ord> Default for CategoryCensus<C> {
    fn default() -> Self {
        Self {
            members: BTreeMap::new(),
            duplicates: Vec::new(),
        }
    }
}

impl<C: Ord> CategoryCensus<C> {
    /// Number of distinct names in one category
    pub fn count(&self, category: &C) -> usize {
        self.members.get(category).map_or(0, BTreeMap::len)
    }

    /// Sum of the category sizes
    pub fn total(&self) -> usize {
        self.members.values().map(BTreeMap::len).sum()
    }
}

/// Enumerate each TypeDef category and check it against the gallery
pub async fn check_type_def_categories(
    probe: &ProbeContext<'_>,
    gallery: &TypeDefGallery,
) -> ProbeResult<CategoryCensus<TypeDefCategory>> {
    let collection = probe.collection();
    let user_id = probe.user_id();
    census(
        probe,
        TypeDefCategory::ALL,
        "find_type_defs_by_category",
        gallery.type_defs.len(),
        |category| collection.find_type_defs_by_category(user_id, category),
        TypeDef::category,
        probe.run().rest_type_defs(),
    )
    .await
}

/// Enumerate each AttributeTypeDef category and check it against the gallery
pub async fn check_attribute_type_def_categories(
    probe: &ProbeContext<'_>,
    gallery: &TypeDefGallery,
) -> ProbeResult<CategoryCensus<AttributeTypeDefCategory>> {
    let collection = probe.collection();
    let user_id = probe.user_id();
    census(
        probe,
        AttributeTypeDefCategory::ALL,
        "find_attribute_type_defs_by_category",
        gallery.attribute_type_defs.len(),
        |category| collection.find_attribute_type_defs_by_category(user_id, category),
        AttributeTypeDef::category,
        probe.run().rest_attribute_type_defs(),
    )
    .await
}

async fn census<C, D, F, Fut>(
    probe: &ProbeContext<'_>,
    categories: [C; 3],
    operation: &'static str,
    expected_total: usize,
    fetch: F,
    category_of: fn(&D) -> Option<C>,
    registry: &TypeRegistry<D>,
) -> ProbeResult<CategoryCensus<C>>
where
    C: Copy + Ord + Display,
    D: Definition,
    F: Fn(C) -> Fut,
    Fut: Future<Output = metadata_collection::Result<Option<Vec<D>>>>,
{
    let mut census = CategoryCensus::default();
    let mut seen: BTreeMap<String, C> = BTreeMap::new();

    for category in categories {
        let (found, timing) = probe
            .call(
                &format!("enumerate-{}", category.to_string().to_lowercase()),
                Requirement::CategoryEnumeration,
                operation,
                fetch(category),
            )
            .await?;

        let members = census.members.entry(category).or_default();
        let found = found.unwrap_or_default();

        for definition in &found {
            let name = definition.name().unwrap_or_default().to_string();

            probe.verify_timed(
                category_of(definition) == Some(category),
                "category-match",
                format!(
                    "{} returned by the {} enumeration is categorized as {}",
                    name,
                    category,
                    definition.category_label()
                ),
                Requirement::CategoryEnumeration,
                &timing,
            );

            if let Some(previous) = seen.get(&name).copied().filter(|c| *c != category) {
                probe.verify(
                    false,
                    "category-disjoint",
                    format!("{} is enumerated as both {} and {}", name, previous, category),
                    Requirement::CategoryEnumeration,
                );
            }
            seen.entry(name.clone()).or_insert(category);

            if members.insert(name.clone(), definition.version()).is_some() {
                warn!(name = %name, category = %category, "Duplicate name in category enumeration");
                census.duplicates.push(name);
            }
            registry.record(definition);
        }

        let names: Vec<String> = members.keys().cloned().collect();
        probe.record_property(
            Requirement::CategoryEnumeration,
            format!("{}-count", category),
            names.len(),
        );
        probe.record_property(
            Requirement::CategoryEnumeration,
            format!("supported-{}-names", category.to_string().to_lowercase()),
            names,
        );
    }

    if !census.duplicates.is_empty() {
        probe.record_property(
            Requirement::CategoryEnumeration,
            "duplicate-names",
            census.duplicates.clone(),
        );
    }

    let total = census.total();
    probe.assert(
        total == expected_total,
        "category-partition-complete",
        format!(
            "Category enumerations found {} definitions; the unfiltered enumeration found {}",
            total, expected_total
        ),
        Requirement::CategoryEnumeration,
    )?;

    info!(
        test_case = %probe.test_case_id(),
        total,
        "Category enumeration complete"
    );
    Ok(census)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::context::RunContext;
    use crate::evidence::{PropertyValue, TestCaseStatus};
    use metadata_collection::{
        InMemoryMetadataCollection, MetadataCollection, PrimitiveKind, TypeDefKind, TypeDefLink,
    };
    use std::sync::Arc;

    fn collection() -> InMemoryMetadataCollection {
        let collection = InMemoryMetadataCollection::new("mc-1", "cocoMDS1");
        collection
            .add_type_def(TypeDef::new("g-asset", "Asset", TypeDefKind::Entity))
            .unwrap();
        collection
            .add_type_def(TypeDef::new(
                "g-lineage",
                "LineageMapping",
                TypeDefKind::Relationship {
                    end_def1: None,
                    end_def2: None,
                    propagation_rule: None,
                },
            ))
            .unwrap();
        collection
            .add_attribute_type_def(AttributeTypeDef::primitive("p-string", PrimitiveKind::String))
            .unwrap();
        collection
    }

    #[tokio::test]
    async fn test_missing_category_counts_zero() {
        let collection = Arc::new(collection());
        let gallery = collection.get_all_types("user").await.unwrap().unwrap();
        let run = RunContext::new(RunConfig::new("cocoMDS1", "mc-1"), collection);

        let probe = run.probe("repository-typedef-categories");
        let census = check_type_def_categories(&probe, &gallery).await.unwrap();
        assert_eq!(probe.finish(Ok(())), TestCaseStatus::Passed);

        assert_eq!(census.count(&TypeDefCategory::Classification), 0);
        assert_eq!(census.total(), 2);
        assert_eq!(run.recorder().failure_count(), 0);
        assert_eq!(run.rest_type_defs().len(), 2);

        let counts = run.recorder().properties_named("CLASSIFICATION-count");
        assert_eq!(counts[0].value, PropertyValue::Integer(0));
    }

    #[tokio::test]
    async fn test_partition_shortfall_aborts() {
        let collection = Arc::new(collection());
        let mut gallery = collection.get_all_types("user").await.unwrap().unwrap();
        gallery.type_defs.push(TypeDef::new(
            "g-memento",
            "Memento",
            TypeDefKind::Classification {
                valid_entity_defs: vec![TypeDefLink::new("g-asset", "Asset")],
                propagatable: false,
            },
        ));
        let run = RunContext::new(RunConfig::new("cocoMDS1", "mc-1"), collection);

        let probe = run.probe("repository-typedef-categories");
        let outcome = check_type_def_categories(&probe, &gallery).await.map(|_| ());
        assert_eq!(probe.finish(outcome), TestCaseStatus::Aborted);

        let records = run.recorder().records();
        let partition = records
            .iter()
            .find(|r| r.assertion_id == "category-partition-complete")
            .unwrap();
        assert!(!partition.passed);
    }

    #[tokio::test]
    async fn test_attribute_categories() {
        let collection = Arc::new(collection());
        let gallery = collection.get_all_types("user").await.unwrap().unwrap();
        let run = RunContext::new(RunConfig::new("cocoMDS1", "mc-1"), collection);

        let probe = run.probe("repository-attribute-typedef-categories");
        let census = check_attribute_type_def_categories(&probe, &gallery)
            .await
            .unwrap();
        assert_eq!(census.count(&AttributeTypeDefCategory::Primitive), 1);
        assert!(run.rest_attribute_type_defs().contains("string"));
    }
}
