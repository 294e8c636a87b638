//! Conformance test framework

use crate::config::RunConfig;
use crate::context::{ProbeContext, ProbeResult, RunContext};
use crate::error::ConformanceError;
use crate::listener::EventListener;
use crate::probes::{
    check_attribute_type_def, check_attribute_type_def_categories, check_external_mappings,
    check_type_def, check_type_def_categories, DiscoverySource,
};
use crate::profile::Requirement;
use crate::reports::ConformanceReport;
use metadata_collection::{Definition, MetadataCollection, TypeDefEvent, TypeDefGallery};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Conformance test runner
pub struct ConformanceRunner {
    config: RunConfig,
}

impl ConformanceRunner {
    /// Create a new conformance runner
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the query probes against a repository
    pub async fn run(&self, collection: Arc<dyn MetadataCollection>) -> ConformanceReport {
        self.run_with_events(collection, None).await
    }

    /// Run the query probes while validating the repository's event stream
    ///
    /// The stream is drained until it closes or the configured drain timeout
    /// passes after the query probes finish.
    pub async fn run_with_events(
        &self,
        collection: Arc<dyn MetadataCollection>,
        events: Option<UnboundedReceiver<TypeDefEvent>>,
    ) -> ConformanceReport {
        let start = Instant::now();
        let run = Arc::new(RunContext::new(self.config.clone(), collection));

        info!(
            run_id = %run.run_id(),
            server = %self.config.tut_server_name,
            collection = %self.config.tut_metadata_collection_id,
            "Starting conformance run"
        );

        let listener = match events {
            Some(events) if self.config.run_event_probes => {
                Some(tokio::spawn(EventListener::new(run.clone()).listen(events)))
            }
            Some(_) => {
                debug!("Event probes disabled; inbound events are not validated");
                None
            }
            None => None,
        };

        self.run_probes(&run).await;

        if let Some(listener) = listener {
            self.drain(&run, listener).await;
        }

        let report = ConformanceReport::from_run(&run, start.elapsed());
        info!(
            "Conformance run complete: {} passed, {} failed, {} aborted, {} skipped",
            report.summary.passed,
            report.summary.failed,
            report.summary.aborted,
            report.summary.skipped
        );
        report
    }

    async fn run_probes(&self, run: &RunContext) {
        info!("Enumerating all types...");
        let probe = run.probe("repository-all-types");
        let gallery = match enumerate_all_types(&probe).await {
            Ok(gallery) => {
                probe.finish(Ok(()));
                gallery
            }
            Err(abort) => {
                probe.finish(Err(abort));
                warn!("Unfiltered enumeration failed; remaining query probes skipped");
                return;
            }
        };

        if self.config.run_type_def_probes {
            info!("Running TypeDef category probes...");
            let probe = run.probe("repository-typedef-categories");
            let outcome = check_type_def_categories(&probe, &gallery).await;
            probe.finish(outcome.map(|_| ()));

            info!("Running external standard mapping probes...");
            let probe = run.probe("repository-typedefs-by-external-id");
            let outcome = check_external_mappings(&probe, &gallery.type_defs).await;
            probe.finish(outcome.map(|_| ()));
        }

        if self.config.run_attribute_type_def_probes {
            info!("Running AttributeTypeDef category probes...");
            let probe = run.probe("repository-attribute-typedef-categories");
            let outcome = check_attribute_type_def_categories(&probe, &gallery).await;
            probe.finish(outcome.map(|_| ()));
        }

        if self.config.run_type_def_probes {
            let type_defs = with_category_only(&gallery.type_defs, run.rest_type_defs().snapshot());
            info!(count = type_defs.len(), "Running TypeDef compliance probes...");
            for (type_def, source) in &type_defs {
                let probe = run.probe(format!(
                    "repository-supported-typedef-{}",
                    type_def.name.as_deref().unwrap_or("<unnamed>")
                ));
                let outcome = check_type_def(&probe, type_def, *source).await;
                probe.finish(outcome);
            }
        }

        if self.config.run_attribute_type_def_probes {
            let attribute_type_defs = with_category_only(
                &gallery.attribute_type_defs,
                run.rest_attribute_type_defs().snapshot(),
            );
            info!(
                count = attribute_type_defs.len(),
                "Running AttributeTypeDef compliance probes..."
            );
            for (attribute_type_def, source) in &attribute_type_defs {
                let probe = run.probe(format!(
                    "repository-supported-attribute-typedef-{}",
                    attribute_type_def.name.as_deref().unwrap_or("<unnamed>")
                ));
                let outcome = check_attribute_type_def(&probe, attribute_type_def, *source).await;
                probe.finish(outcome);
            }
        }
    }

    async fn drain(&self, run: &RunContext, mut listener: JoinHandle<usize>) {
        let timeout = self.config.event_drain_timeout();
        debug!(timeout_ms = self.config.event_drain_timeout_ms, "Draining event stream");

        match tokio::time::timeout(timeout, &mut listener).await {
            Ok(Ok(processed)) => info!(events = processed, "Event listener finished"),
            Ok(Err(e)) => {
                let error = ConformanceError::Listener(e.to_string());
                warn!(error = %error, "Event listener did not complete");
                run.recorder().flag(error.to_string());
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.event_drain_timeout_ms,
                    "Event stream still open after drain timeout; stopping listener"
                );
                listener.abort();
            }
        }
    }
}

/// Unfiltered enumeration, recorded into the query-side registries
async fn enumerate_all_types(probe: &ProbeContext<'_>) -> ProbeResult<TypeDefGallery> {
    let (gallery, timing) = probe
        .call(
            "all-types",
            Requirement::AllTypesEnumeration,
            "get_all_types",
            probe.collection().get_all_types(probe.user_id()),
        )
        .await?;
    let gallery = probe.require_timed(
        gallery,
        "all-types-present",
        "Repository returns its supported types",
        Requirement::AllTypesEnumeration,
        &timing,
    )?;

    probe.verify(
        all_distinct(gallery.type_defs.iter().map(Definition::name))
            && all_distinct(gallery.attribute_type_defs.iter().map(Definition::name)),
        "unique-names",
        "Every type name is used by only one definition of its family",
        Requirement::TypeDefIdentity,
    );
    probe.verify(
        all_distinct(
            gallery
                .type_defs
                .iter()
                .map(Definition::guid)
                .chain(gallery.attribute_type_defs.iter().map(Definition::guid)),
        ),
        "unique-guids",
        "Every type GUID is used by only one definition",
        Requirement::TypeDefIdentity,
    );

    probe.record_property(
        Requirement::AllTypesEnumeration,
        "typedef-count",
        gallery.type_defs.len(),
    );
    probe.record_property(
        Requirement::AllTypesEnumeration,
        "attribute-typedef-count",
        gallery.attribute_type_defs.len(),
    );

    let run = probe.run();
    for type_def in &gallery.type_defs {
        run.rest_type_defs().record(type_def);
    }
    for attribute_type_def in &gallery.attribute_type_defs {
        run.rest_attribute_type_defs().record(attribute_type_def);
    }

    Ok(gallery)
}

fn all_distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> bool {
    let mut seen = BTreeSet::new();
    values.flatten().all(|value| seen.insert(value))
}

/// Gallery definitions followed by those only a category enumeration found
fn with_category_only<D: Definition>(
    gallery: &[D],
    registry: Vec<D>,
) -> Vec<(D, DiscoverySource)> {
    let listed: BTreeSet<&str> = gallery.iter().filter_map(Definition::name).collect();
    let category_only: Vec<D> = registry
        .into_iter()
        .filter(|definition| {
            definition
                .name()
                .is_some_and(|name| !listed.contains(name))
        })
        .collect();

    gallery
        .iter()
        .cloned()
        .map(|definition| (definition, DiscoverySource::AllTypes))
        .chain(
            category_only
                .into_iter()
                .map(|definition| (definition, DiscoverySource::CategoryEnumeration)),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metadata_collection::{InMemoryMetadataCollection, TypeDef, TypeDefKind};

    #[test]
    fn test_all_distinct() {
        assert!(all_distinct([Some("a"), Some("b"), None, None].into_iter()));
        assert!(!all_distinct([Some("a"), Some("a")].into_iter()));
    }

    #[test]
    fn test_category_only_definitions_appended() {
        let asset = TypeDef::new("G1", "Asset", TypeDefKind::Entity);
        let process = TypeDef::new("G2", "Process", TypeDefKind::Entity);

        let combined = with_category_only(
            std::slice::from_ref(&asset),
            vec![asset.clone(), process.clone()],
        );
        assert_eq!(
            combined,
            vec![
                (asset, DiscoverySource::AllTypes),
                (process, DiscoverySource::CategoryEnumeration)
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_repository_aborts_enumeration() {
        let runner = ConformanceRunner::new(RunConfig::new("cocoMDS1", "mc-1"));
        let report = runner
            .run(Arc::new(InMemoryMetadataCollection::new("mc-1", "cocoMDS1")))
            .await;

        assert!(!report.is_conformant());
        assert_eq!(report.summary.total, 1);
        assert_eq!(report.failures()[0].assertion_id, "all-types-present");
    }

    #[tokio::test]
    async fn test_disabled_groups_not_run() {
        let collection = InMemoryMetadataCollection::new("mc-1", "cocoMDS1");
        collection
            .add_type_def(TypeDef::new("G1", "Asset", TypeDefKind::Entity))
            .unwrap();

        let mut config = RunConfig::new("cocoMDS1", "mc-1");
        config.run_type_def_probes = false;
        config.run_attribute_type_def_probes = false;
        let report = ConformanceRunner::new(config).run(Arc::new(collection)).await;

        assert!(report.is_conformant());
        assert_eq!(report.summary.total, 1);
        assert!(report.test_case("repository-all-types").is_some());
    }
}
