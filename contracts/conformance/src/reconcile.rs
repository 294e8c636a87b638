//! Reconciliation of event-carried definitions with the query path
//!
//! Events and queries are not ordered relative to each other. A definition
//! may not be queryable yet when its event arrives, and a TypeDef may have
//! moved on to a newer version by the time it is queried.

use crate::consistency::{assert_consistent, describe, Consistency};
use crate::context::{ProbeAbort, ProbeContext, ProbeResult};
use crate::profile::Requirement;
use metadata_collection::{AttributeTypeDef, Definition, TypeDef};
use std::future::Future;
use tracing::debug;

/// Outcome of re-fetching an event-carried definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Consistent,
    VersionSkew { event_version: u64, retrieved_version: u64 },
    /// The repository does not return the definition yet
    NotYetVisible,
}

pub async fn reconcile_type_def(
    probe: &ProbeContext<'_>,
    type_def: &TypeDef,
) -> ProbeResult<Reconciliation> {
    let guid = event_guid(probe, type_def)?;
    let fetch = probe.collection().get_type_def_by_guid(probe.user_id(), guid);
    reconcile(probe, type_def, "get_type_def_by_guid", fetch).await
}

pub async fn reconcile_attribute_type_def(
    probe: &ProbeContext<'_>,
    attribute_type_def: &AttributeTypeDef,
) -> ProbeResult<Reconciliation> {
    let guid = event_guid(probe, attribute_type_def)?;
    let fetch = probe
        .collection()
        .get_attribute_type_def_by_guid(probe.user_id(), guid);
    reconcile(probe, attribute_type_def, "get_attribute_type_def_by_guid", fetch).await
}

fn event_guid<'d, D: Definition>(
    probe: &ProbeContext<'_>,
    definition: &'d D,
) -> ProbeResult<&'d str> {
    probe.require(
        definition.guid().filter(|guid| !guid.is_empty()),
        "event-definition-guid",
        format!(
            "Event-carried definition {} has a GUID",
            definition.name().unwrap_or("<unnamed>")
        ),
        Requirement::EventConsistency,
    )
}

async fn reconcile<D, F>(
    probe: &ProbeContext<'_>,
    definition: &D,
    operation: &'static str,
    fetch: F,
) -> ProbeResult<Reconciliation>
where
    D: Definition,
    F: Future<Output = metadata_collection::Result<Option<D>>>,
{
    let (retrieved, timing) = probe
        .call("event-refetch", Requirement::EventConsistency, operation, fetch)
        .await?;
    probe.record_property(
        Requirement::TypeRetrievalLatency,
        "event-refetch-ms",
        timing.elapsed_ms(),
    );

    let Some(retrieved) = retrieved else {
        debug!(
            test_case = %probe.test_case_id(),
            definition = %describe(definition),
            "Event-carried definition not yet visible through queries"
        );
        probe.record_property(
            Requirement::EventConsistency,
            "not-yet-visible",
            describe(definition),
        );
        return Ok(Reconciliation::NotYetVisible);
    };

    let consistency = assert_consistent(
        probe,
        "event-consistent",
        definition,
        &retrieved,
        Requirement::EventConsistency,
        &timing,
    )?;

    match consistency {
        Consistency::Identical => Ok(Reconciliation::Consistent),
        Consistency::VersionSkew {
            expected,
            retrieved,
        } => {
            probe.record_property(
                Requirement::EventConsistency,
                "version-skew",
                format!("event v{} / retrieved v{}", expected, retrieved),
            );
            Ok(Reconciliation::VersionSkew {
                event_version: expected,
                retrieved_version: retrieved,
            })
        }
        // assert_consistent has already recorded this as a failed assertion
        Consistency::Divergent => Err(ProbeAbort {
            assertion_id: "event-consistent".to_string(),
            message: format!("{} diverges from its event", describe(definition)),
        }),
    }
}
