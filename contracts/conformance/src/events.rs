//! Validation of inbound type definition events
//!
//! An event is checked in stages: envelope, origin, payload. A missing
//! originator ends validation after the envelope stage. Events from other
//! cohort members pass the envelope stage and are then ignored.

use crate::context::{ProbeContext, ProbeResult};
use crate::profile::Requirement;
use metadata_collection::{AttributeTypeDef, TypeDef, TypeDefEvent, TypeDefEventKind, TypeDefPatch};
use tracing::debug;

/// An origin-matched event whose payload has the expected shape
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEvent {
    pub kind: Option<TypeDefEventKind>,
    pub metadata_collection_id: String,
    pub server_name: Option<String>,
    pub type_def: Option<TypeDef>,
    pub attribute_type_def: Option<AttributeTypeDef>,
    pub type_def_patch: Option<TypeDefPatch>,
}

impl ValidatedEvent {
    pub fn is_deletion(&self) -> bool {
        self.kind.is_some_and(|kind| kind.is_deletion())
    }
}

/// Where validation of one event ended
#[derive(Debug, Clone, PartialEq)]
pub enum EventDisposition {
    /// Sent by another cohort member
    Ignored,
    /// No originator, so the payload could not be attributed
    Incomplete,
    Validated(ValidatedEvent),
}

/// Validate one event; `None` stands for a null event
pub fn validate_event(
    probe: &ProbeContext<'_>,
    event: Option<&TypeDefEvent>,
) -> ProbeResult<EventDisposition> {
    let event = probe.require(
        event,
        "event-present",
        "Event is present",
        Requirement::EventEnvelope,
    )?;

    probe.verify(
        event.timestamp.is_some(),
        "event-timestamp",
        "Event carries a timestamp",
        Requirement::EventEnvelope,
    );
    let kind_label = event.kind.map_or("<none>", |kind| kind.label());
    probe.verify(
        event
            .kind
            .is_some_and(|kind| kind != TypeDefEventKind::Unknown),
        "event-kind",
        format!("Event kind {} is known", kind_label),
        Requirement::EventEnvelope,
    );
    let has_originator = probe.verify(
        event.originator.is_some(),
        "event-originator",
        "Event carries an originator",
        Requirement::EventEnvelope,
    );
    let Some(originator) = event.originator.as_ref().filter(|_| has_originator) else {
        return Ok(EventDisposition::Incomplete);
    };

    let config = probe.run().config();
    if originator.metadata_collection_id.as_deref()
        != Some(config.tut_metadata_collection_id.as_str())
    {
        debug!(
            test_case = %probe.test_case_id(),
            origin = ?originator.metadata_collection_id,
            "Ignoring event from another cohort member"
        );
        return Ok(EventDisposition::Ignored);
    }

    let server_name = originator.server_name.as_deref();
    probe.verify(
        server_name == Some(config.tut_server_name.as_str()),
        "event-server-name",
        format!(
            "Event originator server {:?} matches {}",
            server_name, config.tut_server_name
        ),
        Requirement::EventOrigin,
    );

    check_payload(probe, event, kind_label)?;

    if let Some(type_def) = &event.type_def {
        probe.run().event_type_defs().record(type_def);
    }
    if let Some(attribute_type_def) = &event.attribute_type_def {
        probe.run().event_attribute_type_defs().record(attribute_type_def);
    }

    Ok(EventDisposition::Validated(ValidatedEvent {
        kind: event.kind,
        metadata_collection_id: config.tut_metadata_collection_id.clone(),
        server_name: originator.server_name.clone(),
        type_def: event.type_def.clone(),
        attribute_type_def: event.attribute_type_def.clone(),
        type_def_patch: event.type_def_patch.clone(),
    }))
}

fn check_payload(probe: &ProbeContext<'_>, event: &TypeDefEvent, kind: &str) -> ProbeResult<()> {
    let has_type_def = event.type_def.is_some();
    let has_attribute_type_def = event.attribute_type_def.is_some();

    let Some(event_kind) = event.kind else {
        return Ok(());
    };

    match event_kind {
        TypeDefEventKind::NewTypeDef
        | TypeDefEventKind::DeletedTypeDef
        | TypeDefEventKind::ReIdentifiedTypeDef => {
            probe.assert(
                has_type_def,
                "event-type-def-present",
                format!("{} event carries a TypeDef", kind),
                Requirement::EventPayload,
            )?;
            probe.assert(
                !has_attribute_type_def,
                "event-attribute-type-def-absent",
                format!("{} event carries no AttributeTypeDef", kind),
                Requirement::EventPayload,
            )?;
        }
        TypeDefEventKind::UpdatedTypeDef => {
            probe.assert(
                event.type_def_patch.is_some(),
                "event-patch-present",
                format!("{} event carries a TypeDef patch", kind),
                Requirement::EventPayload,
            )?;
            probe.assert(
                !has_type_def,
                "event-type-def-absent",
                format!("{} event carries no full TypeDef", kind),
                Requirement::EventPayload,
            )?;
            probe.assert(
                !has_attribute_type_def,
                "event-attribute-type-def-absent",
                format!("{} event carries no AttributeTypeDef", kind),
                Requirement::EventPayload,
            )?;
        }
        TypeDefEventKind::NewAttributeTypeDef
        | TypeDefEventKind::DeletedAttributeTypeDef
        | TypeDefEventKind::ReIdentifiedAttributeTypeDef => {
            probe.assert(
                has_attribute_type_def,
                "event-attribute-type-def-present",
                format!("{} event carries an AttributeTypeDef", kind),
                Requirement::EventPayload,
            )?;
            probe.assert(
                !has_type_def,
                "event-type-def-absent",
                format!("{} event carries no TypeDef", kind),
                Requirement::EventPayload,
            )?;
        }
        TypeDefEventKind::Error | TypeDefEventKind::Unknown => {}
    }

    if matches!(
        event_kind,
        TypeDefEventKind::ReIdentifiedTypeDef | TypeDefEventKind::ReIdentifiedAttributeTypeDef
    ) {
        probe.verify(
            event.original_guid.is_some() || event.original_name.is_some(),
            "event-original-identity",
            format!("{} event names the original identity", kind),
            Requirement::EventPayload,
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::context::RunContext;
    use crate::evidence::TestCaseStatus;
    use metadata_collection::{
        EventOriginator, InMemoryMetadataCollection, PrimitiveKind, TypeDefKind,
    };
    use std::sync::Arc;

    fn run() -> RunContext {
        RunContext::new(
            RunConfig::new("cocoMDS1", "mc-1"),
            Arc::new(InMemoryMetadataCollection::new("mc-1", "cocoMDS1")),
        )
    }

    fn tut() -> EventOriginator {
        EventOriginator::new("mc-1", "cocoMDS1")
    }

    fn asset() -> TypeDef {
        TypeDef::new("G1", "Asset", TypeDefKind::Entity)
    }

    #[test]
    fn test_null_event_is_hard_failure() {
        let run = run();
        let probe = run.probe("repository-typedef-event-0001");
        let outcome = validate_event(&probe, None);
        assert_eq!(outcome.clone().unwrap_err().assertion_id, "event-present");
        assert_eq!(probe.finish(outcome.map(|_| ())), TestCaseStatus::Aborted);
    }

    #[test]
    fn test_foreign_event_ignored_after_envelope() {
        let run = run();
        let probe = run.probe("repository-typedef-event-0001");
        let event = TypeDefEvent::type_def(
            TypeDefEventKind::NewTypeDef,
            EventOriginator::new("mc-other", "cocoMDS2"),
            asset(),
        );

        let disposition = validate_event(&probe, Some(&event)).unwrap();
        assert_eq!(disposition, EventDisposition::Ignored);
        let assertions: Vec<String> = run
            .recorder()
            .records()
            .into_iter()
            .map(|record| record.assertion_id)
            .collect();
        assert_eq!(
            assertions,
            ["event-present", "event-timestamp", "event-kind", "event-originator"]
        );
        assert_eq!(run.recorder().failure_count(), 0);
        assert!(run.event_type_defs().is_empty());
    }

    #[test]
    fn test_foreign_event_envelope_defects_recorded() {
        let run = run();
        let probe = run.probe("repository-typedef-event-0001");
        let mut event = TypeDefEvent::type_def(
            TypeDefEventKind::NewTypeDef,
            EventOriginator::new("mc-other", "cocoMDS2"),
            asset(),
        );
        event.timestamp = None;

        let disposition = validate_event(&probe, Some(&event)).unwrap();
        assert_eq!(disposition, EventDisposition::Ignored);
        let timestamp = run
            .recorder()
            .records()
            .into_iter()
            .find(|record| record.assertion_id == "event-timestamp")
            .unwrap();
        assert!(!timestamp.passed);
        assert!(run
            .recorder()
            .records()
            .iter()
            .all(|record| record.assertion_id != "event-server-name"));
    }

    #[test]
    fn test_new_type_def_validated_and_registered() {
        let run = run();
        let probe = run.probe("repository-typedef-event-0001");
        let event = TypeDefEvent::type_def(TypeDefEventKind::NewTypeDef, tut(), asset());

        let disposition = validate_event(&probe, Some(&event)).unwrap();
        let EventDisposition::Validated(validated) = disposition else {
            panic!("expected a validated event");
        };
        assert_eq!(validated.type_def, Some(asset()));
        assert_eq!(validated.metadata_collection_id, "mc-1");
        assert!(run.event_type_defs().contains("Asset"));
        assert_eq!(run.recorder().failure_count(), 0);
    }

    #[test]
    fn test_missing_originator_incomplete() {
        let run = run();
        let probe = run.probe("repository-typedef-event-0001");
        let mut event = TypeDefEvent::type_def(TypeDefEventKind::NewTypeDef, tut(), asset());
        event.originator = None;

        let disposition = validate_event(&probe, Some(&event)).unwrap();
        assert_eq!(disposition, EventDisposition::Incomplete);
        assert_eq!(run.recorder().failure_count(), 1);
        assert!(run.event_type_defs().is_empty());
    }

    #[test]
    fn test_update_with_full_type_def_fails_payload() {
        let run = run();
        let probe = run.probe("repository-typedef-event-0001");
        let mut event = TypeDefEvent::updated(tut(), metadata_collection::TypeDefPatch::for_type_def(&asset()));
        event.type_def = Some(asset());

        let abort = validate_event(&probe, Some(&event)).unwrap_err();
        assert_eq!(abort.assertion_id, "event-type-def-absent");
    }

    #[test]
    fn test_attribute_event_with_type_def_fails_payload() {
        let run = run();
        let probe = run.probe("repository-typedef-event-0001");
        let mut event = TypeDefEvent::attribute_type_def(
            TypeDefEventKind::NewAttributeTypeDef,
            tut(),
            AttributeTypeDef::primitive("p-string", PrimitiveKind::String),
        );
        event.type_def = Some(asset());

        let abort = validate_event(&probe, Some(&event)).unwrap_err();
        assert_eq!(abort.assertion_id, "event-type-def-absent");
    }

    #[test]
    fn test_wrong_server_name_is_soft() {
        let run = run();
        let probe = run.probe("repository-typedef-event-0001");
        let event = TypeDefEvent::type_def(
            TypeDefEventKind::NewTypeDef,
            EventOriginator::new("mc-1", "cocoMDS9"),
            asset(),
        );

        assert!(matches!(
            validate_event(&probe, Some(&event)).unwrap(),
            EventDisposition::Validated(_)
        ));
        assert_eq!(probe.finish(Ok(())), TestCaseStatus::Failed);
    }

    #[test]
    fn test_error_event_needs_no_payload() {
        let run = run();
        let probe = run.probe("repository-typedef-event-0001");
        let event = TypeDefEvent::error(tut(), "conflicting type definitions");
        assert!(validate_event(&probe, Some(&event)).is_ok());
        assert_eq!(run.recorder().failure_count(), 0);
    }
}
