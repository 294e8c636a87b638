//! Event listener task
//!
//! Every inbound event is its own test case, so a malformed event never
//! prevents later events from being checked.

use crate::context::{ProbeContext, ProbeResult, RunContext};
use crate::events::{validate_event, EventDisposition, ValidatedEvent};
use crate::evidence::TestCaseStatus;
use crate::profile::Requirement;
use crate::reconcile::{reconcile_attribute_type_def, reconcile_type_def};
use metadata_collection::TypeDefEvent;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

/// Validates and reconciles inbound type definition events
#[derive(Clone)]
pub struct EventListener {
    run: Arc<RunContext>,
}

impl EventListener {
    pub fn new(run: Arc<RunContext>) -> Self {
        Self { run }
    }

    /// Check one event; `None` stands for a null event
    pub async fn process(&self, event: Option<TypeDefEvent>) -> TestCaseStatus {
        let probe = self.open_test_case();
        match self.evaluate(&probe, event.as_ref()).await {
            Ok(EventDisposition::Ignored) => probe.skip("event from another cohort member"),
            Ok(_) => probe.finish(Ok(())),
            Err(abort) => probe.finish(Err(abort)),
        }
    }

    /// Check one event received as JSON text
    pub async fn process_json(&self, json: &str) -> TestCaseStatus {
        match TypeDefEvent::from_json(json) {
            Ok(event) => self.process(event).await,
            Err(e) => {
                let probe = self.open_test_case();
                let abort = probe.fail(
                    "event-parse",
                    format!("Event could not be parsed: {}", e),
                    Requirement::EventEnvelope,
                );
                probe.finish(Err(abort))
            }
        }
    }

    /// Consume events until the channel closes; returns the number processed
    pub async fn listen(self, mut events: UnboundedReceiver<TypeDefEvent>) -> usize {
        info!(run_id = %self.run.run_id(), "Event listener started");
        let mut processed = 0;
        while let Some(event) = events.recv().await {
            self.process(Some(event)).await;
            processed += 1;
        }
        info!(events = processed, "Event stream closed");
        processed
    }

    fn open_test_case(&self) -> ProbeContext<'_> {
        let sequence = self.run.next_event_sequence();
        self.run
            .probe(format!("repository-typedef-event-{:04}", sequence))
    }

    async fn evaluate(
        &self,
        probe: &ProbeContext<'_>,
        event: Option<&TypeDefEvent>,
    ) -> ProbeResult<EventDisposition> {
        let disposition = validate_event(probe, event)?;
        if let EventDisposition::Validated(validated) = &disposition {
            self.reconcile(probe, validated).await?;
        }
        Ok(disposition)
    }

    async fn reconcile(&self, probe: &ProbeContext<'_>, event: &ValidatedEvent) -> ProbeResult<()> {
        if event.is_deletion() {
            debug!(
                test_case = %probe.test_case_id(),
                "Deleted definition is not expected to be retrievable; not reconciled"
            );
            return Ok(());
        }

        if let Some(type_def) = &event.type_def {
            let outcome = reconcile_type_def(probe, type_def).await?;
            debug!(test_case = %probe.test_case_id(), outcome = ?outcome, "TypeDef reconciled");
        }
        if let Some(attribute_type_def) = &event.attribute_type_def {
            let outcome = reconcile_attribute_type_def(probe, attribute_type_def).await?;
            debug!(test_case = %probe.test_case_id(), outcome = ?outcome, "AttributeTypeDef reconciled");
        }
        Ok(())
    }
}
