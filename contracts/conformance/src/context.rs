//! Shared run state and the probe capability object
//!
//! A [`RunContext`] is created once per conformance run and shared by `Arc`
//! between the probing task and the event listener. Each test case borrows it
//! through a [`ProbeContext`], which is the only way probes record evidence.

use crate::config::RunConfig;
use crate::evidence::{
    DiscoveredProperty, EvidenceRecord, EvidenceRecorder, PropertyValue, Severity,
    TestCaseOutcome, TestCaseStatus,
};
use crate::profile::Requirement;
use chrono::{DateTime, Utc};
use metadata_collection::{AttributeTypeDef, Definition, MetadataCollection, TypeDef};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Definitions observed through one channel, keyed by name
///
/// Entries are only ever added or replaced by a strictly newer version of the
/// same name; nothing is removed for the lifetime of the run.
#[derive(Debug)]
pub struct TypeRegistry<D: Definition> {
    entries: RwLock<BTreeMap<String, D>>,
}

impl<D: Definition> Default for TypeRegistry<D> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<D: Definition> TypeRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a definition; returns true if the registry changed
    pub fn record(&self, definition: &D) -> bool {
        let Some(name) = definition.name() else {
            return false;
        };

        let mut entries = self.entries.write();
        match entries.get(name) {
            Some(known) if known.version() >= definition.version() => false,
            _ => {
                entries.insert(name.to_string(), definition.clone());
                true
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<D> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<D> {
        self.entries.read().values().cloned().collect()
    }
}

/// State shared by every probe of one conformance run
pub struct RunContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    config: RunConfig,
    collection: Arc<dyn MetadataCollection>,
    recorder: EvidenceRecorder,
    rest_type_defs: TypeRegistry<TypeDef>,
    rest_attribute_type_defs: TypeRegistry<AttributeTypeDef>,
    event_type_defs: TypeRegistry<TypeDef>,
    event_attribute_type_defs: TypeRegistry<AttributeTypeDef>,
    event_sequence: AtomicU64,
}

impl RunContext {
    pub fn new(config: RunConfig, collection: Arc<dyn MetadataCollection>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            collection,
            recorder: EvidenceRecorder::new(),
            rest_type_defs: TypeRegistry::new(),
            rest_attribute_type_defs: TypeRegistry::new(),
            event_type_defs: TypeRegistry::new(),
            event_attribute_type_defs: TypeRegistry::new(),
            event_sequence: AtomicU64::new(0),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn collection(&self) -> &dyn MetadataCollection {
        self.collection.as_ref()
    }

    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    pub fn recorder(&self) -> &EvidenceRecorder {
        &self.recorder
    }

    /// TypeDefs retrieved through queries
    pub fn rest_type_defs(&self) -> &TypeRegistry<TypeDef> {
        &self.rest_type_defs
    }

    /// AttributeTypeDefs retrieved through queries
    pub fn rest_attribute_type_defs(&self) -> &TypeRegistry<AttributeTypeDef> {
        &self.rest_attribute_type_defs
    }

    /// TypeDefs carried by validated events
    pub fn event_type_defs(&self) -> &TypeRegistry<TypeDef> {
        &self.event_type_defs
    }

    /// AttributeTypeDefs carried by validated events
    pub fn event_attribute_type_defs(&self) -> &TypeRegistry<AttributeTypeDef> {
        &self.event_attribute_type_defs
    }

    /// Open a test case
    pub fn probe(&self, test_case_id: impl Into<String>) -> ProbeContext<'_> {
        ProbeContext {
            run: self,
            test_case_id: test_case_id.into(),
            failed: AtomicBool::new(false),
        }
    }

    /// Sequence number for the next inbound event, starting at 1
    pub fn next_event_sequence(&self) -> u64 {
        self.event_sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// A hard assertion failed; the test case ends here
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Probe aborted by {assertion_id}: {message}")]
pub struct ProbeAbort {
    pub assertion_id: String,
    pub message: String,
}

/// Result type for probe steps
pub type ProbeResult<T> = std::result::Result<T, ProbeAbort>;

/// Elapsed time of a single repository call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub operation: &'static str,
    pub elapsed: Duration,
}

impl Timing {
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Capability handed to a probe for the duration of one test case
pub struct ProbeContext<'a> {
    run: &'a RunContext,
    test_case_id: String,
    failed: AtomicBool,
}

impl<'a> ProbeContext<'a> {
    pub fn run(&self) -> &'a RunContext {
        self.run
    }

    pub fn test_case_id(&self) -> &str {
        &self.test_case_id
    }

    pub fn collection(&self) -> &'a dyn MetadataCollection {
        self.run.collection()
    }

    pub fn user_id(&self) -> &'a str {
        self.run.user_id()
    }

    /// Hard check: a failure ends the test case
    pub fn assert(
        &self,
        condition: bool,
        assertion_id: &str,
        message: impl Into<String>,
        requirement: Requirement,
    ) -> ProbeResult<()> {
        self.check(assertion_id, condition, message.into(), requirement, None)
    }

    /// Hard check attributed to a timed repository call
    pub fn assert_timed(
        &self,
        condition: bool,
        assertion_id: &str,
        message: impl Into<String>,
        requirement: Requirement,
        timing: &Timing,
    ) -> ProbeResult<()> {
        self.check(assertion_id, condition, message.into(), requirement, Some(timing))
    }

    /// Soft check: the outcome is recorded and returned
    pub fn verify(
        &self,
        condition: bool,
        assertion_id: &str,
        message: impl Into<String>,
        requirement: Requirement,
    ) -> bool {
        self.record_check(
            Severity::Verification,
            condition,
            assertion_id,
            message.into(),
            requirement,
            None,
        )
    }

    /// Soft check attributed to a timed repository call
    pub fn verify_timed(
        &self,
        condition: bool,
        assertion_id: &str,
        message: impl Into<String>,
        requirement: Requirement,
        timing: &Timing,
    ) -> bool {
        self.record_check(
            Severity::Verification,
            condition,
            assertion_id,
            message.into(),
            requirement,
            Some(timing),
        )
    }

    /// Hard check that a value is present, yielding it
    pub fn require<T>(
        &self,
        value: Option<T>,
        assertion_id: &str,
        message: impl Into<String>,
        requirement: Requirement,
    ) -> ProbeResult<T> {
        self.assert(value.is_some(), assertion_id, message, requirement)?;
        value.ok_or_else(|| self.abort(assertion_id, "value missing"))
    }

    /// Hard check that a timed call returned a value, yielding it
    pub fn require_timed<T>(
        &self,
        value: Option<T>,
        assertion_id: &str,
        message: impl Into<String>,
        requirement: Requirement,
        timing: &Timing,
    ) -> ProbeResult<T> {
        self.assert_timed(value.is_some(), assertion_id, message, requirement, timing)?;
        value.ok_or_else(|| self.abort(assertion_id, "value missing"))
    }

    /// Record an unconditional hard failure and return the abort
    pub fn fail(
        &self,
        assertion_id: &str,
        message: impl Into<String>,
        requirement: Requirement,
    ) -> ProbeAbort {
        match self.assert(false, assertion_id, message, requirement) {
            Err(abort) => abort,
            Ok(()) => self.abort(assertion_id, "failed"),
        }
    }

    /// Issue one repository call and time it
    ///
    /// A repository error is recorded as the failed hard assertion
    /// `assertion_id` and aborts the test case.
    pub async fn call<T, F>(
        &self,
        assertion_id: &str,
        requirement: Requirement,
        operation: &'static str,
        call: F,
    ) -> ProbeResult<(T, Timing)>
    where
        F: Future<Output = metadata_collection::Result<T>>,
    {
        let start = Instant::now();
        let result = call.await;
        let timing = Timing {
            operation,
            elapsed: start.elapsed(),
        };

        match result {
            Ok(value) => Ok((value, timing)),
            Err(e) => {
                let message = format!("{} failed: {}", operation, e);
                self.check(assertion_id, false, message, requirement, Some(&timing))?;
                Err(self.abort(assertion_id, "repository call failed"))
            }
        }
    }

    pub fn record_property(
        &self,
        requirement: Requirement,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) {
        self.run.recorder().record_property(DiscoveredProperty {
            test_case_id: self.test_case_id.clone(),
            profile: requirement.profile(),
            requirement,
            key: key.into(),
            value: value.into(),
        });
    }

    /// Whether any check in this test case has failed so far
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    /// Close the test case with the probe's outcome
    pub fn finish(self, outcome: ProbeResult<()>) -> TestCaseStatus {
        let (status, reason) = match outcome {
            Err(abort) => (TestCaseStatus::Aborted, Some(abort.to_string())),
            Ok(()) if self.has_failed() => (TestCaseStatus::Failed, None),
            Ok(()) => (TestCaseStatus::Passed, None),
        };
        self.close(status, reason)
    }

    /// Close the test case without evaluating it
    pub fn skip(self, reason: impl Into<String>) -> TestCaseStatus {
        let reason = reason.into();
        debug!(test_case = %self.test_case_id, reason = %reason, "Test case skipped");
        self.close(TestCaseStatus::Skipped, Some(reason))
    }

    fn close(self, status: TestCaseStatus, reason: Option<String>) -> TestCaseStatus {
        self.run.recorder().record_outcome(TestCaseOutcome {
            test_case_id: self.test_case_id,
            status,
            reason,
        });
        status
    }

    /// Record a hard check, aborting on failure
    fn check(
        &self,
        assertion_id: &str,
        passed: bool,
        message: String,
        requirement: Requirement,
        timing: Option<&Timing>,
    ) -> ProbeResult<()> {
        let abort = (!passed).then(|| self.abort(assertion_id, &message));
        self.record_check(
            Severity::Assertion,
            passed,
            assertion_id,
            message,
            requirement,
            timing,
        );
        abort.map_or(Ok(()), Err)
    }

    /// Log and record one check; returns whether it passed
    fn record_check(
        &self,
        severity: Severity,
        passed: bool,
        assertion_id: &str,
        message: String,
        requirement: Requirement,
        timing: Option<&Timing>,
    ) -> bool {
        if passed {
            debug!(
                test_case = %self.test_case_id,
                assertion = assertion_id,
                requirement = %requirement,
                "{}", message
            );
        } else {
            self.failed.store(true, Ordering::Relaxed);
            warn!(
                test_case = %self.test_case_id,
                assertion = assertion_id,
                requirement = %requirement,
                severity = ?severity,
                "{}", message
            );
        }

        self.run.recorder().record(EvidenceRecord {
            test_case_id: self.test_case_id.clone(),
            assertion_id: assertion_id.to_string(),
            severity,
            passed,
            message,
            profile: requirement.profile(),
            requirement,
            operation: timing.map(|t| t.operation.to_string()),
            elapsed_ms: timing.map(Timing::elapsed_ms),
            recorded_at: Utc::now(),
        });

        passed
    }

    fn abort(&self, assertion_id: &str, message: &str) -> ProbeAbort {
        ProbeAbort {
            assertion_id: assertion_id.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metadata_collection::{InMemoryMetadataCollection, RepositoryError, TypeDefKind};

    fn run_context() -> RunContext {
        RunContext::new(
            RunConfig::new("cocoMDS1", "mc-1"),
            Arc::new(InMemoryMetadataCollection::new("mc-1", "cocoMDS1")),
        )
    }

    #[test]
    fn test_registry_keeps_newest_version() {
        let registry = TypeRegistry::new();
        let mut asset = TypeDef::new("g-asset", "Asset", TypeDefKind::Entity);
        asset.version = 2;
        assert!(registry.record(&asset));

        let mut older = asset.clone();
        older.version = 1;
        assert!(!registry.record(&older));
        assert_eq!(registry.get("Asset").unwrap().version, 2);

        let mut newer = asset.clone();
        newer.version = 3;
        assert!(registry.record(&newer));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_ignores_unnamed() {
        let registry = TypeRegistry::new();
        let mut unnamed = TypeDef::new("g-x", "X", TypeDefKind::Entity);
        unnamed.name = None;
        assert!(!registry.record(&unnamed));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_soft_failure_continues() {
        let run = run_context();
        let probe = run.probe("tc-soft");

        assert!(!probe.verify(false, "has-timestamp", "event has a timestamp", Requirement::EventEnvelope));
        assert!(probe.verify(true, "has-kind", "event has a kind", Requirement::EventEnvelope));
        assert_eq!(probe.finish(Ok(())), TestCaseStatus::Failed);

        let records = run.recorder().records_for("tc-soft");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].severity, Severity::Verification);
        assert!(!records[0].passed);
    }

    #[test]
    fn test_verify_returns_condition() {
        let run = run_context();
        let probe = run.probe("tc-verify");
        let timing = Timing {
            operation: "get_type_def_by_name",
            elapsed: Duration::from_millis(3),
        };

        assert!(!probe.verify_timed(false, "by-name", "found by name", Requirement::TypeDefLookupByName, &timing));
        assert!(probe.verify_timed(true, "by-guid", "found by GUID", Requirement::TypeDefLookupByGuid, &timing));
        assert!(probe.has_failed());
        assert_eq!(run.recorder().failure_count(), 1);
    }

    #[test]
    fn test_hard_failure_aborts() {
        let run = run_context();
        let probe = run.probe("tc-hard");

        let outcome = probe.assert(false, "has-guid", "TypeDef has a GUID", Requirement::TypeDefIdentity);
        let abort = outcome.clone().unwrap_err();
        assert_eq!(abort.assertion_id, "has-guid");
        assert_eq!(probe.finish(outcome), TestCaseStatus::Aborted);

        let outcomes = run.recorder().outcomes();
        assert_eq!(outcomes[0].status, TestCaseStatus::Aborted);
    }

    #[test]
    fn test_require_yields_value() {
        let run = run_context();
        let probe = run.probe("tc-require");
        let value = probe
            .require(Some(7), "present", "value present", Requirement::TypeDefStructure)
            .unwrap();
        assert_eq!(value, 7);
        assert!(probe
            .require::<u32>(None, "absent", "value present", Requirement::TypeDefStructure)
            .is_err());
    }

    #[tokio::test]
    async fn test_call_records_repository_error() {
        let run = run_context();
        let probe = run.probe("tc-call");

        let result: ProbeResult<((), Timing)> = probe
            .call(
                "get-by-guid",
                Requirement::TypeDefLookupByGuid,
                "get_type_def_by_guid",
                async { Err(RepositoryError::Transport("connection refused".into())) },
            )
            .await;
        assert!(result.is_err());

        let records = run.recorder().records_for("tc-call");
        assert_eq!(records.len(), 1);
        assert!(!records[0].passed);
        assert_eq!(records[0].operation.as_deref(), Some("get_type_def_by_guid"));
        assert!(records[0].elapsed_ms.is_some());
        assert!(records[0].message.contains("connection refused"));
    }

    #[test]
    fn test_event_sequence_starts_at_one() {
        let run = run_context();
        assert_eq!(run.next_event_sequence(), 1);
        assert_eq!(run.next_event_sequence(), 2);
    }

    #[test]
    fn test_property_attributed_to_profile() {
        let run = run_context();
        let probe = run.probe("tc-props");
        probe.record_property(Requirement::TypeRetrievalLatency, "retrieval-ms", 12u64);

        let properties = run.recorder().properties();
        assert_eq!(properties[0].profile, crate::ConformanceProfile::Performance);
        assert_eq!(properties[0].value, PropertyValue::Integer(12));
    }
}
