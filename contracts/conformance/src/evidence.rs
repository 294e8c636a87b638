//! Evidence records and the recorder that collects them
//!
//! Evidence is append-only. Every record is attributed to the test case that
//! produced it and to the profile requirement it supports.

use crate::profile::{ConformanceProfile, Requirement};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// How a failed check affects its test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Hard: a failure aborts the test case
    Assertion,
    /// Soft: a failure is recorded and the test case continues
    Verification,
}

/// Outcome of one assertion or verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub test_case_id: String,
    pub assertion_id: String,
    pub severity: Severity,
    pub passed: bool,
    pub message: String,
    pub profile: ConformanceProfile,
    pub requirement: Requirement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    pub recorded_at: DateTime<Utc>,
}

/// Value of a discovered property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Flag(bool),
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Flag(value) => write!(f, "{}", value),
            PropertyValue::Integer(value) => write!(f, "{}", value),
            PropertyValue::Text(value) => write!(f, "{}", value),
            PropertyValue::List(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Flag(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for PropertyValue {
    fn from(value: usize) -> Self {
        PropertyValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(values: Vec<String>) -> Self {
        PropertyValue::List(values)
    }
}

/// A fact about the repository learned while probing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredProperty {
    pub test_case_id: String,
    pub profile: ConformanceProfile,
    pub requirement: Requirement,
    pub key: String,
    pub value: PropertyValue,
}

/// Terminal status of one test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCaseStatus {
    /// Every check passed
    Passed,
    /// At least one soft check failed; the test case ran to completion
    Failed,
    /// A hard check failed and ended the test case
    Aborted,
    /// Nothing in the test case was applicable
    Skipped,
}

impl TestCaseStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, TestCaseStatus::Failed | TestCaseStatus::Aborted)
    }
}

/// Terminal outcome of one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseOutcome {
    pub test_case_id: String,
    pub status: TestCaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Append-only store for everything a run observes
#[derive(Debug, Default)]
pub struct EvidenceRecorder {
    records: Mutex<Vec<EvidenceRecord>>,
    properties: Mutex<Vec<DiscoveredProperty>>,
    outcomes: Mutex<Vec<TestCaseOutcome>>,
    flags: Mutex<Vec<String>>,
}

impl EvidenceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: EvidenceRecord) {
        self.records.lock().push(record);
    }

    pub fn record_property(&self, property: DiscoveredProperty) {
        self.properties.lock().push(property);
    }

    pub fn record_outcome(&self, outcome: TestCaseOutcome) {
        self.outcomes.lock().push(outcome);
    }

    /// Note something a report reader should look at, without failing anything
    pub fn flag(&self, message: impl Into<String>) {
        self.flags.lock().push(message.into());
    }

    pub fn records(&self) -> Vec<EvidenceRecord> {
        self.records.lock().clone()
    }

    pub fn properties(&self) -> Vec<DiscoveredProperty> {
        self.properties.lock().clone()
    }

    pub fn outcomes(&self) -> Vec<TestCaseOutcome> {
        self.outcomes.lock().clone()
    }

    pub fn flags(&self) -> Vec<String> {
        self.flags.lock().clone()
    }

    /// Records belonging to one test case
    pub fn records_for(&self, test_case_id: &str) -> Vec<EvidenceRecord> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.test_case_id == test_case_id)
            .cloned()
            .collect()
    }

    /// Properties recorded under one key, across all test cases
    pub fn properties_named(&self, key: &str) -> Vec<DiscoveredProperty> {
        self.properties
            .lock()
            .iter()
            .filter(|property| property.key == key)
            .cloned()
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.records.lock().iter().filter(|record| !record.passed).count()
    }
}
