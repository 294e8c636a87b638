//! Conformance reporting

use crate::context::RunContext;
use crate::evidence::{DiscoveredProperty, EvidenceRecord, TestCaseStatus};
use crate::profile::{ConformanceProfile, Requirement};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Conformance verdict for a profile or requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConformanceStatus {
    Conformant,
    NotConformant,
    /// Only discovered properties were recorded
    Measured,
    NoEvidence,
}

impl ConformanceStatus {
    fn from_counts(passed: usize, failed: usize, measurements: usize) -> Self {
        if failed > 0 {
            ConformanceStatus::NotConformant
        } else if passed > 0 {
            ConformanceStatus::Conformant
        } else if measurements > 0 {
            ConformanceStatus::Measured
        } else {
            ConformanceStatus::NoEvidence
        }
    }
}

impl std::fmt::Display for ConformanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConformanceStatus::Conformant => write!(f, "CONFORMANT"),
            ConformanceStatus::NotConformant => write!(f, "NOT CONFORMANT"),
            ConformanceStatus::Measured => write!(f, "MEASURED"),
            ConformanceStatus::NoEvidence => write!(f, "NO EVIDENCE"),
        }
    }
}

/// Evidence totals for one requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementSummary {
    pub requirement: Requirement,
    pub name: String,
    pub passed: usize,
    pub failed: usize,
    /// Discovered properties recorded against the requirement
    pub measurements: usize,
    pub status: ConformanceStatus,
}

/// Evidence totals for one profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub profile: ConformanceProfile,
    pub name: String,
    pub status: ConformanceStatus,
    pub requirements: Vec<RequirementSummary>,
}

/// Outcome and evidence totals for one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseSummary {
    pub test_case_id: String,
    pub status: TestCaseStatus,
    pub assertions: usize,
    pub failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Report summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub aborted: usize,
    pub skipped: usize,
    pub evidence: usize,
    pub failed_evidence: usize,
    pub conformant: bool,
}

/// Complete conformance report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformanceReport {
    pub run_id: Uuid,
    pub tut_server_name: String,
    pub tut_metadata_collection_id: String,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
    pub test_cases: Vec<TestCaseSummary>,
    pub profiles: Vec<ProfileSummary>,
    pub evidence: Vec<EvidenceRecord>,
    pub properties: Vec<DiscoveredProperty>,
    pub flags: Vec<String>,
    pub summary: ReportSummary,
}

impl ConformanceReport {
    /// Build the report from everything a run recorded
    pub fn from_run(run: &RunContext, duration: Duration) -> Self {
        let recorder = run.recorder();
        let evidence = recorder.records();
        let properties = recorder.properties();

        let test_cases: Vec<TestCaseSummary> = recorder
            .outcomes()
            .into_iter()
            .map(|outcome| {
                let records = evidence
                    .iter()
                    .filter(|record| record.test_case_id == outcome.test_case_id);
                let (assertions, failures) =
                    records.fold((0, 0), |(total, failed), record| {
                        (total + 1, failed + usize::from(!record.passed))
                    });
                TestCaseSummary {
                    test_case_id: outcome.test_case_id,
                    status: outcome.status,
                    assertions,
                    failures,
                    reason: outcome.reason,
                }
            })
            .collect();

        let profiles = ConformanceProfile::ALL
            .iter()
            .map(|profile| {
                let requirements: Vec<RequirementSummary> = profile
                    .requirements()
                    .map(|requirement| {
                        let (passed, failed) = evidence
                            .iter()
                            .filter(|record| record.requirement == requirement)
                            .fold((0, 0), |(passed, failed), record| {
                                if record.passed {
                                    (passed + 1, failed)
                                } else {
                                    (passed, failed + 1)
                                }
                            });
                        let measurements = properties
                            .iter()
                            .filter(|property| property.requirement == requirement)
                            .count();
                        RequirementSummary {
                            requirement,
                            name: requirement.name().to_string(),
                            passed,
                            failed,
                            measurements,
                            status: ConformanceStatus::from_counts(passed, failed, measurements),
                        }
                    })
                    .collect();
                let passed = requirements.iter().map(|r| r.passed).sum();
                let failed = requirements.iter().map(|r| r.failed).sum();
                let measurements = requirements.iter().map(|r| r.measurements).sum();
                ProfileSummary {
                    profile: *profile,
                    name: profile.name().to_string(),
                    status: ConformanceStatus::from_counts(passed, failed, measurements),
                    requirements,
                }
            })
            .collect();

        let count = |status: TestCaseStatus| {
            test_cases
                .iter()
                .filter(|test_case| test_case.status == status)
                .count()
        };
        let failed_evidence = evidence.iter().filter(|record| !record.passed).count();
        let summary = ReportSummary {
            total: test_cases.len(),
            passed: count(TestCaseStatus::Passed),
            failed: count(TestCaseStatus::Failed),
            aborted: count(TestCaseStatus::Aborted),
            skipped: count(TestCaseStatus::Skipped),
            evidence: evidence.len(),
            failed_evidence,
            conformant: failed_evidence == 0,
        };

        Self {
            run_id: run.run_id(),
            tut_server_name: run.config().tut_server_name.clone(),
            tut_metadata_collection_id: run.config().tut_metadata_collection_id.clone(),
            timestamp: run.started_at(),
            duration,
            test_cases,
            profiles,
            evidence,
            properties,
            flags: recorder.flags(),
            summary,
        }
    }

    /// Check if conformant
    pub fn is_conformant(&self) -> bool {
        self.summary.conformant
    }

    pub fn profile(&self, profile: ConformanceProfile) -> Option<&ProfileSummary> {
        self.profiles.iter().find(|summary| summary.profile == profile)
    }

    pub fn test_case(&self, test_case_id: &str) -> Option<&TestCaseSummary> {
        self.test_cases
            .iter()
            .find(|test_case| test_case.test_case_id == test_case_id)
    }

    /// Failed evidence, in recording order
    pub fn failures(&self) -> Vec<&EvidenceRecord> {
        self.evidence.iter().filter(|record| !record.passed).collect()
    }

    /// Properties recorded under one key
    pub fn properties_named<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a DiscoveredProperty> + 'a {
        self.properties.iter().filter(move |property| property.key == key)
    }

    /// Generate a text report
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str("╔════════════════════════════════════════════════════════════╗\n");
        output.push_str("║  Metadata Type Conformance Report                          ║\n");
        output.push_str("╠════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!("║  Server: {:<49} ║\n", self.tut_server_name));
        output.push_str(&format!(
            "║  Collection: {:<45} ║\n",
            self.tut_metadata_collection_id
        ));
        output.push_str(&format!("║  Run: {:<52} ║\n", self.run_id));
        output.push_str(&format!(
            "║  Timestamp: {:<46} ║\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str(&format!(
            "║  Duration: {:<47} ║\n",
            format!("{:?}", self.duration)
        ));
        output.push_str("╠════════════════════════════════════════════════════════════╣\n");

        for profile in &self.profiles {
            output.push_str(&format!("║  {} Profile: {}\n", profile.name, profile.status));
            output.push_str("╟────────────────────────────────────────────────────────────╢\n");
            for requirement in &profile.requirements {
                let status_icon = match requirement.status {
                    ConformanceStatus::Conformant => "✓",
                    ConformanceStatus::NotConformant => "✗",
                    ConformanceStatus::Measured => "~",
                    ConformanceStatus::NoEvidence => "○",
                };
                if requirement.status == ConformanceStatus::Measured {
                    output.push_str(&format!(
                        "║  {} {:<40} {:>5} measured\n",
                        status_icon, requirement.name, requirement.measurements
                    ));
                } else {
                    output.push_str(&format!(
                        "║  {} {:<40} {:>5} ok {:>4} failed\n",
                        status_icon, requirement.name, requirement.passed, requirement.failed
                    ));
                }
            }
            output.push_str("╟────────────────────────────────────────────────────────────╢\n");
        }

        let failures = self.failures();
        if !failures.is_empty() {
            output.push_str("║  Failures:\n");
            for record in failures {
                output.push_str(&format!(
                    "║    ✗ [{}] {}: {}\n",
                    record.test_case_id, record.assertion_id, record.message
                ));
            }
            output.push_str("╟────────────────────────────────────────────────────────────╢\n");
        }

        if !self.flags.is_empty() {
            output.push_str("║  Flags:\n");
            for flag in &self.flags {
                output.push_str(&format!("║    ! {}\n", flag));
            }
            output.push_str("╟────────────────────────────────────────────────────────────╢\n");
        }

        output.push_str("╠════════════════════════════════════════════════════════════╣\n");
        output.push_str("║  Summary:                                                  ║\n");
        output.push_str(&format!(
            "║    Total: {:<4} Passed: {:<4} Failed: {:<4} Aborted: {:<4}   ║\n",
            self.summary.total, self.summary.passed, self.summary.failed, self.summary.aborted
        ));
        output.push_str(&format!(
            "║    Skipped: {:<4} Evidence: {:<6} Failed evidence: {:<6}  ║\n",
            self.summary.skipped, self.summary.evidence, self.summary.failed_evidence
        ));
        output.push_str("║                                                            ║\n");

        if self.summary.conformant {
            output.push_str("║  Result: ✓ CONFORMANT                                      ║\n");
        } else {
            output.push_str("║  Result: ✗ NON-CONFORMANT                                  ║\n");
        }

        output.push_str("╚════════════════════════════════════════════════════════════╝\n");

        output
    }

    /// Generate JSON report
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use metadata_collection::InMemoryMetadataCollection;
    use std::sync::Arc;

    fn run() -> RunContext {
        RunContext::new(
            RunConfig::new("cocoMDS1", "mc-1"),
            Arc::new(InMemoryMetadataCollection::new("mc-1", "cocoMDS1")),
        )
    }

    #[test]
    fn test_failed_evidence_marks_profile_not_conformant() {
        let run = run();
        let probe = run.probe("repository-typedef-event-0001");
        probe.verify(false, "event-timestamp", "Event carries a timestamp", Requirement::EventEnvelope);
        probe.finish(Ok(()));

        let probe = run.probe("repository-all-types");
        probe
            .assert(true, "all-types-present", "Types returned", Requirement::AllTypesEnumeration)
            .unwrap();
        probe.finish(Ok(()));

        let report = ConformanceReport::from_run(&run, Duration::from_millis(5));
        assert!(!report.is_conformant());
        assert_eq!(
            report.profile(ConformanceProfile::TypeDefEvents).unwrap().status,
            ConformanceStatus::NotConformant
        );
        assert_eq!(
            report.profile(ConformanceProfile::MetadataSharing).unwrap().status,
            ConformanceStatus::Conformant
        );
        assert_eq!(
            report.profile(ConformanceProfile::Performance).unwrap().status,
            ConformanceStatus::NoEvidence
        );
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.passed, 1);

        let test_case = report.test_case("repository-typedef-event-0001").unwrap();
        assert_eq!(test_case.assertions, 1);
        assert_eq!(test_case.failures, 1);
    }

    #[test]
    fn test_latency_only_profile_is_measured() {
        let run = run();
        let probe = run.probe("repository-supported-typedef-Asset");
        probe.record_property(Requirement::TypeRetrievalLatency, "get_type_def_by_guid-ms", 4u64);
        probe.finish(Ok(()));

        let report = ConformanceReport::from_run(&run, Duration::ZERO);
        let performance = report.profile(ConformanceProfile::Performance).unwrap();
        assert_eq!(performance.status, ConformanceStatus::Measured);
        assert!(performance
            .requirements
            .iter()
            .any(|requirement| requirement.measurements == 1));
        assert!(report.is_conformant());
        assert!(report.to_text().contains("Profile: MEASURED"));
    }

    #[test]
    fn test_report_to_text() {
        let run = run();
        run.recorder().flag("DataSet: mapping counted only under organization 'W3C'");
        let report = ConformanceReport::from_run(&run, Duration::ZERO);

        let text = report.to_text();
        assert!(text.contains("cocoMDS1"));
        assert!(text.contains("Result: ✓ CONFORMANT"));
        assert!(text.contains("W3C"));
    }

    #[test]
    fn test_report_to_json() {
        let report = ConformanceReport::from_run(&run(), Duration::ZERO);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"tut_metadata_collection_id\": \"mc-1\""));
        assert!(json.contains("\"type-def-identity\""));
    }
}
