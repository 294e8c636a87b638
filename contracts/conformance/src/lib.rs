//! Metadata Type Conformance Suite
//!
//! This crate certifies that a metadata repository reached through the
//! [`MetadataCollection`](metadata_collection::MetadataCollection) contract
//! describes its type system consistently across three channels:
//!
//! - Lookup queries by GUID and by name
//!   - Structural validity of every supported definition
//!   - Round trips between lookup, verification and name search
//!
//! - Enumeration queries
//!   - Categories partition the full set of types
//!   - External standard mappings are searchable
//!
//! - Type definition events
//!   - Envelope, origin and payload shape
//!   - Consistency with the query path, allowing for version skew
//!
//! Evidence is recorded against the requirements of three profiles and
//! rendered as a [`ConformanceReport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use metadata_conformance::{ConformanceRunner, RunConfig};
//! use std::sync::Arc;
//!
//! let config = RunConfig::from_file("conformance.toml").await?;
//! let runner = ConformanceRunner::new(config);
//! let report = runner.run_with_events(collection, Some(events)).await;
//! println!("{}", report.to_text());
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod consistency;
pub mod context;
pub mod error;
pub mod events;
pub mod evidence;
pub mod framework;
pub mod harness;
pub mod listener;
pub mod probes;
pub mod profile;
pub mod reconcile;
pub mod reports;

pub use config::RunConfig;
pub use consistency::{compare, Consistency};
pub use context::{ProbeAbort, ProbeContext, ProbeResult, RunContext, Timing, TypeRegistry};
pub use error::{ConformanceError, Result};
pub use events::{validate_event, EventDisposition, ValidatedEvent};
pub use evidence::{
    DiscoveredProperty, EvidenceRecord, EvidenceRecorder, PropertyValue, Severity,
    TestCaseOutcome, TestCaseStatus,
};
pub use framework::ConformanceRunner;
pub use harness::TestHarness;
pub use listener::EventListener;
pub use probes::DiscoverySource;
pub use profile::{ConformanceProfile, Requirement};
pub use reconcile::{reconcile_attribute_type_def, reconcile_type_def, Reconciliation};
pub use reports::{
    ConformanceReport, ConformanceStatus, ProfileSummary, ReportSummary, RequirementSummary,
    TestCaseSummary,
};
