//! Test harness for running conformance tests

use crate::config::RunConfig;
use crate::framework::ConformanceRunner;
use crate::reports::ConformanceReport;
use metadata_collection::{MetadataCollection, TypeDefEvent};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Test harness for conformance testing
pub struct TestHarness {
    runner: ConformanceRunner,
}

impl TestHarness {
    /// Create a test harness for one technology under test
    pub fn new(config: RunConfig) -> Self {
        Self {
            runner: ConformanceRunner::new(config),
        }
    }

    /// Run conformance tests and return report
    pub async fn run(&self, collection: Arc<dyn MetadataCollection>) -> ConformanceReport {
        self.runner.run(collection).await
    }

    /// Run conformance tests including the event stream
    pub async fn run_with_events(
        &self,
        collection: Arc<dyn MetadataCollection>,
        events: UnboundedReceiver<TypeDefEvent>,
    ) -> ConformanceReport {
        self.runner.run_with_events(collection, Some(events)).await
    }

    /// Run tests and assert conformance
    pub async fn assert_conformant(&self, collection: Arc<dyn MetadataCollection>) {
        let report = self.runner.run(collection).await;

        if !report.is_conformant() {
            panic!(
                "Repository '{}' is not conformant:\n{}",
                report.tut_server_name,
                report.to_text()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metadata_collection::{InMemoryMetadataCollection, TypeDef, TypeDefKind};

    fn collection() -> Arc<InMemoryMetadataCollection> {
        let collection = InMemoryMetadataCollection::new("mc-1", "cocoMDS1");
        collection
            .add_type_def(TypeDef::new("G1", "Asset", TypeDefKind::Entity))
            .unwrap();
        Arc::new(collection)
    }

    #[tokio::test]
    async fn test_assert_conformant_passes() {
        let harness = TestHarness::new(RunConfig::new("cocoMDS1", "mc-1"));
        harness.assert_conformant(collection()).await;
    }

    #[tokio::test]
    #[should_panic(expected = "is not conformant")]
    async fn test_assert_conformant_panics_with_report() {
        let harness = TestHarness::new(RunConfig::new("cocoMDS1", "mc-1"));
        harness
            .assert_conformant(Arc::new(InMemoryMetadataCollection::new("mc-1", "cocoMDS1")))
            .await;
    }
}
