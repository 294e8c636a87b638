//! Conformance profiles and the requirements evidence is recorded against

use serde::{Deserialize, Serialize};

/// Named unit of conformance a repository can claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConformanceProfile {
    MetadataSharing,
    TypeDefEvents,
    Performance,
}

impl ConformanceProfile {
    pub const ALL: [ConformanceProfile; 3] = [
        ConformanceProfile::MetadataSharing,
        ConformanceProfile::TypeDefEvents,
        ConformanceProfile::Performance,
    ];

    pub fn id(&self) -> u32 {
        match self {
            ConformanceProfile::MetadataSharing => 0,
            ConformanceProfile::TypeDefEvents => 1,
            ConformanceProfile::Performance => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConformanceProfile::MetadataSharing => "Metadata sharing",
            ConformanceProfile::TypeDefEvents => "Type definition events",
            ConformanceProfile::Performance => "Performance",
        }
    }

    /// Requirements that belong to this profile
    pub fn requirements(&self) -> impl Iterator<Item = Requirement> + '_ {
        Requirement::ALL
            .into_iter()
            .filter(move |requirement| requirement.profile() == *self)
    }
}

impl std::fmt::Display for ConformanceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single requirement within a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Requirement {
    TypeDefIdentity,
    TypeDefStructure,
    SupportedTypeVerification,
    TypeDefLookupByGuid,
    TypeDefLookupByName,
    TypeNameSearch,
    CategoryEnumeration,
    AllTypesEnumeration,
    ExternalStandardMapping,
    EventEnvelope,
    EventOrigin,
    EventPayload,
    EventConsistency,
    TypeRetrievalLatency,
}

impl Requirement {
    pub const ALL: [Requirement; 14] = [
        Requirement::TypeDefIdentity,
        Requirement::TypeDefStructure,
        Requirement::SupportedTypeVerification,
        Requirement::TypeDefLookupByGuid,
        Requirement::TypeDefLookupByName,
        Requirement::TypeNameSearch,
        Requirement::CategoryEnumeration,
        Requirement::AllTypesEnumeration,
        Requirement::ExternalStandardMapping,
        Requirement::EventEnvelope,
        Requirement::EventOrigin,
        Requirement::EventPayload,
        Requirement::EventConsistency,
        Requirement::TypeRetrievalLatency,
    ];

    pub fn profile(&self) -> ConformanceProfile {
        match self {
            Requirement::TypeDefIdentity
            | Requirement::TypeDefStructure
            | Requirement::SupportedTypeVerification
            | Requirement::TypeDefLookupByGuid
            | Requirement::TypeDefLookupByName
            | Requirement::TypeNameSearch
            | Requirement::CategoryEnumeration
            | Requirement::AllTypesEnumeration
            | Requirement::ExternalStandardMapping => ConformanceProfile::MetadataSharing,
            Requirement::EventEnvelope
            | Requirement::EventOrigin
            | Requirement::EventPayload
            | Requirement::EventConsistency => ConformanceProfile::TypeDefEvents,
            Requirement::TypeRetrievalLatency => ConformanceProfile::Performance,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Requirement::TypeDefIdentity => "type-def-identity",
            Requirement::TypeDefStructure => "type-def-structure",
            Requirement::SupportedTypeVerification => "supported-type-verification",
            Requirement::TypeDefLookupByGuid => "type-def-lookup-by-guid",
            Requirement::TypeDefLookupByName => "type-def-lookup-by-name",
            Requirement::TypeNameSearch => "type-name-search",
            Requirement::CategoryEnumeration => "category-enumeration",
            Requirement::AllTypesEnumeration => "all-types-enumeration",
            Requirement::ExternalStandardMapping => "external-standard-mapping",
            Requirement::EventEnvelope => "event-envelope",
            Requirement::EventOrigin => "event-origin",
            Requirement::EventPayload => "event-payload",
            Requirement::EventConsistency => "event-consistency",
            Requirement::TypeRetrievalLatency => "type-retrieval-latency",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Requirement::TypeDefIdentity => "Type definition identity",
            Requirement::TypeDefStructure => "Type definition structure",
            Requirement::SupportedTypeVerification => "Supported type verification",
            Requirement::TypeDefLookupByGuid => "Type definition lookup by GUID",
            Requirement::TypeDefLookupByName => "Type definition lookup by name",
            Requirement::TypeNameSearch => "Type name search",
            Requirement::CategoryEnumeration => "Category enumeration",
            Requirement::AllTypesEnumeration => "All types enumeration",
            Requirement::ExternalStandardMapping => "External standard mapping",
            Requirement::EventEnvelope => "Event envelope",
            Requirement::EventOrigin => "Event origin",
            Requirement::EventPayload => "Event payload",
            Requirement::EventConsistency => "Event consistency",
            Requirement::TypeRetrievalLatency => "Type retrieval latency",
        }
    }
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_requirement_in_one_profile() {
        let total: usize = ConformanceProfile::ALL
            .iter()
            .map(|profile| profile.requirements().count())
            .sum();
        assert_eq!(total, Requirement::ALL.len());
    }

    #[test]
    fn test_requirement_ids_unique() {
        let ids: HashSet<_> = Requirement::ALL.iter().map(|r| r.id()).collect();
        assert_eq!(ids.len(), Requirement::ALL.len());
    }

    #[test]
    fn test_serialized_as_kebab_case() {
        let json = serde_json::to_string(&Requirement::TypeDefLookupByGuid).unwrap();
        assert_eq!(json, "\"type-def-lookup-by-guid\"");
        assert_eq!(
            Requirement::TypeRetrievalLatency.profile(),
            ConformanceProfile::Performance
        );
    }
}
