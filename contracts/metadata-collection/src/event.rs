//! Type definition change notifications
//!
//! Every envelope field is optional so that malformed notifications can be
//! represented and reported rather than rejected at deserialization time.

use crate::{AttributeTypeDef, TypeDef, TypeDefPatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of change a notification announces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeDefEventKind {
    NewTypeDef,
    DeletedTypeDef,
    ReIdentifiedTypeDef,
    UpdatedTypeDef,
    NewAttributeTypeDef,
    DeletedAttributeTypeDef,
    ReIdentifiedAttributeTypeDef,
    Error,
    /// Sentinel for unrecognised kinds
    #[serde(other)]
    Unknown,
}

impl TypeDefEventKind {
    pub fn label(&self) -> &'static str {
        match self {
            TypeDefEventKind::NewTypeDef => "NEW_TYPEDEF",
            TypeDefEventKind::DeletedTypeDef => "DELETED_TYPEDEF",
            TypeDefEventKind::ReIdentifiedTypeDef => "RE_IDENTIFIED_TYPEDEF",
            TypeDefEventKind::UpdatedTypeDef => "UPDATED_TYPEDEF",
            TypeDefEventKind::NewAttributeTypeDef => "NEW_ATTRIBUTE_TYPEDEF",
            TypeDefEventKind::DeletedAttributeTypeDef => "DELETED_ATTRIBUTE_TYPEDEF",
            TypeDefEventKind::ReIdentifiedAttributeTypeDef => "RE_IDENTIFIED_ATTRIBUTE_TYPEDEF",
            TypeDefEventKind::Error => "ERROR",
            TypeDefEventKind::Unknown => "UNKNOWN",
        }
    }

    /// Whether the announced definition no longer exists in the sender
    pub fn is_deletion(&self) -> bool {
        matches!(
            self,
            TypeDefEventKind::DeletedTypeDef | TypeDefEventKind::DeletedAttributeTypeDef
        )
    }
}

impl fmt::Display for TypeDefEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of the cohort member that sent a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOriginator {
    pub metadata_collection_id: Option<String>,
    pub server_name: Option<String>,
    pub server_type: Option<String>,
    pub organization_name: Option<String>,
}

impl EventOriginator {
    pub fn new(metadata_collection_id: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self {
            metadata_collection_id: Some(metadata_collection_id.into()),
            server_name: Some(server_name.into()),
            server_type: None,
            organization_name: None,
        }
    }
}

/// A change notification for type definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefEvent {
    pub timestamp: Option<DateTime<Utc>>,
    pub kind: Option<TypeDefEventKind>,
    pub originator: Option<EventOriginator>,
    pub type_def: Option<TypeDef>,
    pub attribute_type_def: Option<AttributeTypeDef>,
    pub type_def_patch: Option<TypeDefPatch>,
    /// Previous identity for re-identify notifications
    pub original_guid: Option<String>,
    pub original_name: Option<String>,
    pub error_message: Option<String>,
}

impl TypeDefEvent {
    fn envelope(kind: TypeDefEventKind, originator: EventOriginator) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            kind: Some(kind),
            originator: Some(originator),
            type_def: None,
            attribute_type_def: None,
            type_def_patch: None,
            original_guid: None,
            original_name: None,
            error_message: None,
        }
    }

    /// Notification carrying a full TypeDef
    pub fn type_def(kind: TypeDefEventKind, originator: EventOriginator, type_def: TypeDef) -> Self {
        Self {
            type_def: Some(type_def),
            ..Self::envelope(kind, originator)
        }
    }

    /// Notification carrying a full AttributeTypeDef
    pub fn attribute_type_def(
        kind: TypeDefEventKind,
        originator: EventOriginator,
        attribute_type_def: AttributeTypeDef,
    ) -> Self {
        Self {
            attribute_type_def: Some(attribute_type_def),
            ..Self::envelope(kind, originator)
        }
    }

    /// Update notification carrying only the delta
    pub fn updated(originator: EventOriginator, patch: TypeDefPatch) -> Self {
        Self {
            type_def_patch: Some(patch),
            ..Self::envelope(TypeDefEventKind::UpdatedTypeDef, originator)
        }
    }

    /// Error notification
    pub fn error(originator: EventOriginator, message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::envelope(TypeDefEventKind::Error, originator)
        }
    }

    /// Parse a notification from JSON text; `null` yields `None`
    pub fn from_json(json: &str) -> Result<Option<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeDefKind;

    #[test]
    fn test_null_payload_parses_to_none() {
        assert_eq!(TypeDefEvent::from_json("null").unwrap(), None);
    }

    #[test]
    fn test_unknown_kind_parses_to_sentinel() {
        let event = TypeDefEvent::from_json(r#"{ "kind": "PURGED_TYPEDEF" }"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, Some(TypeDefEventKind::Unknown));
        assert!(event.originator.is_none());
    }

    #[test]
    fn test_constructors_set_single_payload() {
        let origin = EventOriginator::new("mc-1", "server-1");
        let type_def = TypeDef::new("g-1", "Asset", TypeDefKind::Entity);
        let event = TypeDefEvent::type_def(TypeDefEventKind::NewTypeDef, origin.clone(), type_def.clone());
        assert!(event.type_def.is_some());
        assert!(event.attribute_type_def.is_none());
        assert!(event.type_def_patch.is_none());

        let update = TypeDefEvent::updated(origin, TypeDefPatch::for_type_def(&type_def));
        assert_eq!(update.kind, Some(TypeDefEventKind::UpdatedTypeDef));
        assert!(update.type_def.is_none());
        assert!(update.type_def_patch.is_some());
    }

    #[test]
    fn test_deletion_kinds() {
        assert!(TypeDefEventKind::DeletedTypeDef.is_deletion());
        assert!(TypeDefEventKind::DeletedAttributeTypeDef.is_deletion());
        assert!(!TypeDefEventKind::NewTypeDef.is_deletion());
    }
}
