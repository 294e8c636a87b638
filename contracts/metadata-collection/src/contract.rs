//! Core metadata collection contract definition

use crate::{AttributeTypeDef, AttributeTypeDefCategory, TypeDef, TypeDefCategory};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Behaviour shared by TypeDefs and AttributeTypeDefs
pub trait Definition: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Whether definitions of this family may move to new versions after creation
    const MUTABLE: bool;

    fn guid(&self) -> Option<&str>;

    fn name(&self) -> Option<&str>;

    fn version(&self) -> u64;

    fn version_name(&self) -> Option<&str>;

    fn description(&self) -> Option<&str>;

    fn description_guid(&self) -> Option<&str>;

    /// Category label, refined with subtype detail where one exists
    fn category_label(&self) -> String;
}

/// All TypeDefs and AttributeTypeDefs known to a repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDefGallery {
    #[serde(default)]
    pub type_defs: Vec<TypeDef>,
    #[serde(default)]
    pub attribute_type_defs: Vec<AttributeTypeDef>,
}

impl TypeDefGallery {
    pub fn is_empty(&self) -> bool {
        self.type_defs.is_empty() && self.attribute_type_defs.is_empty()
    }
}

/// The query surface of a metadata repository
///
/// Every call takes the identity of the caller first. Lookups and
/// enumerations return `Ok(None)` when there is nothing to return; errors are
/// reserved for transport and parameter failures.
#[async_trait]
pub trait MetadataCollection: Send + Sync {
    /// Returns the TypeDef with the given unique identifier
    async fn get_type_def_by_guid(&self, user_id: &str, guid: &str) -> Result<Option<TypeDef>>;

    /// Returns the TypeDef with the given unique name
    async fn get_type_def_by_name(&self, user_id: &str, name: &str) -> Result<Option<TypeDef>>;

    /// Returns the AttributeTypeDef with the given unique identifier
    async fn get_attribute_type_def_by_guid(
        &self,
        user_id: &str,
        guid: &str,
    ) -> Result<Option<AttributeTypeDef>>;

    /// Returns the AttributeTypeDef with the given unique name
    async fn get_attribute_type_def_by_name(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<AttributeTypeDef>>;

    /// Returns every TypeDef of one category
    async fn find_type_defs_by_category(
        &self,
        user_id: &str,
        category: TypeDefCategory,
    ) -> Result<Option<Vec<TypeDef>>>;

    /// Returns every AttributeTypeDef of one category
    async fn find_attribute_type_defs_by_category(
        &self,
        user_id: &str,
        category: AttributeTypeDefCategory,
    ) -> Result<Option<Vec<AttributeTypeDef>>>;

    /// Returns every type the repository knows
    async fn get_all_types(&self, user_id: &str) -> Result<Option<TypeDefGallery>>;

    /// Returns the TypeDefs mapped to an external standard
    ///
    /// Each supplied dimension narrows the match; at least one must be given.
    async fn find_types_by_external_id(
        &self,
        user_id: &str,
        standard: Option<&str>,
        organization: Option<&str>,
        identifier: Option<&str>,
    ) -> Result<Option<Vec<TypeDef>>>;

    /// Returns the TypeDefs and AttributeTypeDefs with the given name
    async fn find_types_by_name(&self, user_id: &str, name: &str) -> Result<Option<TypeDefGallery>>;

    /// Confirms the repository supports this exact TypeDef
    async fn verify_type_def(&self, user_id: &str, type_def: &TypeDef) -> Result<bool>;

    /// Confirms the repository supports this exact AttributeTypeDef
    async fn verify_attribute_type_def(
        &self,
        user_id: &str,
        attribute_type_def: &AttributeTypeDef,
    ) -> Result<bool>;
}

/// Errors surfaced by a metadata collection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Invalid parameter {parameter}: {reason}")]
    InvalidParameter { parameter: String, reason: String },

    #[error("User not authorized: {0}")]
    UserNotAuthorized(String),

    #[error("Type definition conflict: {0}")]
    TypeDefConflict(String),

    #[error("Function not supported: {0}")]
    FunctionNotSupported(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl RepositoryError {
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        RepositoryError::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for metadata collection operations
pub type Result<T> = std::result::Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RepositoryError::invalid_parameter("guid", "must not be empty");
        assert_eq!(err.to_string(), "Invalid parameter guid: must not be empty");
    }

    #[test]
    fn test_empty_gallery() {
        assert!(TypeDefGallery::default().is_empty());
    }
}
