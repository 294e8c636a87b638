//! In-memory implementation of the metadata collection contract
//!
//! Suitable for development and for exercising conformance tooling. When an
//! event sink is attached every change is announced as a [`TypeDefEvent`]
//! stamped with this collection's originator.

use crate::contract::{MetadataCollection, RepositoryError, Result, TypeDefGallery};
use crate::{
    AttributeTypeDef, AttributeTypeDefCategory, EventOriginator, TypeDef, TypeDefCategory,
    TypeDefEvent, TypeDefEventKind, TypeDefPatch,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// In-memory metadata collection
pub struct InMemoryMetadataCollection {
    originator: EventOriginator,
    /// TypeDefs keyed by guid
    type_defs: RwLock<BTreeMap<String, TypeDef>>,
    /// AttributeTypeDefs keyed by guid
    attribute_type_defs: RwLock<BTreeMap<String, AttributeTypeDef>>,
    events: Mutex<Option<UnboundedSender<TypeDefEvent>>>,
}

impl InMemoryMetadataCollection {
    pub fn new(metadata_collection_id: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self {
            originator: EventOriginator::new(metadata_collection_id, server_name),
            type_defs: RwLock::new(BTreeMap::new()),
            attribute_type_defs: RwLock::new(BTreeMap::new()),
            events: Mutex::new(None),
        }
    }

    /// Announce every change on `sink`
    pub fn with_event_sink(self, sink: UnboundedSender<TypeDefEvent>) -> Self {
        *self.events.lock() = Some(sink);
        self
    }

    /// Stop announcing changes; returns true if a sink was attached
    ///
    /// Dropping the sender lets a receiver drain what was already published
    /// and then observe the end of the stream.
    pub fn detach_event_sink(&self) -> bool {
        self.events.lock().take().is_some()
    }

    /// Originator stamped on published events
    pub fn originator(&self) -> &EventOriginator {
        &self.originator
    }

    /// Add a new TypeDef; guid and name must both be unused
    pub fn add_type_def(&self, type_def: TypeDef) -> Result<()> {
        let (guid, name) = identity(type_def.guid.as_deref(), type_def.name.as_deref())?;
        {
            let mut type_defs = self.type_defs.write();
            if type_defs.contains_key(guid) || self.name_in_use(&type_defs, name) {
                return Err(RepositoryError::TypeDefConflict(format!(
                    "TypeDef {} ({}) already defined",
                    name, guid
                )));
            }
            type_defs.insert(guid.to_string(), type_def.clone());
        }

        self.publish(TypeDefEvent::type_def(
            TypeDefEventKind::NewTypeDef,
            self.originator.clone(),
            type_def,
        ));
        Ok(())
    }

    /// Add a new AttributeTypeDef; guid and name must both be unused
    pub fn add_attribute_type_def(&self, attribute_type_def: AttributeTypeDef) -> Result<()> {
        let (guid, name) = identity(
            attribute_type_def.guid.as_deref(),
            attribute_type_def.name.as_deref(),
        )?;
        {
            let mut attribute_type_defs = self.attribute_type_defs.write();
            let name_taken = attribute_type_defs
                .values()
                .any(|atd| atd.name.as_deref() == Some(name));
            if attribute_type_defs.contains_key(guid) || name_taken {
                return Err(RepositoryError::TypeDefConflict(format!(
                    "AttributeTypeDef {} ({}) already defined",
                    name, guid
                )));
            }
            attribute_type_defs.insert(guid.to_string(), attribute_type_def.clone());
        }

        self.publish(TypeDefEvent::attribute_type_def(
            TypeDefEventKind::NewAttributeTypeDef,
            self.originator.clone(),
            attribute_type_def,
        ));
        Ok(())
    }

    /// Apply a patch to an existing TypeDef and return the new version
    pub fn update_type_def(&self, patch: TypeDefPatch) -> Result<TypeDef> {
        let guid = patch
            .type_def_guid
            .clone()
            .ok_or_else(|| RepositoryError::invalid_parameter("type_def_guid", "missing"))?;

        let patched = {
            let mut type_defs = self.type_defs.write();
            let current = type_defs.get(&guid).ok_or_else(|| {
                RepositoryError::invalid_parameter("type_def_guid", format!("{} not known", guid))
            })?;
            let patched = patch.apply(current).ok_or_else(|| {
                RepositoryError::invalid_parameter(
                    "apply_to_version",
                    format!(
                        "patch targets version {} but {} is at version {}",
                        patch.apply_to_version, guid, current.version
                    ),
                )
            })?;
            type_defs.insert(guid, patched.clone());
            patched
        };

        self.publish(TypeDefEvent::updated(self.originator.clone(), patch));
        Ok(patched)
    }

    /// Remove a TypeDef
    pub fn delete_type_def(&self, guid: &str) -> Result<TypeDef> {
        let removed = self.type_defs.write().remove(guid).ok_or_else(|| {
            RepositoryError::invalid_parameter("guid", format!("{} not known", guid))
        })?;

        self.publish(TypeDefEvent::type_def(
            TypeDefEventKind::DeletedTypeDef,
            self.originator.clone(),
            removed.clone(),
        ));
        Ok(removed)
    }

    /// Give an existing TypeDef a new guid and name
    pub fn re_identify_type_def(
        &self,
        guid: &str,
        new_guid: impl Into<String>,
        new_name: impl Into<String>,
    ) -> Result<TypeDef> {
        let new_guid = new_guid.into();
        let new_name = new_name.into();

        let (original, renamed) = {
            let mut type_defs = self.type_defs.write();
            if type_defs.contains_key(&new_guid) || self.name_in_use(&type_defs, &new_name) {
                return Err(RepositoryError::TypeDefConflict(format!(
                    "TypeDef {} ({}) already defined",
                    new_name, new_guid
                )));
            }
            let original = type_defs.remove(guid).ok_or_else(|| {
                RepositoryError::invalid_parameter("guid", format!("{} not known", guid))
            })?;
            let mut renamed = original.clone();
            renamed.guid = Some(new_guid.clone());
            renamed.name = Some(new_name);
            type_defs.insert(new_guid, renamed.clone());
            (original, renamed)
        };

        let mut event = TypeDefEvent::type_def(
            TypeDefEventKind::ReIdentifiedTypeDef,
            self.originator.clone(),
            renamed.clone(),
        );
        event.original_guid = original.guid;
        event.original_name = original.name;
        self.publish(event);
        Ok(renamed)
    }

    fn name_in_use(&self, type_defs: &BTreeMap<String, TypeDef>, name: &str) -> bool {
        type_defs.values().any(|td| td.name.as_deref() == Some(name))
    }

    fn publish(&self, event: TypeDefEvent) {
        if let Some(sink) = self.events.lock().as_ref() {
            if sink.send(event).is_err() {
                debug!(
                    server = ?self.originator.server_name,
                    "Event sink closed, dropping type definition event"
                );
            }
        }
    }
}

fn identity<'a>(guid: Option<&'a str>, name: Option<&'a str>) -> Result<(&'a str, &'a str)> {
    let guid = guid
        .filter(|g| !g.is_empty())
        .ok_or_else(|| RepositoryError::invalid_parameter("guid", "missing"))?;
    let name = name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| RepositoryError::invalid_parameter("name", "missing"))?;
    Ok((guid, name))
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn require(parameter: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(RepositoryError::invalid_parameter(parameter, "must not be empty"));
    }
    Ok(())
}

#[async_trait]
impl MetadataCollection for InMemoryMetadataCollection {
    async fn get_type_def_by_guid(&self, _user_id: &str, guid: &str) -> Result<Option<TypeDef>> {
        require("guid", guid)?;
        Ok(self.type_defs.read().get(guid).cloned())
    }

    async fn get_type_def_by_name(&self, _user_id: &str, name: &str) -> Result<Option<TypeDef>> {
        require("name", name)?;
        Ok(self
            .type_defs
            .read()
            .values()
            .find(|td| td.name.as_deref() == Some(name))
            .cloned())
    }

    async fn get_attribute_type_def_by_guid(
        &self,
        _user_id: &str,
        guid: &str,
    ) -> Result<Option<AttributeTypeDef>> {
        require("guid", guid)?;
        Ok(self.attribute_type_defs.read().get(guid).cloned())
    }

    async fn get_attribute_type_def_by_name(
        &self,
        _user_id: &str,
        name: &str,
    ) -> Result<Option<AttributeTypeDef>> {
        require("name", name)?;
        Ok(self
            .attribute_type_defs
            .read()
            .values()
            .find(|atd| atd.name.as_deref() == Some(name))
            .cloned())
    }

    async fn find_type_defs_by_category(
        &self,
        _user_id: &str,
        category: TypeDefCategory,
    ) -> Result<Option<Vec<TypeDef>>> {
        let found = self
            .type_defs
            .read()
            .values()
            .filter(|td| td.category() == Some(category))
            .cloned()
            .collect();
        Ok(non_empty(found))
    }

    async fn find_attribute_type_defs_by_category(
        &self,
        _user_id: &str,
        category: AttributeTypeDefCategory,
    ) -> Result<Option<Vec<AttributeTypeDef>>> {
        let found = self
            .attribute_type_defs
            .read()
            .values()
            .filter(|atd| atd.category() == Some(category))
            .cloned()
            .collect();
        Ok(non_empty(found))
    }

    async fn get_all_types(&self, _user_id: &str) -> Result<Option<TypeDefGallery>> {
        let gallery = TypeDefGallery {
            type_defs: self.type_defs.read().values().cloned().collect(),
            attribute_type_defs: self.attribute_type_defs.read().values().cloned().collect(),
        };
        Ok(if gallery.is_empty() { None } else { Some(gallery) })
    }

    async fn find_types_by_external_id(
        &self,
        _user_id: &str,
        standard: Option<&str>,
        organization: Option<&str>,
        identifier: Option<&str>,
    ) -> Result<Option<Vec<TypeDef>>> {
        if standard.is_none() && organization.is_none() && identifier.is_none() {
            return Err(RepositoryError::invalid_parameter(
                "standard",
                "at least one of standard, organization or identifier is required",
            ));
        }

        let dimension_matches = |field: &Option<String>, wanted: Option<&str>| match wanted {
            Some(wanted) => field.as_deref() == Some(wanted),
            None => true,
        };

        let found = self
            .type_defs
            .read()
            .values()
            .filter(|td| {
                td.all_external_mappings().any(|m| {
                    dimension_matches(&m.standard_name, standard)
                        && dimension_matches(&m.standard_organization, organization)
                        && dimension_matches(&m.standard_type_name, identifier)
                })
            })
            .cloned()
            .collect();
        Ok(non_empty(found))
    }

    async fn find_types_by_name(&self, _user_id: &str, name: &str) -> Result<Option<TypeDefGallery>> {
        require("name", name)?;
        let gallery = TypeDefGallery {
            type_defs: self
                .type_defs
                .read()
                .values()
                .filter(|td| td.name.as_deref() == Some(name))
                .cloned()
                .collect(),
            attribute_type_defs: self
                .attribute_type_defs
                .read()
                .values()
                .filter(|atd| atd.name.as_deref() == Some(name))
                .cloned()
                .collect(),
        };
        Ok(if gallery.is_empty() { None } else { Some(gallery) })
    }

    async fn verify_type_def(&self, _user_id: &str, type_def: &TypeDef) -> Result<bool> {
        let (guid, name) = identity(type_def.guid.as_deref(), type_def.name.as_deref())?;
        let type_defs = self.type_defs.read();
        match type_defs.values().find(|td| td.name.as_deref() == Some(name)) {
            None => Ok(false),
            Some(known) if known.guid.as_deref() != Some(guid) => {
                Err(RepositoryError::TypeDefConflict(format!(
                    "{} is known with guid {:?}, not {}",
                    name, known.guid, guid
                )))
            }
            Some(known) => Ok(known.version == type_def.version),
        }
    }

    async fn verify_attribute_type_def(
        &self,
        _user_id: &str,
        attribute_type_def: &AttributeTypeDef,
    ) -> Result<bool> {
        let (guid, name) = identity(
            attribute_type_def.guid.as_deref(),
            attribute_type_def.name.as_deref(),
        )?;
        let attribute_type_defs = self.attribute_type_defs.read();
        match attribute_type_defs
            .values()
            .find(|atd| atd.name.as_deref() == Some(name))
        {
            None => Ok(false),
            Some(known) if known.guid.as_deref() != Some(guid) => {
                Err(RepositoryError::TypeDefConflict(format!(
                    "{} is known with guid {:?}, not {}",
                    name, known.guid, guid
                )))
            }
            Some(known) => Ok(known == attribute_type_def),
        }
    }
}
