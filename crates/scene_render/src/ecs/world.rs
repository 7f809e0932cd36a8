//! Entity world: records, tree relation and change tracking

use std::collections::HashMap;

use bitflags::bitflags;
use log::{debug, trace};
use slotmap::SlotMap;

use super::components::Capabilities;
use super::Entity;
use crate::scene::SceneError;

bitflags! {
    /// Which derived data a property change invalidates
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeFlags: u8 {
        /// Model matrices of the entity and its subtree
        const MATRIX = 1 << 0;
        /// Bounding boxes of the entity
        const BOUNDS = 1 << 1;
        /// Visibility of the entity (and thus its parent's containing box)
        const VISIBILITY = 1 << 2;
    }
}

/// A recorded mutation, drained by the scene to invalidate caches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyChange {
    /// Capabilities or visibility of an entity changed
    Changed {
        /// Changed entity
        entity: Entity,
        /// What the change invalidates
        flags: ChangeFlags,
    },
    /// An entity moved to a different parent
    Reparented {
        /// Moved entity
        entity: Entity,
        /// Parent before the move
        previous_parent: Option<Entity>,
    },
    /// An entity was removed
    Removed {
        /// Removed entity (no longer valid)
        entity: Entity,
        /// Parent at the time of removal
        parent: Option<Entity>,
    },
}

/// Everything the world stores for one entity
#[derive(Debug, Clone)]
pub struct EntityRecord {
    id: String,
    /// Optional capability components
    pub capabilities: Capabilities,
    parent: Option<Entity>,
    children: Vec<Entity>,
    visible: bool,
}

impl EntityRecord {
    /// Stable string id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parent entity, if attached
    pub fn parent(&self) -> Option<Entity> {
        self.parent
    }

    /// Attached children in insertion order
    pub fn children(&self) -> &[Entity] {
        &self.children
    }

    /// Own visibility flag (ancestors not considered)
    pub fn visible(&self) -> bool {
        self.visible
    }
}

/// Owner of all entities
#[derive(Debug, Default)]
pub struct World {
    entities: SlotMap<Entity, EntityRecord>,
    by_id: HashMap<String, Entity>,
    changes: Vec<PropertyChange>,
}

impl World {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a visible root entity with a unique id
    pub fn spawn(
        &mut self,
        id: impl Into<String>,
        capabilities: Capabilities,
    ) -> Result<Entity, SceneError> {
        let id = id.into();
        if self.by_id.contains_key(&id) {
            return Err(SceneError::DuplicateId(id));
        }
        let entity = self.entities.insert(EntityRecord {
            id: id.clone(),
            capabilities,
            parent: None,
            children: Vec::new(),
            visible: true,
        });
        trace!("Spawned entity '{}' as {:?}", id, entity);
        self.by_id.insert(id, entity);
        Ok(entity)
    }

    /// Remove an entity; its children become roots
    pub fn despawn(&mut self, entity: Entity) -> Result<(), SceneError> {
        let record = self
            .entities
            .remove(entity)
            .ok_or(SceneError::UnknownEntity(entity))?;
        self.by_id.remove(&record.id);

        if let Some(parent) = record.parent.and_then(|p| self.entities.get_mut(p)) {
            parent.children.retain(|&c| c != entity);
        }
        for child in record.children {
            if let Some(child_record) = self.entities.get_mut(child) {
                child_record.parent = None;
                self.changes.push(PropertyChange::Reparented {
                    entity: child,
                    previous_parent: Some(entity),
                });
            }
        }
        self.changes.push(PropertyChange::Removed {
            entity,
            parent: record.parent,
        });
        debug!("Despawned entity '{}'", record.id);
        Ok(())
    }

    /// Whether the handle refers to a live entity
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the world has no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All live entity handles
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys()
    }

    /// Look up an entity by its stable id
    pub fn find(&self, id: &str) -> Option<Entity> {
        self.by_id.get(id).copied()
    }

    /// Full record of an entity
    pub fn get(&self, entity: Entity) -> Option<&EntityRecord> {
        self.entities.get(entity)
    }

    /// Stable id of an entity
    pub fn id(&self, entity: Entity) -> Option<&str> {
        self.entities.get(entity).map(|r| r.id.as_str())
    }

    /// Capabilities of an entity
    pub fn capabilities(&self, entity: Entity) -> Option<&Capabilities> {
        self.entities.get(entity).map(|r| &r.capabilities)
    }

    /// Parent of an entity
    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        self.entities.get(entity).and_then(|r| r.parent)
    }

    /// Children of an entity (empty for unknown entities)
    pub fn children(&self, entity: Entity) -> &[Entity] {
        self.entities
            .get(entity)
            .map_or(&[][..], |r| r.children.as_slice())
    }

    /// Ancestors, nearest first
    pub fn ancestors(&self, entity: Entity) -> Vec<Entity> {
        let mut chain = Vec::new();
        let mut current = self.parent(entity);
        while let Some(ancestor) = current {
            chain.push(ancestor);
            current = self.parent(ancestor);
        }
        chain
    }

    /// Topmost ancestor (the entity itself for roots)
    pub fn root(&self, entity: Entity) -> Entity {
        self.ancestors(entity).last().copied().unwrap_or(entity)
    }

    /// Whether `ancestor` is a strict ancestor of `entity`
    pub fn is_ancestor_of(&self, ancestor: Entity, entity: Entity) -> bool {
        let mut current = self.parent(entity);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// Subtree below `entity` in depth-first pre-order (excluding `entity`)
    pub fn descendants(&self, entity: Entity) -> Vec<Entity> {
        let mut result = Vec::new();
        let mut stack: Vec<Entity> = self.children(entity).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            result.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        result
    }

    /// Effective visibility: the entity and every ancestor are visible
    pub fn is_visible(&self, entity: Entity) -> bool {
        let Some(record) = self.entities.get(entity) else {
            return false;
        };
        record.visible && self.ancestors(entity).iter().all(|&a| self.is_own_visible(a))
    }

    fn is_own_visible(&self, entity: Entity) -> bool {
        self.entities.get(entity).map_or(false, |r| r.visible)
    }

    /// Show or hide an entity
    pub fn set_visible(&mut self, entity: Entity, visible: bool) -> Result<(), SceneError> {
        let record = self
            .entities
            .get_mut(entity)
            .ok_or(SceneError::UnknownEntity(entity))?;
        if record.visible != visible {
            record.visible = visible;
            self.changes.push(PropertyChange::Changed {
                entity,
                flags: ChangeFlags::VISIBILITY,
            });
        }
        Ok(())
    }

    /// Attach `entity` under `parent`, or detach it with `None`
    ///
    /// Rejects any link that would make an entity its own ancestor.
    pub fn set_parent(&mut self, entity: Entity, parent: Option<Entity>) -> Result<(), SceneError> {
        if !self.contains(entity) {
            return Err(SceneError::UnknownEntity(entity));
        }
        if let Some(new_parent) = parent {
            if !self.contains(new_parent) {
                return Err(SceneError::UnknownEntity(new_parent));
            }
            if new_parent == entity || self.is_ancestor_of(entity, new_parent) {
                return Err(SceneError::CyclicParent {
                    child: entity,
                    parent: new_parent,
                });
            }
        }

        let previous_parent = self.parent(entity);
        if previous_parent == parent {
            return Ok(());
        }
        if let Some(old) = previous_parent.and_then(|p| self.entities.get_mut(p)) {
            old.children.retain(|&c| c != entity);
        }
        if let Some(new) = parent.and_then(|p| self.entities.get_mut(p)) {
            new.children.push(entity);
        }
        if let Some(record) = self.entities.get_mut(entity) {
            record.parent = parent;
        }
        self.changes.push(PropertyChange::Reparented {
            entity,
            previous_parent,
        });
        Ok(())
    }

    /// Mutate an entity's capabilities
    ///
    /// The closure's effect is diffed against the previous state and the
    /// matching change is recorded; a closure that changes nothing records
    /// nothing.
    pub fn update<F>(&mut self, entity: Entity, f: F) -> Result<(), SceneError>
    where
        F: FnOnce(&mut Capabilities),
    {
        let record = self
            .entities
            .get_mut(entity)
            .ok_or(SceneError::UnknownEntity(entity))?;
        let before = record.capabilities;
        f(&mut record.capabilities);
        let flags = Self::diff(&before, &record.capabilities);
        if !flags.is_empty() {
            self.changes.push(PropertyChange::Changed { entity, flags });
        }
        Ok(())
    }

    fn diff(before: &Capabilities, after: &Capabilities) -> ChangeFlags {
        let mut flags = ChangeFlags::empty();
        if before.translate != after.translate
            || before.rotate != after.rotate
            || before.image != after.image
            || before.jump_offset != after.jump_offset
        {
            flags |= ChangeFlags::MATRIX;
        }
        if before.scale != after.scale || before.drawable != after.drawable {
            flags |= ChangeFlags::MATRIX | ChangeFlags::BOUNDS;
        }
        if before.crop != after.crop {
            flags |= ChangeFlags::BOUNDS;
        }
        flags
    }

    /// Drain recorded changes in mutation order
    pub fn take_changes(&mut self) -> Vec<PropertyChange> {
        std::mem::take(&mut self.changes)
    }

    /// Whether changes are waiting to be drained
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}
