//! Containing box of an entity and its visible descendants

use std::collections::HashSet;

use super::bounding_box::AABB;
use super::lock_step::LockStep;
use super::viewport::ViewportId;
use crate::ecs::Entity;
use crate::events::SceneEvent;
use crate::scene::{Scene, SceneError};

/// Per-entity containing-box cache
///
/// The box is the union of the entity's own hit-test box and the containing
/// boxes of its visible children, in virtual coordinates. Children listed in
/// the skip set are left out together with their subtrees.
#[derive(Debug, Clone, Default)]
pub struct BoundingBoxWithChildrenComponent {
    skip: HashSet<Entity>,
    cache: LockStep<Option<AABB>>,
}

impl BoundingBoxWithChildrenComponent {
    fn new() -> Self {
        Self {
            skip: HashSet::new(),
            cache: LockStep::new(),
        }
    }

    /// Descendants excluded from the box
    pub fn skipped(&self) -> &HashSet<Entity> {
        &self.skip
    }

    pub(crate) fn lock(&mut self) {
        self.cache.lock();
    }

    pub(crate) fn unlock(&mut self) -> bool {
        self.cache.unlock()
    }
}

impl Scene {
    /// Box around an entity and its visible descendants, in virtual coordinates
    ///
    /// `None` when neither the entity nor any included descendant has a size.
    pub fn bounding_box_with_children(&mut self, entity: Entity) -> Option<AABB> {
        self.sync();
        if !self.world.contains(entity) {
            return None;
        }
        let needs_recompute = self
            .with_children
            .get(entity)
            .map_or(true, |component| component.cache.needs_recompute());
        if needs_recompute {
            let computed = self.compute_with_children(entity);
            self.with_children_entry(entity).cache.publish(computed);
        }
        self.with_children
            .get(entity)
            .and_then(|component| component.cache.current().copied())
            .flatten()
    }

    fn compute_with_children(&mut self, entity: Entity) -> Option<AABB> {
        let own = self.hit_test_box(entity).map(|quad| quad.aabb());
        let children = self.included_children(entity);
        children.into_iter().fold(own, |acc, child| {
            match (acc, self.bounding_box_with_children(child)) {
                (Some(a), Some(b)) => Some(a.union(&b)),
                (a, b) => a.or(b),
            }
        })
    }

    /// Same box as seen through a viewport (render quads, computed on demand)
    pub fn screen_bounding_box_with_children(
        &mut self,
        entity: Entity,
        viewport: ViewportId,
    ) -> Option<AABB> {
        self.sync();
        if !self.world.contains(entity) {
            return None;
        }
        let own = self
            .bounding_boxes(entity, viewport)
            .map(|boxes| boxes.render.aabb());
        let children = self.included_children(entity);
        children.into_iter().fold(own, |acc, child| {
            match (acc, self.screen_bounding_box_with_children(child, viewport)) {
                (Some(a), Some(b)) => Some(a.union(&b)),
                (a, b) => a.or(b),
            }
        })
    }

    fn included_children(&self, entity: Entity) -> Vec<Entity> {
        let skip = self.with_children.get(entity).map(|component| &component.skip);
        self.world
            .children(entity)
            .iter()
            .copied()
            .filter(|child| skip.map_or(true, |skip| !skip.contains(child)))
            .filter(|&child| self.world.get(child).map_or(false, |record| record.visible()))
            .collect()
    }

    /// Exclude (or re-include) `skipped` from `entity`'s containing box
    pub fn set_skip_in_children_box(
        &mut self,
        entity: Entity,
        skipped: Entity,
        skip: bool,
    ) -> Result<(), SceneError> {
        if !self.world.contains(entity) {
            return Err(SceneError::UnknownEntity(entity));
        }
        let component = self.with_children_entry(entity);
        let changed = if skip {
            component.skip.insert(skipped)
        } else {
            component.skip.remove(&skipped)
        };
        if changed {
            self.mark_with_children_dirty(entity);
        }
        Ok(())
    }

    /// Flag the containing boxes of an entity and all its ancestors stale
    pub(crate) fn mark_with_children_dirty(&mut self, entity: Entity) {
        if !self.world.contains(entity) {
            return;
        }
        let chain: Vec<Entity> = std::iter::once(entity)
            .chain(self.world.ancestors(entity))
            .collect();
        for link in chain {
            if self.with_children_entry(link).cache.mark_dirty() {
                self.events.send(SceneEvent::BoundingBoxWithChildrenChanged(link));
            }
        }
    }

    fn with_children_entry(&mut self, entity: Entity) -> &mut BoundingBoxWithChildrenComponent {
        if !self.with_children.contains_key(entity) {
            self.with_children
                .insert(entity, BoundingBoxWithChildrenComponent::new());
        }
        &mut self.with_children[entity]
    }
}
