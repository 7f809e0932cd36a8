//! Hierarchical model matrices
//!
//! Each entity caches two world matrices: one in its render layer's
//! resolution (for drawing) and one in the virtual resolution (for
//! hit-testing). They are recomputed lazily after any change to the entity
//! or one of its ancestors.
//!
//! ## Composition
//!
//! ```text
//! local  = T(position + jump) · R(angle) · T(-pivot · scaled size) · S(scale · area)
//! sprite = T(sprite offset) · R(sprite angle) · S(sprite scale)
//! world  = P_n · … · P_1 · local · sprite
//! ```
//!
//! where `P_i` are the ancestors' local matrices (without area scaling).
//! Positions and sizes are multiplied by the resolution factor of the space
//! being computed.

use slotmap::SecondaryMap;

use super::lock_step::LockStep;
use crate::ecs::components::Capabilities;
use crate::ecs::Entity;
use crate::events::SceneEvent;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec2};
use crate::scene::Scene;

/// The pair of world matrices of one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelMatrices {
    /// World matrix in the render layer's resolution
    pub in_object_resolution: Mat4,
    /// World matrix in the virtual resolution
    pub in_virtual_resolution: Mat4,
}

impl Default for ModelMatrices {
    fn default() -> Self {
        Self::identity()
    }
}

impl ModelMatrices {
    /// Both matrices identity
    pub fn identity() -> Self {
        Self {
            in_object_resolution: Mat4::identity(),
            in_virtual_resolution: Mat4::identity(),
        }
    }
}

/// Per-entity matrix cache
pub type ModelMatrixComponent = LockStep<ModelMatrices>;

/// Local matrix of an entity: scale, then pivot offset, then rotation, then translation
///
/// `area` multiplies the scale (room scaling areas); `factor` maps virtual
/// coordinates into the target resolution. Without [`Scale`] the local matrix
/// is identity.
///
/// [`Scale`]: crate::ecs::components::Scale
pub fn local_matrix(caps: &Capabilities, area: Vec2, factor: Vec2) -> Mat4 {
    let Some(scale) = caps.scale else {
        return Mat4::identity();
    };

    let scale_x = scale.scale_x * area.x;
    let scale_y = scale.scale_y * area.y;
    let pivot = caps.image.map_or_else(Vec2::zeros, |image| image.pivot);
    let pivot_x = pivot.x * scale.width * factor.x * scale_x;
    let pivot_y = pivot.y * scale.height * factor.y * scale_y;

    let (x, y) = caps.translate.map_or((0.0, 0.0), |t| (t.x, t.y));
    let jump = caps.jump_offset.map_or_else(Vec2::zeros, |j| j.offset);
    let angle = caps.rotate.map_or(0.0, |r| r.angle);

    Mat4::translation_2d((x + jump.x) * factor.x, (y + jump.y) * factor.y)
        * Mat4::rotation_z(utils::deg_to_rad(angle))
        * Mat4::translation_2d(-pivot_x, -pivot_y)
        * Mat4::scaling_2d(scale_x, scale_y)
}

/// Transform of the current animation frame, applied before the entity's local matrix
pub fn sprite_matrix(caps: &Capabilities, factor: Vec2) -> Mat4 {
    let Some(sprite) = caps.image.and_then(|image| image.current_sprite) else {
        return Mat4::identity();
    };
    Mat4::translation_2d(sprite.x * factor.x, sprite.y * factor.y)
        * Mat4::rotation_z(utils::deg_to_rad(sprite.angle))
        * Mat4::scaling_2d(sprite.scale_x, sprite.scale_y)
}

impl Scene {
    /// Up-to-date model matrices of an entity (the pre-lock snapshot while locked)
    ///
    /// Unknown entities yield identity matrices.
    pub fn model_matrices(&mut self, entity: Entity) -> ModelMatrices {
        self.sync();
        if !self.world.contains(entity) {
            return ModelMatrices::identity();
        }

        let needs_recompute = self.matrices.get(entity).map_or(true, LockStep::needs_recompute);
        if needs_recompute {
            let computed = self.compute_model_matrices(entity);
            cache_entry(&mut self.matrices, entity).publish(computed);
        }
        self.matrices
            .get(entity)
            .and_then(|cache| cache.current().copied())
            .unwrap_or_default()
    }

    /// Compute both matrices from the current capabilities, bypassing the cache
    pub(crate) fn compute_model_matrices(&self, entity: Entity) -> ModelMatrices {
        let Some(caps) = self.world.capabilities(entity) else {
            return ModelMatrices::identity();
        };
        if caps.scale.is_none() {
            return ModelMatrices::identity();
        }

        let (_, layer) = self.layer_of(entity);
        let render_factor = layer.resolution_factor(self.settings.virtual_resolution);
        let unit = Vec2::new(1.0, 1.0);
        let area = self.area_scaling(entity, caps);

        let in_virtual_resolution = self.world_matrix(entity, caps, area, unit);
        let in_object_resolution = if render_factor == unit {
            in_virtual_resolution
        } else {
            self.world_matrix(entity, caps, area, render_factor)
        };
        ModelMatrices {
            in_object_resolution,
            in_virtual_resolution,
        }
    }

    fn world_matrix(&self, entity: Entity, caps: &Capabilities, area: Vec2, factor: Vec2) -> Mat4 {
        let unit = Vec2::new(1.0, 1.0);
        let mut matrix = local_matrix(caps, area, factor) * sprite_matrix(caps, factor);
        for ancestor in self.world.ancestors(entity) {
            if let Some(parent_caps) = self.world.capabilities(ancestor) {
                matrix = local_matrix(parent_caps, unit, factor) * matrix;
            }
        }
        matrix
    }

    /// Room scaling-area factor for an entity
    ///
    /// Only room-level entities (roots that are neither UI nor cursor) are
    /// scaled, and only when they do not opt out.
    fn area_scaling(&self, entity: Entity, caps: &Capabilities) -> Vec2 {
        let unit = Vec2::new(1.0, 1.0);
        let ignores = caps.drawable.map_or(false, |d| d.ignore_scaling_area);
        if ignores
            || self.world.parent(entity).is_some()
            || self.ui.contains(&entity)
            || self.cursor == Some(entity)
        {
            return unit;
        }
        let Some(translate) = caps.translate else {
            return unit;
        };
        self.room.scaling_at(Vec2::new(translate.x, translate.y))
    }

    /// Flag an entity's matrices stale and propagate to its subtree
    ///
    /// While the entity is locked the notification and the propagation are
    /// deferred to the final unlock.
    pub(crate) fn mark_matrix_dirty(&mut self, entity: Entity) {
        if !self.world.contains(entity) {
            return;
        }
        if cache_entry(&mut self.matrices, entity).mark_dirty() {
            self.notify_matrix_changed(entity);
        }
    }

    /// Announce a matrix change: bounds go stale and children follow
    pub(crate) fn notify_matrix_changed(&mut self, entity: Entity) {
        self.events.send(SceneEvent::ModelMatrixChanged(entity));
        self.mark_bounds_dirty(entity);
        let children = self.world.children(entity).to_vec();
        for child in children {
            self.mark_matrix_dirty(child);
        }
    }
}

/// Cache slot of an entity, created dirty on first use
pub(crate) fn cache_entry<T: Clone>(
    map: &mut SecondaryMap<Entity, LockStep<T>>,
    entity: Entity,
) -> &mut LockStep<T> {
    if !map.contains_key(entity) {
        map.insert(entity, LockStep::new());
    }
    &mut map[entity]
}
