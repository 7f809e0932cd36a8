//! The scene: world, layers, viewports, room and derived caches

use std::sync::{Arc, RwLock};

use log::{debug, trace};
use slotmap::{SecondaryMap, SlotMap};

use super::{Room, SceneError};
use crate::config::RenderSettings;
use crate::ecs::components::{Capabilities, Translate};
use crate::ecs::{ChangeFlags, Entity, PropertyChange, World};
use crate::events::{EventSystem, SceneEvent};
use crate::foundation::math::Point2;
use crate::render::bounding_box::BoundingBoxComponent;
use crate::render::bounding_box_children::BoundingBoxWithChildrenComponent;
use crate::render::layer::{LayerId, RenderLayer};
use crate::render::model_matrix::ModelMatrixComponent;
use crate::render::viewport::{Viewport, ViewportId, ViewportMatrixCache};

/// A scene shared between gameplay workers and the render pipeline
pub type SharedScene = Arc<RwLock<Scene>>;

/// Owner of the entity world and every cache derived from it
///
/// Mutations go through the [`World`] (directly via [`Scene::world_mut`] or
/// the convenience wrappers below) and are folded into the caches by
/// [`Scene::sync`], which every query runs first.
#[derive(Debug)]
pub struct Scene {
    pub(crate) world: World,
    pub(crate) settings: RenderSettings,
    pub(crate) layers: SlotMap<LayerId, RenderLayer>,
    pub(crate) default_layer: LayerId,
    pub(crate) viewports: SlotMap<ViewportId, Viewport>,
    pub(crate) viewport_order: Vec<ViewportId>,
    pub(crate) main_viewport: ViewportId,
    pub(crate) room: Room,
    pub(crate) ui: Vec<Entity>,
    pub(crate) cursor: Option<Entity>,
    pub(crate) player: Option<Entity>,
    pub(crate) mouse_position: Point2,
    pub(crate) matrices: SecondaryMap<Entity, ModelMatrixComponent>,
    pub(crate) bounds: SecondaryMap<Entity, BoundingBoxComponent>,
    pub(crate) with_children: SecondaryMap<Entity, BoundingBoxWithChildrenComponent>,
    pub(crate) viewport_matrices: ViewportMatrixCache,
    pub(crate) events: EventSystem,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(RenderSettings::default())
    }
}

impl Scene {
    /// Create a scene with one default layer (z 0) and one main viewport
    pub fn new(settings: RenderSettings) -> Self {
        let mut layers = SlotMap::with_key();
        let default_layer = layers.insert(RenderLayer::default());
        let mut viewports = SlotMap::with_key();
        let main_viewport = viewports.insert(Viewport::default());

        Self {
            world: World::new(),
            settings,
            layers,
            default_layer,
            viewports,
            viewport_order: vec![main_viewport],
            main_viewport,
            room: Room::default(),
            ui: Vec::new(),
            cursor: None,
            player: None,
            mouse_position: Point2::origin(),
            matrices: SecondaryMap::new(),
            bounds: SecondaryMap::new(),
            with_children: SecondaryMap::new(),
            viewport_matrices: ViewportMatrixCache::new(),
            events: EventSystem::new(),
        }
    }

    /// Wrap the scene for sharing with worker threads
    pub fn into_shared(self) -> SharedScene {
        Arc::new(RwLock::new(self))
    }

    /// Render settings
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Replace the render settings
    pub fn set_settings(&mut self, settings: RenderSettings) {
        let resolution_changed = settings.virtual_resolution != self.settings.virtual_resolution;
        self.settings = settings;
        if resolution_changed {
            self.mark_all_dirty();
        }
    }

    // ---------------------------------------------------------------------
    // Entities
    // ---------------------------------------------------------------------

    /// The entity world
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access to the entity world; changes are picked up on the next query
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Create a root entity
    pub fn spawn(
        &mut self,
        id: impl Into<String>,
        capabilities: Capabilities,
    ) -> Result<Entity, SceneError> {
        self.world.spawn(id, capabilities)
    }

    /// Remove an entity and every scene reference to it
    pub fn despawn(&mut self, entity: Entity) -> Result<(), SceneError> {
        self.world.despawn(entity)?;
        self.room.objects.retain(|&e| e != entity);
        if self.room.background == Some(entity) {
            self.room.background = None;
        }
        for area in &mut self.room.areas {
            if area.debug_draw == Some(entity) {
                area.debug_draw = None;
            }
            if area.walk_behind.map(|w| w.drawable) == Some(entity) {
                area.walk_behind = None;
            }
        }
        self.ui.retain(|&e| e != entity);
        if self.cursor == Some(entity) {
            self.cursor = None;
        }
        if self.player == Some(entity) {
            self.player = None;
        }
        self.sync();
        Ok(())
    }

    /// Attach `entity` under `parent` (or detach with `None`)
    pub fn set_parent(&mut self, entity: Entity, parent: Option<Entity>) -> Result<(), SceneError> {
        self.world.set_parent(entity, parent)
    }

    /// Mutate an entity's capabilities
    pub fn update<F>(&mut self, entity: Entity, f: F) -> Result<(), SceneError>
    where
        F: FnOnce(&mut Capabilities),
    {
        self.world.update(entity, f)
    }

    /// Show or hide an entity
    pub fn set_visible(&mut self, entity: Entity, visible: bool) -> Result<(), SceneError> {
        self.world.set_visible(entity, visible)
    }

    // ---------------------------------------------------------------------
    // Layers
    // ---------------------------------------------------------------------

    /// Register a render layer
    pub fn add_layer(&mut self, layer: RenderLayer) -> LayerId {
        self.layers.insert(layer)
    }

    /// Look up a render layer
    pub fn layer(&self, id: LayerId) -> Option<&RenderLayer> {
        self.layers.get(id)
    }

    /// Mutate a render layer; every entity is re-derived
    pub fn update_layer<F>(&mut self, id: LayerId, f: F) -> Result<(), SceneError>
    where
        F: FnOnce(&mut RenderLayer),
    {
        let layer = self.layers.get_mut(id).ok_or(SceneError::UnknownLayer(id))?;
        let before = *layer;
        f(layer);
        if *layer != before {
            debug!("Render layer {:?} changed, invalidating all entities", id);
            self.mark_all_dirty();
        }
        Ok(())
    }

    /// Layer used by entities that neither set nor inherit one
    pub fn default_layer(&self) -> LayerId {
        self.default_layer
    }

    /// Change the default layer
    pub fn set_default_layer(&mut self, id: LayerId) -> Result<(), SceneError> {
        if !self.layers.contains_key(id) {
            return Err(SceneError::UnknownLayer(id));
        }
        if self.default_layer != id {
            self.default_layer = id;
            self.mark_all_dirty();
        }
        Ok(())
    }

    /// Own layer, else the nearest ancestor's, else the default layer
    pub fn effective_layer(&self, entity: Entity) -> LayerId {
        let own = std::iter::once(entity).chain(self.world.ancestors(entity));
        for candidate in own {
            let layer = self
                .world
                .capabilities(candidate)
                .and_then(|caps| caps.drawable)
                .and_then(|drawable| drawable.render_layer)
                .filter(|id| self.layers.contains_key(*id));
            if let Some(layer) = layer {
                return layer;
            }
        }
        self.default_layer
    }

    /// Effective layer id and a copy of its settings
    pub(crate) fn layer_of(&self, entity: Entity) -> (LayerId, RenderLayer) {
        let id = self.effective_layer(entity);
        (id, self.layers.get(id).copied().unwrap_or_default())
    }

    // ---------------------------------------------------------------------
    // Viewports
    // ---------------------------------------------------------------------

    /// Register a viewport (rendered after the existing ones)
    pub fn add_viewport(&mut self, viewport: Viewport) -> ViewportId {
        let id = self.viewports.insert(viewport);
        self.viewport_order.push(id);
        id
    }

    /// Look up a viewport
    pub fn viewport(&self, id: ViewportId) -> Option<&Viewport> {
        self.viewports.get(id)
    }

    /// Mutate a viewport; dependent boxes refresh on the next query
    pub fn update_viewport<F>(&mut self, id: ViewportId, f: F) -> Result<(), SceneError>
    where
        F: FnOnce(&mut Viewport),
    {
        let viewport = self
            .viewports
            .get_mut(id)
            .ok_or(SceneError::UnknownViewport(id))?;
        f(viewport);
        Ok(())
    }

    /// Remove a secondary viewport
    pub fn remove_viewport(&mut self, id: ViewportId) -> Result<(), SceneError> {
        if id == self.main_viewport {
            return Err(SceneError::MainViewportRemoval);
        }
        self.viewports
            .remove(id)
            .ok_or(SceneError::UnknownViewport(id))?;
        self.viewport_order.retain(|&v| v != id);
        self.viewport_matrices.remove_viewport(id);
        Ok(())
    }

    /// The viewport the cursor and hit-testing default to
    pub fn main_viewport(&self) -> ViewportId {
        self.main_viewport
    }

    /// Choose the main viewport
    pub fn set_main_viewport(&mut self, id: ViewportId) -> Result<(), SceneError> {
        if !self.viewports.contains_key(id) {
            return Err(SceneError::UnknownViewport(id));
        }
        self.main_viewport = id;
        Ok(())
    }

    /// Viewports in render order
    pub fn viewport_ids(&self) -> &[ViewportId] {
        &self.viewport_order
    }

    // ---------------------------------------------------------------------
    // Room, UI, cursor
    // ---------------------------------------------------------------------

    /// The current room
    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Mutate the current room
    ///
    /// Walk-behind baselines are copied into their drawables' z, and any
    /// change to the areas re-derives every entity.
    pub fn update_room<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Room),
    {
        let areas_before = self.room.areas.clone();
        f(&mut self.room);

        let walk_behinds: Vec<_> = self.room.areas.iter().filter_map(|a| a.walk_behind).collect();
        for walk_behind in walk_behinds {
            let baseline = walk_behind.baseline;
            let synced = self.world.update(walk_behind.drawable, |caps| {
                let translate = caps.translate.get_or_insert_with(Translate::default);
                translate.z = Some(baseline);
            });
            if synced.is_err() {
                debug!("Walk-behind drawable {:?} no longer exists", walk_behind.drawable);
            }
        }

        if self.room.areas != areas_before {
            self.mark_all_dirty();
        }
    }

    /// Replace the current room
    pub fn set_room(&mut self, room: Room) {
        self.update_room(|current| *current = room);
    }

    /// Add an entity to the UI
    pub fn add_ui(&mut self, entity: Entity) -> Result<(), SceneError> {
        if !self.world.contains(entity) {
            return Err(SceneError::UnknownEntity(entity));
        }
        if !self.ui.contains(&entity) {
            self.ui.push(entity);
        }
        Ok(())
    }

    /// Remove an entity from the UI
    pub fn remove_ui(&mut self, entity: Entity) {
        self.ui.retain(|&e| e != entity);
    }

    /// UI entities
    pub fn ui(&self) -> &[Entity] {
        &self.ui
    }

    /// Set (or clear) the cursor entity
    pub fn set_cursor(&mut self, cursor: Option<Entity>) -> Result<(), SceneError> {
        if let Some(entity) = cursor.filter(|&e| !self.world.contains(e)) {
            return Err(SceneError::UnknownEntity(entity));
        }
        self.cursor = cursor;
        Ok(())
    }

    /// The cursor entity
    pub fn cursor(&self) -> Option<Entity> {
        self.cursor
    }

    /// Set (or clear) the player entity
    pub fn set_player(&mut self, player: Option<Entity>) -> Result<(), SceneError> {
        if let Some(entity) = player.filter(|&e| !self.world.contains(e)) {
            return Err(SceneError::UnknownEntity(entity));
        }
        self.player = player;
        Ok(())
    }

    /// The player entity
    pub fn player(&self) -> Option<Entity> {
        self.player
    }

    /// Mouse position in the main viewport's virtual coordinates
    pub fn set_mouse_position(&mut self, position: Point2) {
        self.mouse_position = position;
    }

    /// Last mouse position
    pub fn mouse_position(&self) -> Point2 {
        self.mouse_position
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// The scene's event queue and handlers
    pub fn events_mut(&mut self) -> &mut EventSystem {
        &mut self.events
    }

    /// Fold pending changes in and take all queued notifications
    pub fn take_events(&mut self) -> Vec<SceneEvent> {
        self.sync();
        self.events.drain()
    }

    // ---------------------------------------------------------------------
    // Change propagation
    // ---------------------------------------------------------------------

    /// Fold recorded world changes into the caches
    pub fn sync(&mut self) {
        if !self.world.has_changes() {
            return;
        }
        for change in self.world.take_changes() {
            trace!("Applying {:?}", change);
            match change {
                PropertyChange::Changed { entity, flags } => {
                    if flags.contains(ChangeFlags::MATRIX) {
                        self.mark_matrix_dirty(entity);
                    }
                    if flags.contains(ChangeFlags::BOUNDS) {
                        self.mark_bounds_dirty(entity);
                    }
                    if flags.contains(ChangeFlags::VISIBILITY) {
                        if let Some(parent) = self.world.parent(entity) {
                            self.mark_with_children_dirty(parent);
                        }
                    }
                }
                PropertyChange::Reparented { entity, previous_parent } => {
                    self.mark_matrix_dirty(entity);
                    if let Some(previous) = previous_parent {
                        self.mark_with_children_dirty(previous);
                    }
                    if let Some(parent) = self.world.parent(entity) {
                        self.mark_with_children_dirty(parent);
                    }
                }
                PropertyChange::Removed { entity, parent } => {
                    self.matrices.remove(entity);
                    self.bounds.remove(entity);
                    self.with_children.remove(entity);
                    if let Some(parent) = parent {
                        self.mark_with_children_dirty(parent);
                    }
                }
            }
        }
    }

    /// Invalidate every entity (layer, resolution or area change)
    pub(crate) fn mark_all_dirty(&mut self) {
        self.sync();
        let roots: Vec<Entity> = self
            .world
            .entities()
            .filter(|&e| self.world.parent(e).is_none())
            .collect();
        for root in roots {
            self.mark_matrix_dirty(root);
        }
    }

    // ---------------------------------------------------------------------
    // Lock-step bulk updates
    // ---------------------------------------------------------------------

    /// Freeze an entity's derived data
    ///
    /// The caches are brought up to date and snapshotted; until the matching
    /// [`unlock`](Self::unlock) queries return the snapshot and change
    /// notifications are deferred. Locks nest.
    pub fn lock(&mut self, entity: Entity) -> Result<(), SceneError> {
        if !self.world.contains(entity) {
            return Err(SceneError::UnknownEntity(entity));
        }
        self.sync();
        self.model_matrices(entity);
        self.refresh_hit_test_box(entity);
        self.bounding_box_with_children(entity);

        if let Some(cache) = self.matrices.get_mut(entity) {
            cache.lock();
        }
        if let Some(cache) = self.bounds.get_mut(entity) {
            cache.lock();
        }
        if let Some(cache) = self.with_children.get_mut(entity) {
            cache.lock();
        }
        Ok(())
    }

    /// Recompute a locked entity's matrices into the pending buffer
    ///
    /// Nothing is published until the final unlock. Safe to call repeatedly.
    pub fn prepare_for_unlock(&mut self, entity: Entity) -> Result<(), SceneError> {
        if !self.world.contains(entity) {
            return Err(SceneError::UnknownEntity(entity));
        }
        self.sync();
        let dirty = self.matrices.get(entity).map_or(false, |cache| cache.is_dirty());
        if dirty {
            let computed = self.compute_model_matrices(entity);
            if let Some(cache) = self.matrices.get_mut(entity) {
                cache.prepare(computed);
            }
        }
        Ok(())
    }

    /// Release a lock; the last release publishes and notifies at most once
    pub fn unlock(&mut self, entity: Entity) -> Result<(), SceneError> {
        if !self.world.contains(entity) {
            return Err(SceneError::UnknownEntity(entity));
        }
        self.sync();
        let matrices_changed = self.matrices.get_mut(entity).map_or(false, |c| c.unlock());
        let bounds_changed = self.bounds.get_mut(entity).map_or(false, |c| c.unlock());
        let children_changed = self.with_children.get_mut(entity).map_or(false, |c| c.unlock());

        if matrices_changed {
            self.notify_matrix_changed(entity);
        }
        if bounds_changed {
            self.notify_bounds_changed(entity);
        }
        if children_changed {
            self.events.send(SceneEvent::BoundingBoxWithChildrenChanged(entity));
        }
        Ok(())
    }

    /// Apply a batch of mutations with every listed entity locked
    ///
    /// Each entity emits at most one change notification for the whole batch.
    pub fn bulk_update<F, T>(&mut self, entities: &[Entity], f: F) -> Result<T, SceneError>
    where
        F: FnOnce(&mut World) -> Result<T, SceneError>,
    {
        for &entity in entities {
            self.lock(entity)?;
        }
        let result = f(&mut self.world);
        self.sync();
        for &entity in entities {
            self.prepare_for_unlock(entity)?;
        }
        for &entity in entities.iter().rev() {
            self.unlock(entity)?;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{DrawableInfo, Scale};
    use crate::foundation::math::Vec2;
    use crate::render::bounding_box::AABB;
    use crate::render::layer::Resolution;
    use crate::scene::{Area, WalkBehind};

    #[test]
    fn test_new_scene_has_default_layer_and_main_viewport() {
        let mut scene = Scene::default();
        assert!(scene.layer(scene.default_layer()).is_some());
        assert_eq!(scene.viewport_ids(), &[scene.main_viewport()]);

        let main = scene.main_viewport();
        assert_eq!(scene.remove_viewport(main), Err(SceneError::MainViewportRemoval));

        let minimap = scene.add_viewport(Viewport::default());
        scene.remove_viewport(minimap).unwrap();
        assert_eq!(scene.remove_viewport(minimap), Err(SceneError::UnknownViewport(minimap)));
    }

    #[test]
    fn test_effective_layer_inherits_from_ancestors() {
        let mut scene = Scene::default();
        let far = scene.add_layer(RenderLayer::new(10));
        let parent = scene
            .spawn(
                "parent",
                Capabilities::default().with_drawable(DrawableInfo::on_layer(far)),
            )
            .unwrap();
        let child = scene.spawn("child", Capabilities::default()).unwrap();
        let loose = scene.spawn("loose", Capabilities::default()).unwrap();
        scene.set_parent(child, Some(parent)).unwrap();

        assert_eq!(scene.effective_layer(child), far);
        assert_eq!(scene.effective_layer(loose), scene.default_layer());
    }

    #[test]
    fn test_walk_behind_baseline_synced_into_z() {
        let mut scene = Scene::default();
        let slice = scene
            .spawn("slice", Capabilities::default().with_scale(Scale::from_size(10.0, 10.0)))
            .unwrap();
        scene.update_room(|room| {
            room.areas.push(
                Area::new("wall", AABB::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0)))
                    .with_walk_behind(WalkBehind { baseline: 42.0, drawable: slice }),
            );
        });

        let z = scene.world().capabilities(slice).unwrap().render_z();
        assert!((z - 42.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_despawn_clears_scene_references() {
        let mut scene = Scene::default();
        let cursor = scene.spawn("cursor", Capabilities::default()).unwrap();
        scene.set_cursor(Some(cursor)).unwrap();
        scene.add_ui(cursor).unwrap();

        scene.despawn(cursor).unwrap();
        assert_eq!(scene.cursor(), None);
        assert!(scene.ui().is_empty());
        assert_eq!(scene.set_cursor(Some(cursor)), Err(SceneError::UnknownEntity(cursor)));
    }

    #[test]
    fn test_resolution_change_invalidates_matrices() {
        let mut scene = Scene::default();
        let e = scene
            .spawn("e", Capabilities::default().with_scale(Scale::from_size(1.0, 1.0)))
            .unwrap();
        scene.model_matrices(e);
        scene.take_events();

        scene.set_settings(RenderSettings {
            virtual_resolution: Resolution::new(640, 400),
            ..Default::default()
        });
        let events = scene.take_events();
        assert!(events.contains(&SceneEvent::ModelMatrixChanged(e)));
    }
}
