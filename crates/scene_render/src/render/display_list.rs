//! Per-viewport display lists
//!
//! Collects what a viewport shows (room background, room objects, area
//! debug drawings, walk-behind slices, UI), expands every candidate to its
//! subtree, filters by layer and visibility, and sorts the result once into
//! draw order. The cursor is positioned but kept out of the list; the batch
//! renderer draws it last.

use std::collections::HashSet;

use log::{debug, trace};

use super::render_order::{find_order_cycle, sort_by_render_order};
use super::viewport::ViewportId;
use crate::ecs::components::Translate;
use crate::ecs::Entity;
use crate::scene::{Scene, SceneError};

/// Ordered entities to draw for one viewport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayList {
    /// Viewport the list was built for
    pub viewport: ViewportId,
    /// Visible entities in draw order (farthest first)
    pub entities: Vec<Entity>,
    /// Cursor entity, positioned at the mouse, if one is defined
    pub cursor: Option<Entity>,
}

/// Builds [`DisplayList`]s, reusing its scratch buffers across frames
#[derive(Debug, Default)]
pub struct DisplayListBuilder {
    candidates: Vec<Entity>,
    seen: HashSet<Entity>,
}

impl DisplayListBuilder {
    /// Create a builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble and sort the display list of `viewport`
    pub fn build(&mut self, scene: &mut Scene, viewport: ViewportId) -> Result<DisplayList, SceneError> {
        scene.sync();
        let settings = scene
            .viewport(viewport)
            .ok_or(SceneError::UnknownViewport(viewport))?
            .display_settings
            .clone();

        self.candidates.clear();
        self.seen.clear();

        if settings.display_room {
            let room = &scene.room;
            if let Some(background) = room.background {
                self.candidates.push(background);
            }
            for &object in &room.objects {
                if !room.show_player && scene.player == Some(object) {
                    continue;
                }
                self.candidates.push(object);
            }
            if scene.settings.draw_area_debug {
                self.candidates.extend(
                    room.areas
                        .iter()
                        .filter(|area| area.enabled)
                        .filter_map(|area| area.debug_draw),
                );
            }
            if room.background.is_some() {
                self.candidates.extend(
                    room.areas
                        .iter()
                        .filter(|area| area.enabled)
                        .filter_map(|area| area.walk_behind.map(|w| w.drawable)),
                );
            }
        }
        if settings.display_ui {
            self.candidates.extend(scene.ui.iter().copied());
        }

        let mut entities = Vec::with_capacity(self.candidates.len());
        for index in 0..self.candidates.len() {
            let candidate = self.candidates[index];
            if !scene.world.contains(candidate) {
                continue;
            }
            let subtree = std::iter::once(candidate).chain(scene.world.descendants(candidate));
            for entity in subtree {
                if !self.seen.insert(entity) || Some(entity) == scene.cursor {
                    continue;
                }
                if settings.layers_to_skip.contains(&scene.effective_layer(entity)) {
                    continue;
                }
                // Matrices are prepared for hidden entities too
                scene.model_matrices(entity);
                if scene.world.is_visible(entity) {
                    entities.push(entity);
                }
            }
        }

        sort_by_render_order(scene, &mut entities);
        if scene.settings.detect_order_cycles && cfg!(debug_assertions) {
            if let Some(cycle) = find_order_cycle(scene, &entities) {
                debug!("Display list of {:?} has an order cycle of {}", viewport, cycle.len());
            }
        }

        let cursor = scene.cursor.filter(|&c| scene.world.contains(c));
        if let Some(cursor) = cursor {
            let mouse = scene.mouse_position;
            scene.update(cursor, |caps| {
                let z = caps.translate.and_then(|t| t.z);
                caps.translate = Some(Translate { x: mouse.x, y: mouse.y, z });
            })?;
        }

        trace!("Display list for {:?}: {} entities", viewport, entities.len());
        Ok(DisplayList {
            viewport,
            entities,
            cursor,
        })
    }
}

impl Scene {
    /// Build the display list of a viewport with a throwaway builder
    pub fn display_list(&mut self, viewport: ViewportId) -> Result<DisplayList, SceneError> {
        DisplayListBuilder::new().build(self, viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Capabilities, DrawableInfo, Scale};
    use crate::foundation::math::{Point2, Vec2};
    use crate::render::bounding_box::AABB;
    use crate::render::layer::RenderLayer;
    use crate::scene::{Area, WalkBehind};

    fn spawn_at(scene: &mut Scene, id: &str, x: f32, y: f32) -> Entity {
        scene
            .spawn(
                id,
                Capabilities::default()
                    .with_scale(Scale::from_size(10.0, 10.0))
                    .with_translate(Translate::new(x, y)),
            )
            .unwrap()
    }

    #[test]
    fn test_room_and_ui_sorted_together() {
        let mut scene = Scene::default();
        let background = spawn_at(&mut scene, "bg", 0.0, 1000.0);
        let tree = spawn_at(&mut scene, "tree", 0.0, 50.0);
        let player = spawn_at(&mut scene, "player", 0.0, 20.0);
        let button = spawn_at(&mut scene, "button", 0.0, -10.0);
        scene.set_room(crate::scene::Room {
            background: Some(background),
            objects: vec![player, tree],
            ..Default::default()
        });
        scene.add_ui(button).unwrap();

        let list = scene.display_list(scene.main_viewport()).unwrap();
        assert_eq!(list.entities, vec![background, tree, player, button]);
        assert_eq!(list.cursor, None);
    }

    #[test]
    fn test_hidden_player_and_invisible_entities_skipped() {
        let mut scene = Scene::default();
        let player = spawn_at(&mut scene, "player", 0.0, 0.0);
        let ghost = spawn_at(&mut scene, "ghost", 0.0, 0.0);
        let hat = spawn_at(&mut scene, "hat", 0.0, 10.0);
        scene.set_parent(hat, Some(ghost)).unwrap();
        scene.set_player(Some(player)).unwrap();
        scene.update_room(|room| {
            room.objects = vec![player, ghost];
            room.show_player = false;
        });
        scene.set_visible(ghost, false).unwrap();

        let list = scene.display_list(scene.main_viewport()).unwrap();
        assert!(list.entities.is_empty());
        // Matrices are still prepared for hidden entities
        assert!(scene.matrices.contains_key(hat));
    }

    #[test]
    fn test_walk_behinds_require_background() {
        let mut scene = Scene::default();
        let slice = spawn_at(&mut scene, "slice", 0.0, 0.0);
        let debug_draw = spawn_at(&mut scene, "debug", 0.0, 0.0);
        scene.update_room(|room| {
            room.areas.push(
                Area::new("wall", AABB::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0)))
                    .with_walk_behind(WalkBehind { baseline: 5.0, drawable: slice })
                    .with_debug_draw(debug_draw),
            );
        });

        let list = scene.display_list(scene.main_viewport()).unwrap();
        assert_eq!(list.entities, vec![debug_draw]);

        let background = spawn_at(&mut scene, "bg", 0.0, 500.0);
        scene.update_room(|room| room.background = Some(background));
        let list = scene.display_list(scene.main_viewport()).unwrap();
        assert!(list.entities.contains(&slice));
    }

    #[test]
    fn test_display_settings_filter_layers_and_ui() {
        let mut scene = Scene::default();
        let hidden_layer = scene.add_layer(RenderLayer::new(0));
        let object = spawn_at(&mut scene, "object", 0.0, 0.0);
        let skipped = spawn_at(&mut scene, "skipped", 0.0, 0.0);
        let button = spawn_at(&mut scene, "button", 0.0, 0.0);
        scene
            .update(skipped, |caps| caps.drawable = Some(DrawableInfo::on_layer(hidden_layer)))
            .unwrap();
        scene.update_room(|room| room.objects = vec![object, skipped]);
        scene.add_ui(button).unwrap();

        let main = scene.main_viewport();
        scene
            .update_viewport(main, |v| {
                v.display_settings.display_ui = false;
                v.display_settings.layers_to_skip.insert(hidden_layer);
            })
            .unwrap();

        let list = scene.display_list(main).unwrap();
        assert_eq!(list.entities, vec![object]);
    }

    #[test]
    fn test_cursor_positioned_and_excluded() {
        let mut scene = Scene::default();
        let cursor = spawn_at(&mut scene, "cursor", 0.0, 0.0);
        scene.add_ui(cursor).unwrap();
        scene.set_cursor(Some(cursor)).unwrap();
        scene.set_mouse_position(Point2::new(42.0, 17.0));

        let list = scene.display_list(scene.main_viewport()).unwrap();
        assert!(list.entities.is_empty());
        assert_eq!(list.cursor, Some(cursor));
        let translate = scene.world().capabilities(cursor).unwrap().translate.unwrap();
        assert_eq!((translate.x, translate.y), (42.0, 17.0));
    }

    #[test]
    fn test_unknown_viewport() {
        let mut scene = Scene::default();
        let extra = scene.add_viewport(crate::render::viewport::Viewport::default());
        scene.remove_viewport(extra).unwrap();
        assert_eq!(scene.display_list(extra), Err(SceneError::UnknownViewport(extra)));
    }
}
