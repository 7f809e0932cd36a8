//! Mouse state and entity picking
//!
//! Window coordinates arrive y-down in pixels. Picking maps them through the
//! viewport's projection box into virtual coordinates, undoes the camera of
//! the entity's layer, and tests the flip-normalized hit-test quads of the
//! display list from the topmost entity down.

use std::collections::HashMap;

use log::trace;

use crate::ecs::Entity;
use crate::foundation::math::{Mat4, Mat4Ext, Point2, Vec2};
use crate::render::display_list::DisplayListBuilder;
use crate::render::layer::LayerId;
use crate::render::viewport::ViewportId;
use crate::scene::{Scene, SceneError};

/// Mouse state for picking operations
#[derive(Debug, Clone, PartialEq)]
pub struct MouseState {
    /// Current screen-space X position (pixels from the left)
    pub screen_x: f64,
    /// Current screen-space Y position (pixels from the top)
    pub screen_y: f64,
    /// Window width in pixels
    pub window_width: u32,
    /// Window height in pixels
    pub window_height: u32,
    /// Left mouse button pressed this frame
    pub left_click: bool,
    /// Right mouse button pressed this frame
    pub right_click: bool,
}

impl MouseState {
    /// Create a new mouse state with default values
    pub fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            screen_x: 0.0,
            screen_y: 0.0,
            window_width,
            window_height,
            left_click: false,
            right_click: false,
        }
    }

    /// Update mouse position from window events
    pub fn update_position(&mut self, x: f64, y: f64) {
        self.screen_x = x;
        self.screen_y = y;
    }

    /// Update window size
    pub fn update_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    /// Position with the origin at the bottom-left of the window
    pub fn window_point(&self) -> Point2 {
        Point2::new(
            self.screen_x as f32,
            (f64::from(self.window_height) - self.screen_y) as f32,
        )
    }

    /// Window size as a vector
    pub fn window_size(&self) -> Vec2 {
        Vec2::new(self.window_width as f32, self.window_height as f32)
    }

    /// Clear all click states (call at end of frame)
    pub fn clear_clicks(&mut self) {
        self.left_click = false;
        self.right_click = false;
    }
}

impl Default for MouseState {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// Finds the topmost entity under a window point
#[derive(Debug, Default)]
pub struct HitTester {
    builder: DisplayListBuilder,
    inverses: HashMap<LayerId, Option<Mat4>>,
}

impl HitTester {
    /// Create a hit tester
    pub fn new() -> Self {
        Self::default()
    }

    /// Topmost visible entity of `viewport` under `window_point` (origin bottom-left)
    ///
    /// `Ok(None)` when the point is outside the viewport's projection box or
    /// nothing is hit. Entities that ignore the viewport are tested against
    /// the untransformed point.
    pub fn entity_at(
        &mut self,
        scene: &mut Scene,
        viewport: ViewportId,
        window_point: Point2,
        window_size: Vec2,
    ) -> Result<Option<Entity>, SceneError> {
        let view = scene
            .viewport(viewport)
            .ok_or(SceneError::UnknownViewport(viewport))?
            .clone();
        let virtual_resolution = scene.settings().virtual_resolution;
        let Some(point) = view
            .projection_box
            .window_to_virtual(window_point, window_size, virtual_resolution)
        else {
            return Ok(None);
        };

        let list = self.builder.build(scene, viewport)?;
        self.inverses.clear();
        for &entity in list.entities.iter().rev() {
            let ignore_viewport = scene
                .world()
                .capabilities(entity)
                .and_then(|caps| caps.drawable)
                .map_or(false, |drawable| drawable.ignore_viewport);
            let local = if ignore_viewport {
                point
            } else {
                let (layer_id, layer) = scene.layer_of(entity);
                let inverse = *self
                    .inverses
                    .entry(layer_id)
                    .or_insert_with(|| view.virtual_matrix(&layer, virtual_resolution).try_inverse());
                match inverse {
                    Some(inverse) => inverse.transform_point_2d(point),
                    None => continue,
                }
            };
            if scene.hit_test_box(entity).map_or(false, |quad| quad.contains(local)) {
                trace!("Hit {:?} at {:?}", entity, local);
                return Ok(Some(entity));
            }
        }
        Ok(None)
    }

    /// Topmost entity under the mouse
    pub fn entity_under_mouse(
        &mut self,
        scene: &mut Scene,
        viewport: ViewportId,
        mouse: &MouseState,
    ) -> Result<Option<Entity>, SceneError> {
        self.entity_at(scene, viewport, mouse.window_point(), mouse.window_size())
    }

    /// Store the mouse position in the main viewport's virtual coordinates
    ///
    /// Leaves the previous position when the mouse is outside the main
    /// viewport. Returns whether the position was updated.
    pub fn track_mouse(scene: &mut Scene, mouse: &MouseState) -> bool {
        let virtual_resolution = scene.settings().virtual_resolution;
        let mapped = scene.viewport(scene.main_viewport()).and_then(|view| {
            view.projection_box
                .window_to_virtual(mouse.window_point(), mouse.window_size(), virtual_resolution)
        });
        match mapped {
            Some(position) => {
                scene.set_mouse_position(position);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Capabilities, DrawableInfo, Scale, Translate};
    use crate::render::viewport::{ProjectionBox, Viewport};

    fn square(scene: &mut Scene, id: &str, x: f32, y: f32) -> Entity {
        let entity = scene
            .spawn(
                id,
                Capabilities::default()
                    .with_scale(Scale::from_size(20.0, 20.0))
                    .with_translate(Translate::new(x, y)),
            )
            .unwrap();
        scene.update_room(|room| room.objects.push(entity));
        entity
    }

    // Window of 320x200 pixels maps 1:1 onto the default virtual resolution
    fn window() -> Vec2 {
        Vec2::new(320.0, 200.0)
    }

    #[test]
    fn test_window_point_flips_y() {
        let mut mouse = MouseState::new(320, 200);
        mouse.update_position(10.0, 50.0);
        assert_eq!(mouse.window_point(), Point2::new(10.0, 150.0));
    }

    #[test]
    fn test_topmost_entity_wins() {
        let mut scene = Scene::default();
        let back = square(&mut scene, "back", 0.0, 15.0);
        let front = square(&mut scene, "front", 0.0, 5.0);
        let mut tester = HitTester::new();
        let main = scene.main_viewport();

        // Both quads cover y 15..25
        let overlap = Point2::new(10.0, 20.0);
        assert_eq!(tester.entity_at(&mut scene, main, overlap, window()), Ok(Some(front)));
        assert_eq!(tester.entity_at(&mut scene, main, Point2::new(10.0, 10.0), window()), Ok(Some(front)));
        assert_eq!(tester.entity_at(&mut scene, main, Point2::new(10.0, 30.0), window()), Ok(Some(back)));
        assert_eq!(tester.entity_at(&mut scene, main, Point2::new(100.0, 100.0), window()), Ok(None));

        scene.set_visible(front, false).unwrap();
        assert_eq!(tester.entity_at(&mut scene, main, overlap, window()), Ok(Some(back)));
        assert_eq!(tester.entity_at(&mut scene, main, Point2::new(10.0, 10.0), window()), Ok(None));
    }

    #[test]
    fn test_camera_is_undone_unless_ignored() {
        let mut scene = Scene::default();
        let world_item = square(&mut scene, "item", 100.0, 0.0);
        let hud = square(&mut scene, "hud", 0.0, 0.0);
        scene
            .update(hud, |caps| caps.drawable = Some(DrawableInfo::default().ignoring_viewport()))
            .unwrap();
        let main = scene.main_viewport();
        scene.update_viewport(main, |v| v.x = 100.0).unwrap();

        let mut tester = HitTester::new();
        // The camera moved right by 100, so the item now sits at the left edge
        assert_eq!(tester.entity_at(&mut scene, main, Point2::new(5.0, 5.0), window()), Ok(Some(hud)));
        assert_eq!(
            tester.entity_at(&mut scene, main, Point2::new(25.0, 5.0), window()),
            Ok(None)
        );
        scene.set_visible(hud, false).unwrap();
        assert_eq!(
            tester.entity_at(&mut scene, main, Point2::new(5.0, 5.0), window()),
            Ok(Some(world_item))
        );
    }

    #[test]
    fn test_projection_box_limits_viewport() {
        let mut scene = Scene::default();
        square(&mut scene, "item", 0.0, 0.0);
        let right_half = scene.add_viewport(
            Viewport::default().with_projection_box(ProjectionBox::new(0.5, 0.0, 0.5, 1.0)),
        );
        let mut tester = HitTester::new();
        assert_eq!(
            tester.entity_at(&mut scene, right_half, Point2::new(5.0, 5.0), window()),
            Ok(None)
        );
        // Left edge of the right half maps to virtual x = 0
        assert!(tester
            .entity_at(&mut scene, right_half, Point2::new(161.0, 1.0), window())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_track_mouse_stores_virtual_position() {
        let mut scene = Scene::default();
        let mut mouse = MouseState::new(640, 400);
        mouse.update_position(320.0, 100.0);
        assert!(HitTester::track_mouse(&mut scene, &mouse));
        assert_eq!(scene.mouse_position(), Point2::new(160.0, 150.0));

        mouse.update_position(-10.0, 100.0);
        assert!(!HitTester::track_mouse(&mut scene, &mouse));
        assert_eq!(scene.mouse_position(), Point2::new(160.0, 150.0));
    }
}
