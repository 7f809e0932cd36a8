//! Viewports and their cached camera matrices

use std::collections::{HashMap, HashSet};

use log::trace;

use super::layer::{LayerId, RenderLayer, Resolution};
use crate::foundation::math::{utils, Mat4, Mat4Ext, Point2, Vec2};

slotmap::new_key_type! {
    /// Handle of a [`Viewport`] owned by the scene
    pub struct ViewportId;
}

/// Region of the window a viewport draws into, as fractions of the window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionBox {
    /// Left edge
    pub x: f32,
    /// Bottom edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Default for ProjectionBox {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

impl ProjectionBox {
    /// Create a projection box
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Map a window point (origin bottom-left) into the viewport's virtual space
    ///
    /// Returns `None` for points outside the box or for a degenerate box.
    pub fn window_to_virtual(
        &self,
        point: Point2,
        window_size: Vec2,
        virtual_resolution: Resolution,
    ) -> Option<Point2> {
        if window_size.x <= 0.0 || window_size.y <= 0.0 || self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        let rel_x = (point.x / window_size.x - self.x) / self.width;
        let rel_y = (point.y / window_size.y - self.y) / self.height;
        if !(0.0..=1.0).contains(&rel_x) || !(0.0..=1.0).contains(&rel_y) {
            return None;
        }
        let size = virtual_resolution.as_vec2();
        Some(Point2::new(rel_x * size.x, rel_y * size.y))
    }
}

/// What a viewport's display list contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayListSettings {
    /// Include room background, objects and areas
    pub display_room: bool,
    /// Include UI entities
    pub display_ui: bool,
    /// Layers whose entities are left out
    pub layers_to_skip: HashSet<LayerId>,
}

impl Default for DisplayListSettings {
    fn default() -> Self {
        Self {
            display_room: true,
            display_ui: true,
            layers_to_skip: HashSet::new(),
        }
    }
}

/// A camera onto the scene
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    /// Camera x in virtual coordinates
    pub x: f32,
    /// Camera y in virtual coordinates
    pub y: f32,
    /// Horizontal zoom
    pub scale_x: f32,
    /// Vertical zoom
    pub scale_y: f32,
    /// Counter-clockwise camera angle in degrees
    pub angle: f32,
    /// Rotation/zoom pivot as a fraction of the visible area
    pub pivot: Vec2,
    /// Where on the window this viewport is drawn
    pub projection_box: ProjectionBox,
    /// Display list filtering
    pub display_settings: DisplayListSettings,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            pivot: Vec2::new(0.5, 0.5),
            projection_box: ProjectionBox::default(),
            display_settings: DisplayListSettings::default(),
        }
    }
}

impl Viewport {
    /// Builder pattern: Set camera position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Builder pattern: Set zoom
    pub fn with_scale(mut self, scale_x: f32, scale_y: f32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// Builder pattern: Set camera angle in degrees
    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    /// Builder pattern: Set projection box
    pub fn with_projection_box(mut self, projection_box: ProjectionBox) -> Self {
        self.projection_box = projection_box;
        self
    }

    /// Camera matrix for `layer` in virtual coordinates, uncached
    ///
    /// Unlike the cached render matrices this ignores the layer's own
    /// resolution, which makes it the right inverse for picking.
    pub fn virtual_matrix(&self, layer: &RenderLayer, virtual_resolution: Resolution) -> Mat4 {
        let mut key = ViewportMatrixKey::new(self, layer, virtual_resolution);
        key.factor = Vec2::new(1.0, 1.0);
        key.resolution = virtual_resolution;
        key.build()
    }
}

/// Every input the viewport matrix of one (viewport, layer) pair depends on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMatrixKey {
    position: Vec2,
    scale: Vec2,
    angle: f32,
    pivot: Vec2,
    parallax: Vec2,
    factor: Vec2,
    resolution: Resolution,
}

impl ViewportMatrixKey {
    fn new(viewport: &Viewport, layer: &RenderLayer, virtual_resolution: Resolution) -> Self {
        Self {
            position: Vec2::new(viewport.x, viewport.y),
            scale: Vec2::new(viewport.scale_x, viewport.scale_y),
            angle: viewport.angle,
            pivot: viewport.pivot,
            parallax: layer.parallax,
            factor: layer.resolution_factor(virtual_resolution),
            resolution: layer.resolution(virtual_resolution),
        }
    }

    /// `T(pivot) · R(-angle) · S(zoom) · T(-pivot) · T(-camera · parallax)`
    fn build(&self) -> Mat4 {
        let pivot = self.pivot.component_mul(&self.resolution.as_vec2());
        let camera = self.position.component_mul(&self.parallax).component_mul(&self.factor);

        Mat4::translation_2d(pivot.x, pivot.y)
            * Mat4::rotation_z(-utils::deg_to_rad(self.angle))
            * Mat4::scaling_2d(self.scale.x, self.scale.y)
            * Mat4::translation_2d(-pivot.x, -pivot.y)
            * Mat4::translation_2d(-camera.x, -camera.y)
    }
}

#[derive(Debug, Clone)]
struct CachedViewportMatrix {
    key: ViewportMatrixKey,
    matrix: Mat4,
    version: u64,
}

/// Camera matrices per (viewport, layer), rebuilt only when their key changes
///
/// Every rebuild gets a fresh version number so dependent caches can tell
/// whether the matrix they were built against is still current. Version 0
/// is reserved for the identity used by screen-space entities.
#[derive(Debug, Default)]
pub struct ViewportMatrixCache {
    entries: HashMap<(ViewportId, LayerId), CachedViewportMatrix>,
    next_version: u64,
    rebuilds: u64,
}

impl ViewportMatrixCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Matrix and version for a (viewport, layer) pair
    pub fn get(
        &mut self,
        viewport_id: ViewportId,
        viewport: &Viewport,
        layer_id: LayerId,
        layer: &RenderLayer,
        virtual_resolution: Resolution,
    ) -> (Mat4, u64) {
        let key = ViewportMatrixKey::new(viewport, layer, virtual_resolution);
        if let Some(entry) = self.entries.get(&(viewport_id, layer_id)) {
            if entry.key == key {
                return (entry.matrix, entry.version);
            }
        }

        self.next_version += 1;
        self.rebuilds += 1;
        let entry = CachedViewportMatrix {
            key,
            matrix: key.build(),
            version: self.next_version,
        };
        trace!(
            "Rebuilt viewport matrix for {:?}/{:?} (version {})",
            viewport_id,
            layer_id,
            entry.version
        );
        let result = (entry.matrix, entry.version);
        self.entries.insert((viewport_id, layer_id), entry);
        result
    }

    /// Number of matrix rebuilds since creation
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Forget all entries of a viewport
    pub fn remove_viewport(&mut self, viewport_id: ViewportId) {
        self.entries.retain(|(v, _), _| *v != viewport_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use slotmap::SlotMap;

    fn ids() -> (ViewportId, LayerId) {
        let mut viewports: SlotMap<ViewportId, ()> = SlotMap::with_key();
        let mut layers: SlotMap<LayerId, ()> = SlotMap::with_key();
        (viewports.insert(()), layers.insert(()))
    }

    #[test]
    fn test_camera_pan_moves_world_opposite() {
        let viewport = Viewport::default().with_position(10.0, 20.0);
        let key = ViewportMatrixKey::new(&viewport, &RenderLayer::new(0), Resolution::new(320, 200));
        let p = key.build().transform_point_2d(Point2::new(10.0, 20.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_parallax_scales_camera_offset() {
        let viewport = Viewport::default().with_position(100.0, 0.0);
        let layer = RenderLayer::new(0).with_parallax(0.5, 1.0);
        let key = ViewportMatrixKey::new(&viewport, &layer, Resolution::new(320, 200));
        let p = key.build().transform_point_2d(Point2::new(0.0, 0.0));
        assert_relative_eq!(p.x, -50.0, epsilon = 1e-4);
    }

    #[test]
    fn test_zoom_keeps_pivot_fixed() {
        let viewport = Viewport::default().with_scale(2.0, 2.0);
        let key = ViewportMatrixKey::new(&viewport, &RenderLayer::new(0), Resolution::new(320, 200));
        let center = key.build().transform_point_2d(Point2::new(160.0, 100.0));
        assert_relative_eq!(center.x, 160.0, epsilon = 1e-4);
        assert_relative_eq!(center.y, 100.0, epsilon = 1e-4);
    }

    #[test]
    fn test_cache_rebuilds_only_on_key_change() {
        let (viewport_id, layer_id) = ids();
        let layer = RenderLayer::new(0);
        let res = Resolution::new(320, 200);
        let mut viewport = Viewport::default();
        let mut cache = ViewportMatrixCache::new();

        let (_, first) = cache.get(viewport_id, &viewport, layer_id, &layer, res);
        let (_, again) = cache.get(viewport_id, &viewport, layer_id, &layer, res);
        assert_eq!(first, again);
        assert_eq!(cache.rebuild_count(), 1);

        viewport.x = 5.0;
        let (_, moved) = cache.get(viewport_id, &viewport, layer_id, &layer, res);
        assert_ne!(first, moved);
        assert_eq!(cache.rebuild_count(), 2);
    }

    #[test]
    fn test_projection_box_mapping() {
        let projection = ProjectionBox::new(0.5, 0.0, 0.5, 1.0);
        let window = Vec2::new(800.0, 600.0);
        let res = Resolution::new(320, 200);

        let p = projection
            .window_to_virtual(Point2::new(600.0, 300.0), window, res)
            .unwrap();
        assert_relative_eq!(p.x, 160.0, epsilon = 1e-4);
        assert_relative_eq!(p.y, 100.0, epsilon = 1e-4);
        assert!(projection
            .window_to_virtual(Point2::new(100.0, 300.0), window, res)
            .is_none());
    }
}
