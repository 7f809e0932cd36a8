//! Bounding boxes: render quads, hit-test quads and crop
//!
//! An entity's local rectangle `[0, w] × [0, h]` is projected through its
//! model matrix into two quads:
//!
//! - the **render quad**, through `viewport · model (object resolution)`,
//!   keeps mirroring so textures flip with the entity;
//! - the **hit-test quad**, through the virtual-resolution model matrix
//!   alone, is flip-normalized so its corners are always named by their
//!   screen position.

use std::collections::HashMap;

use super::lock_step::LockStep;
use super::model_matrix::{cache_entry, ModelMatrices};
use super::viewport::ViewportId;
use crate::ecs::components::Crop;
use crate::ecs::Entity;
use crate::events::SceneEvent;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Point2, Vec2};
use crate::scene::Scene;

/// Axis-aligned bounding box in the XY plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec2,
    /// Maximum corner of the bounding box
    pub max: Vec2,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Smallest AABB containing every point; `None` for no points
    pub fn from_points<I: IntoIterator<Item = Point2>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let start = Self::new(first.coords, first.coords);
        Some(points.fold(start, |aabb, p| {
            Self::new(aabb.min.inf(&p.coords), aabb.max.sup(&p.coords))
        }))
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Smallest AABB containing both
    pub fn union(&self, other: &AABB) -> AABB {
        Self::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }
}

/// A world-space quad, corners named bottom-left, bottom-right, top-left, top-right
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Bottom-left corner
    pub bottom_left: Point2,
    /// Bottom-right corner
    pub bottom_right: Point2,
    /// Top-left corner
    pub top_left: Point2,
    /// Top-right corner
    pub top_right: Point2,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::from_size(0.0, 0.0)
    }
}

impl BoundingBox {
    /// Create a quad from its corners
    pub fn new(bottom_left: Point2, bottom_right: Point2, top_left: Point2, top_right: Point2) -> Self {
        Self {
            bottom_left,
            bottom_right,
            top_left,
            top_right,
        }
    }

    /// The rectangle `[0, width] × [0, height]`
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(
            Point2::new(0.0, 0.0),
            Point2::new(width, 0.0),
            Point2::new(0.0, height),
            Point2::new(width, height),
        )
    }

    /// Every corner transformed by `matrix`
    pub fn transform(&self, matrix: &Mat4) -> Self {
        Self::new(
            matrix.transform_point_2d(self.bottom_left),
            matrix.transform_point_2d(self.bottom_right),
            matrix.transform_point_2d(self.top_left),
            matrix.transform_point_2d(self.top_right),
        )
    }

    /// Distance from bottom-left to bottom-right
    pub fn width(&self) -> f32 {
        nalgebra::distance(&self.bottom_left, &self.bottom_right)
    }

    /// Distance from bottom-left to top-left
    pub fn height(&self) -> f32 {
        nalgebra::distance(&self.bottom_left, &self.top_left)
    }

    /// Corners as an array in draw order: bl, br, tl, tr
    pub fn corners(&self) -> [Point2; 4] {
        [self.bottom_left, self.bottom_right, self.top_left, self.top_right]
    }

    /// Axis-aligned box around the quad
    pub fn aabb(&self) -> AABB {
        let corners = self.corners();
        let mut aabb = AABB::new(corners[0].coords, corners[0].coords);
        for corner in &corners[1..] {
            aabb = AABB::new(aabb.min.inf(&corner.coords), aabb.max.sup(&corner.coords));
        }
        aabb
    }

    /// Point inside a fractional position `(u, v)` of the quad
    ///
    /// Bilinear, so sheared and rotated quads interpolate along their edges.
    pub fn lerp(&self, u: f32, v: f32) -> Point2 {
        let bottom = utils::lerp_point(self.bottom_left, self.bottom_right, u);
        let top = utils::lerp_point(self.top_left, self.top_right, u);
        utils::lerp_point(bottom, top, v)
    }

    /// The sub-quad between the given fractional edges
    pub fn crop(&self, left: f32, right: f32, bottom: f32, top: f32) -> Self {
        Self::new(
            self.lerp(left, bottom),
            self.lerp(right, bottom),
            self.lerp(left, top),
            self.lerp(right, top),
        )
    }

    /// Whether the quad has (almost) no area
    pub fn is_degenerate(&self) -> bool {
        let edge_x = self.bottom_right - self.bottom_left;
        let edge_y = self.top_left - self.bottom_left;
        edge_x.perp(&edge_y).abs() <= f32::EPSILON
    }

    /// Whether the point lies inside the (convex) quad, in either winding
    ///
    /// Degenerate quads contain nothing.
    pub fn contains(&self, point: Point2) -> bool {
        if self.is_degenerate() {
            return false;
        }
        let ring = [self.bottom_left, self.bottom_right, self.top_right, self.top_left];
        let mut has_positive = false;
        let mut has_negative = false;
        for i in 0..4 {
            let a = ring[i];
            let b = ring[(i + 1) % 4];
            let side = (b - a).perp(&(point - a));
            has_positive |= side > 0.0;
            has_negative |= side < 0.0;
            if has_positive && has_negative {
                return false;
            }
        }
        true
    }
}

/// How a quad was mirrored by its transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipState {
    /// Not mirrored
    None,
    /// Mirrored horizontally
    X,
    /// Mirrored vertically
    Y,
    /// Mirrored on both axes
    Both,
}

/// Rename corners so bottom-left is really the bottom-left
///
/// A quad is flipped on X when its bottom-left lies right of its
/// bottom-right, and on Y when its bottom-left lies above its top-left.
pub fn normalize_flip(quad: &BoundingBox) -> (BoundingBox, FlipState) {
    let flipped_x = quad.bottom_left.x > quad.bottom_right.x;
    let flipped_y = quad.bottom_left.y > quad.top_left.y;
    let BoundingBox {
        bottom_left: bl,
        bottom_right: br,
        top_left: tl,
        top_right: tr,
    } = *quad;

    match (flipped_x, flipped_y) {
        (false, false) => (*quad, FlipState::None),
        (true, false) => (BoundingBox::new(br, bl, tr, tl), FlipState::X),
        (false, true) => (BoundingBox::new(tl, tr, bl, br), FlipState::Y),
        (true, true) => (BoundingBox::new(tr, tl, br, bl), FlipState::Both),
    }
}

/// Texture coordinates of the kept (cropped) region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexCoords {
    /// Left edge
    pub left: f32,
    /// Right edge
    pub right: f32,
    /// Bottom edge
    pub bottom: f32,
    /// Top edge
    pub top: f32,
}

impl Default for TexCoords {
    fn default() -> Self {
        Self {
            left: 0.0,
            right: 1.0,
            bottom: 0.0,
            top: 1.0,
        }
    }
}

/// Render-quad extent per local unit on each axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadScale {
    /// Horizontal extent per unit of width
    pub x: f32,
    /// Vertical extent per unit of height
    pub y: f32,
}

impl Default for QuadScale {
    fn default() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

impl QuadScale {
    fn measure(quad: &BoundingBox, width: f32, height: f32) -> Self {
        let axis = |extent: f32, size: f32| if size == 0.0 { 1.0 } else { extent / size.abs() };
        Self {
            x: axis(quad.width(), width),
            y: axis(quad.height(), height),
        }
    }
}

/// The boxes of one entity as seen through one viewport
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBoxes {
    /// Viewport-relative quad used for drawing (mirroring preserved)
    pub render: BoundingBox,
    /// Viewport-independent, flip-normalized quad used for picking
    pub hit_test: BoundingBox,
    /// Texture coordinates of the kept region
    pub tex_coords: TexCoords,
    /// Render-quad extent per local unit
    pub scale: QuadScale,
}

/// Projects local rectangles into render and hit-test quads
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundingBoxBuilder;

impl BoundingBoxBuilder {
    /// Fill `boxes` for a `width × height` entity
    ///
    /// `factor` maps virtual coordinates into the render layer's
    /// resolution. Crop is applied to the raw quads before flip
    /// normalization. Returns the render quad's extent per local unit (or
    /// the hit-test quad's when no render quad is built).
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        boxes: &mut BoundingBoxes,
        width: f32,
        height: f32,
        matrices: &ModelMatrices,
        viewport_matrix: &Mat4,
        factor: Vec2,
        crop: Option<&Crop>,
        build_render: bool,
        build_hit_test: bool,
    ) -> QuadScale {
        let (left, right, bottom, top) = crop.map_or((0.0, 1.0, 0.0, 1.0), Crop::edges);
        let mut scale = QuadScale::default();

        if build_render {
            let w = width * factor.x;
            let h = height * factor.y;
            let quad = BoundingBox::from_size(w, h)
                .transform(&(viewport_matrix * matrices.in_object_resolution));
            scale = QuadScale::measure(&quad, w, h);
            boxes.render = quad.crop(left, right, bottom, top);
            boxes.tex_coords = TexCoords { left, right, bottom, top };
            boxes.scale = scale;
        }

        if build_hit_test {
            let quad = BoundingBox::from_size(width, height).transform(&matrices.in_virtual_resolution);
            if !build_render {
                scale = QuadScale::measure(&quad, width, height);
            }
            let (normalized, _) = normalize_flip(&quad.crop(left, right, bottom, top));
            boxes.hit_test = normalized;
        }

        scale
    }
}

/// Cached boxes of one entity
///
/// The hit-test quad is shared by all viewports; render boxes are kept per
/// viewport together with the viewport-matrix version they were built from.
#[derive(Debug, Clone, Default)]
pub struct BoxSet {
    hit_test: Option<BoundingBox>,
    per_viewport: HashMap<ViewportId, (BoundingBoxes, u64)>,
}

impl BoxSet {
    /// Hit-test quad (`None` for entities without a size)
    pub fn hit_test(&self) -> Option<BoundingBox> {
        self.hit_test
    }
}

/// Per-entity bounding box cache
pub type BoundingBoxComponent = LockStep<BoxSet>;

impl Scene {
    /// Render and hit-test boxes of an entity as seen through a viewport
    ///
    /// `None` for unknown entities and viewports and for entities without a
    /// [`Scale`](crate::ecs::components::Scale). While the entity is locked
    /// the pre-lock boxes are returned when available. The cursor, like
    /// `ignore_viewport` entities, is placed in screen space without the camera.
    pub fn bounding_boxes(&mut self, entity: Entity, viewport: ViewportId) -> Option<BoundingBoxes> {
        self.sync();
        let caps = *self.world.capabilities(entity)?;
        let scale = caps.scale?;
        let (layer_id, layer) = self.layer_of(entity);
        let virtual_resolution = self.settings.virtual_resolution;

        let ignore_viewport =
            self.cursor == Some(entity) || caps.drawable.map_or(false, |d| d.ignore_viewport);
        let (viewport_matrix, version) = if ignore_viewport {
            self.viewports.get(viewport)?;
            (Mat4::identity(), 0)
        } else {
            let viewport_ref = self.viewports.get(viewport)?;
            self.viewport_matrices
                .get(viewport, viewport_ref, layer_id, &layer, virtual_resolution)
        };

        let matrices = self.model_matrices(entity);
        self.refresh_hit_test_box(entity);

        let build = || {
            let mut boxes = BoundingBoxes::default();
            BoundingBoxBuilder.build(
                &mut boxes,
                scale.width,
                scale.height,
                &matrices,
                &viewport_matrix,
                layer.resolution_factor(virtual_resolution),
                caps.crop.as_ref(),
                true,
                true,
            );
            boxes
        };

        let cache = self.bounds.get_mut(entity)?;
        if cache.is_locked() {
            let snapshot = cache
                .current()
                .and_then(|set| set.per_viewport.get(&viewport))
                .map(|(boxes, _)| *boxes);
            return Some(snapshot.unwrap_or_else(build));
        }

        let set = cache.live_mut()?;
        if let Some((boxes, built_against)) = set.per_viewport.get(&viewport) {
            if *built_against == version {
                return Some(*boxes);
            }
        }
        let boxes = build();
        set.per_viewport.insert(viewport, (boxes, version));
        Some(boxes)
    }

    /// Flip-normalized hit-test quad of an entity in virtual coordinates
    pub fn hit_test_box(&mut self, entity: Entity) -> Option<BoundingBox> {
        self.sync();
        self.refresh_hit_test_box(entity);
        self.bounds.get(entity)?.current()?.hit_test()
    }

    /// Recompute the viewport-independent part of the box cache if stale
    pub(crate) fn refresh_hit_test_box(&mut self, entity: Entity) {
        if !self.world.contains(entity) {
            return;
        }
        let needs_recompute = self.bounds.get(entity).map_or(true, LockStep::needs_recompute);
        if !needs_recompute {
            return;
        }

        let matrices = self.model_matrices(entity);
        let hit_test = self.world.capabilities(entity).and_then(|caps| {
            let scale = caps.scale?;
            let mut boxes = BoundingBoxes::default();
            BoundingBoxBuilder.build(
                &mut boxes,
                scale.width,
                scale.height,
                &matrices,
                &Mat4::identity(),
                Vec2::new(1.0, 1.0),
                caps.crop.as_ref(),
                false,
                true,
            );
            Some(boxes.hit_test)
        });
        cache_entry(&mut self.bounds, entity).publish(BoxSet {
            hit_test,
            per_viewport: HashMap::new(),
        });
    }

    /// Flag an entity's boxes stale
    pub(crate) fn mark_bounds_dirty(&mut self, entity: Entity) {
        if !self.world.contains(entity) {
            return;
        }
        if cache_entry(&mut self.bounds, entity).mark_dirty() {
            self.notify_bounds_changed(entity);
        }
    }

    /// Announce a box change: containing boxes up the tree go stale
    pub(crate) fn notify_bounds_changed(&mut self, entity: Entity) {
        self.events.send(SceneEvent::BoundingBoxChanged(entity));
        self.mark_with_children_dirty(entity);
    }
}
