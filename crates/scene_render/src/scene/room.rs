//! Rooms and their areas

use crate::ecs::Entity;
use crate::foundation::math::{utils, Vec2};
use crate::render::bounding_box::AABB;

/// Which axes a scaling area scales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalingAxis {
    /// Horizontal only
    X,
    /// Vertical only
    Y,
    /// Both axes
    #[default]
    Both,
}

/// Perspective scaling: entities shrink as they walk up the area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingArea {
    /// Scale at the top of the area
    pub min_scaling: f32,
    /// Scale at the bottom of the area
    pub max_scaling: f32,
    /// Scaled axes
    pub axis: ScalingAxis,
}

impl ScalingArea {
    /// Scale factors for a point at height `y` inside `shape`
    ///
    /// Interpolates from `max_scaling` at the bottom edge to `min_scaling`
    /// at the top edge.
    pub fn factor_at(&self, shape: &AABB, y: f32) -> Vec2 {
        let height = shape.max.y - shape.min.y;
        let t = if height > 0.0 {
            ((y - shape.min.y) / height).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let factor = utils::lerp(self.max_scaling, self.min_scaling, t);
        match self.axis {
            ScalingAxis::X => Vec2::new(factor, 1.0),
            ScalingAxis::Y => Vec2::new(1.0, factor),
            ScalingAxis::Both => Vec2::new(factor, factor),
        }
    }
}

/// A slice of the background drawn in front of entities above its baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkBehind {
    /// Depth assigned to the slice; entities with a larger z are behind it
    pub baseline: f32,
    /// Entity drawing the slice
    pub drawable: Entity,
}

/// A region of a room with optional effects
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    /// Stable id
    pub id: String,
    /// Disabled areas have no effect and are not drawn
    pub enabled: bool,
    /// Region covered, in room coordinates
    pub shape: AABB,
    /// Perspective scaling inside the area
    pub scaling: Option<ScalingArea>,
    /// Walk-behind slice for this area
    pub walk_behind: Option<WalkBehind>,
    /// Entity visualizing the area for debugging
    pub debug_draw: Option<Entity>,
}

impl Area {
    /// Enabled area without effects
    pub fn new(id: impl Into<String>, shape: AABB) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            shape,
            scaling: None,
            walk_behind: None,
            debug_draw: None,
        }
    }

    /// Builder pattern: Add perspective scaling
    pub fn with_scaling(mut self, scaling: ScalingArea) -> Self {
        self.scaling = Some(scaling);
        self
    }

    /// Builder pattern: Add a walk-behind slice
    pub fn with_walk_behind(mut self, walk_behind: WalkBehind) -> Self {
        self.walk_behind = Some(walk_behind);
        self
    }

    /// Builder pattern: Add a debug-draw entity
    pub fn with_debug_draw(mut self, entity: Entity) -> Self {
        self.debug_draw = Some(entity);
        self
    }
}

/// The current location: background, objects and areas
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    /// Background entity drawn behind everything in the room
    pub background: Option<Entity>,
    /// Objects placed in the room
    pub objects: Vec<Entity>,
    /// Areas in priority order
    pub areas: Vec<Area>,
    /// Whether the player entity is drawn in this room
    pub show_player: bool,
}

impl Default for Room {
    fn default() -> Self {
        Self {
            background: None,
            objects: Vec::new(),
            areas: Vec::new(),
            show_player: true,
        }
    }
}

impl Room {
    /// Scale factors for an entity standing at `position`
    ///
    /// The first enabled area with scaling whose shape contains the point
    /// decides; outside every scaling area the factor is 1.
    pub fn scaling_at(&self, position: Vec2) -> Vec2 {
        self.areas
            .iter()
            .filter(|area| area.enabled)
            .find_map(|area| {
                let scaling = area.scaling?;
                area.shape
                    .contains_point(position)
                    .then(|| scaling.factor_at(&area.shape, position.y))
            })
            .unwrap_or_else(|| Vec2::new(1.0, 1.0))
    }

    /// Whether any entity in the room's draw sets is `entity`
    pub fn contains(&self, entity: Entity) -> bool {
        self.background == Some(entity)
            || self.objects.contains(&entity)
            || self.areas.iter().any(|area| {
                area.debug_draw == Some(entity)
                    || area.walk_behind.map(|w| w.drawable) == Some(entity)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn floor() -> AABB {
        AABB::new(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0))
    }

    #[test]
    fn test_scaling_interpolates_bottom_to_top() {
        let scaling = ScalingArea {
            min_scaling: 0.5,
            max_scaling: 1.0,
            axis: ScalingAxis::Both,
        };
        let bottom = scaling.factor_at(&floor(), 0.0);
        let middle = scaling.factor_at(&floor(), 50.0);
        let top = scaling.factor_at(&floor(), 100.0);
        assert_relative_eq!(bottom.x, 1.0);
        assert_relative_eq!(middle.y, 0.75);
        assert_relative_eq!(top.x, 0.5);
    }

    #[test]
    fn test_single_axis_scaling() {
        let scaling = ScalingArea {
            min_scaling: 0.5,
            max_scaling: 0.5,
            axis: ScalingAxis::Y,
        };
        let factor = scaling.factor_at(&floor(), 10.0);
        assert_relative_eq!(factor.x, 1.0);
        assert_relative_eq!(factor.y, 0.5);
    }

    #[test]
    fn test_disabled_and_outside_areas_do_not_scale() {
        let mut room = Room::default();
        let mut area = Area::new("floor", floor()).with_scaling(ScalingArea {
            min_scaling: 0.5,
            max_scaling: 0.5,
            axis: ScalingAxis::Both,
        });
        area.enabled = false;
        room.areas.push(area);

        let inside = room.scaling_at(Vec2::new(50.0, 50.0));
        assert_relative_eq!(inside.x, 1.0);

        room.areas[0].enabled = true;
        assert_relative_eq!(room.scaling_at(Vec2::new(50.0, 50.0)).x, 0.5);
        assert_relative_eq!(room.scaling_at(Vec2::new(150.0, 50.0)).x, 1.0);
    }
}
