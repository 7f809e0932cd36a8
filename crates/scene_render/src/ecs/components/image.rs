//! Image, sprite and crop capabilities

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec2;

/// Opaque handle of a texture owned by the external asset layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureId(pub u64);

/// The frame currently shown by an [`Image`]
///
/// Animation frames carry their own small transform (offset, scale,
/// rotation) applied before the entity's transform, and a z offset added to
/// the entity's depth for ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    /// Texture to draw, if loaded
    pub texture: Option<TextureId>,
    /// Horizontal offset
    pub x: f32,
    /// Vertical offset
    pub y: f32,
    /// Depth offset added to the entity's z
    pub z: f32,
    /// Horizontal scale factor
    pub scale_x: f32,
    /// Vertical scale factor
    pub scale_y: f32,
    /// Counter-clockwise angle in degrees
    pub angle: f32,
}

impl Default for Sprite {
    fn default() -> Self {
        Self {
            texture: None,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
        }
    }
}

impl Sprite {
    /// Sprite showing `texture` with an identity transform
    pub fn from_texture(texture: TextureId) -> Self {
        Self {
            texture: Some(texture),
            ..Default::default()
        }
    }
}

/// Visual facet of an entity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Image {
    /// Pivot as a fraction of the scaled size; `(0, 0)` is bottom-left
    pub pivot: Vec2,
    /// Frame currently displayed
    pub current_sprite: Option<Sprite>,
}

impl Image {
    /// Image with a pivot and no sprite
    pub fn with_pivot(x: f32, y: f32) -> Self {
        Self {
            pivot: Vec2::new(x, y),
            current_sprite: None,
        }
    }

    /// Builder pattern: Set the displayed sprite
    pub fn with_sprite(mut self, sprite: Sprite) -> Self {
        self.current_sprite = Some(sprite);
        self
    }

    /// Depth offset of the current sprite
    pub fn sprite_z(&self) -> f32 {
        self.current_sprite.map_or(0.0, |sprite| sprite.z)
    }
}

/// Fractional sub-rectangle of an entity that remains visible
///
/// All values are fractions of the entity's local rectangle; `(0, 0, 1, 1)`
/// keeps everything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crop {
    /// Left edge
    pub x: f32,
    /// Bottom edge
    pub y: f32,
    /// Kept width
    pub width: f32,
    /// Kept height
    pub height: f32,
}

impl Default for Crop {
    fn default() -> Self {
        Self::full()
    }
}

impl Crop {
    /// Crop that keeps the whole rectangle
    pub fn full() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }

    /// Crop to the given fractional rectangle
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Edges `(left, right, bottom, top)` clamped to `[0, 1]`
    pub fn edges(&self) -> (f32, f32, f32, f32) {
        let left = self.x.clamp(0.0, 1.0);
        let bottom = self.y.clamp(0.0, 1.0);
        let right = (self.x + self.width).clamp(left, 1.0);
        let top = (self.y + self.height).clamp(bottom, 1.0);
        (left, right, bottom, top)
    }

    /// Whether the crop keeps the whole rectangle
    pub fn is_full(&self) -> bool {
        self.edges() == (0.0, 1.0, 0.0, 1.0)
    }
}
