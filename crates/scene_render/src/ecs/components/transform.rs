//! Spatial capability components
//!
//! Pure data components. They carry no logic beyond small constructors; the
//! matrices built from them live in [`crate::render::model_matrix`].

use crate::foundation::math::Vec2;

/// Size and scale of an entity
///
/// `width`/`height` are the unscaled size of the entity's local rectangle;
/// `scale_x`/`scale_y` stretch it (negative values mirror it).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    /// Unscaled width
    pub width: f32,
    /// Unscaled height
    pub height: f32,
    /// Horizontal scale factor
    pub scale_x: f32,
    /// Vertical scale factor
    pub scale_y: f32,
}

impl Scale {
    /// Unscaled size with scale factors of 1
    pub fn from_size(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    /// Builder pattern: Set scale factors
    pub fn with_scale(mut self, scale_x: f32, scale_y: f32) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    /// Width after scaling
    pub fn scaled_width(&self) -> f32 {
        self.width * self.scale_x
    }

    /// Height after scaling
    pub fn scaled_height(&self) -> f32 {
        self.height * self.scale_y
    }
}

/// Position of an entity relative to its parent
///
/// `z` defaults to the entity's `y`, so entities further up the screen are
/// drawn behind entities below them unless a z is set explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Translate {
    /// Horizontal position
    pub x: f32,
    /// Vertical position (y-up)
    pub y: f32,
    /// Explicit depth; `None` means "use `y`"
    pub z: Option<f32>,
}

impl Translate {
    /// Position with an implicit z
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: None }
    }

    /// Builder pattern: Set an explicit z
    pub fn with_z(mut self, z: f32) -> Self {
        self.z = Some(z);
        self
    }

    /// Depth used for render ordering (larger is farther)
    pub fn effective_z(&self) -> f32 {
        self.z.unwrap_or(self.y)
    }
}

/// Rotation around the entity's pivot
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotate {
    /// Counter-clockwise angle in degrees
    pub angle: f32,
}

impl Rotate {
    /// Rotation by `angle` degrees
    pub fn degrees(angle: f32) -> Self {
        Self { angle }
    }
}

/// Temporary positional nudge (e.g. a jump animation) added on top of [`Translate`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpOffset {
    /// Offset added to the position
    pub offset: Vec2,
}

impl JumpOffset {
    /// Offset by `(x, y)`
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            offset: Vec2::new(x, y),
        }
    }
}
