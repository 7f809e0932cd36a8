//! Render layers

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec2;

slotmap::new_key_type! {
    /// Handle of a [`RenderLayer`] owned by the scene
    pub struct LayerId;
}

/// Pixel resolution of a render target or coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// Create a resolution
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// As a float vector
    pub fn as_vec2(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// Per-axis factor that maps `base` coordinates into this resolution
    ///
    /// A zero-sized base maps with factor 1.
    pub fn factor_from(&self, base: Resolution) -> Vec2 {
        let axis = |target: u32, base: u32| {
            if base == 0 {
                1.0
            } else {
                target as f32 / base as f32
            }
        };
        Vec2::new(axis(self.width, base.width), axis(self.height, base.height))
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(320, 200)
    }
}

/// A depth band of the scene
///
/// Layers are the coarse sort key: every entity on a farther layer is drawn
/// before any entity on a nearer one (larger `z` is farther).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderLayer {
    /// Depth of the layer; larger is farther
    pub z: i32,
    /// Resolution this layer renders at; `None` uses the virtual resolution
    pub independent_resolution: Option<Resolution>,
    /// How much the camera position moves this layer (1 = fully)
    pub parallax: Vec2,
}

impl Default for RenderLayer {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RenderLayer {
    /// Layer at depth `z` with no parallax and the virtual resolution
    pub fn new(z: i32) -> Self {
        Self {
            z,
            independent_resolution: None,
            parallax: Vec2::new(1.0, 1.0),
        }
    }

    /// Builder pattern: Render at its own resolution
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.independent_resolution = Some(resolution);
        self
    }

    /// Builder pattern: Set the parallax factor
    pub fn with_parallax(mut self, x: f32, y: f32) -> Self {
        self.parallax = Vec2::new(x, y);
        self
    }

    /// The resolution entities on this layer are drawn at
    pub fn resolution(&self, virtual_resolution: Resolution) -> Resolution {
        self.independent_resolution.unwrap_or(virtual_resolution)
    }

    /// Factor mapping virtual-resolution coordinates into this layer's resolution
    pub fn resolution_factor(&self, virtual_resolution: Resolution) -> Vec2 {
        self.resolution(virtual_resolution).factor_from(virtual_resolution)
    }
}
