//! ECS Components module
//!
//! Capability components an entity may or may not expose. Absence of a
//! capability is a valid, cheap state: consumers fall back to identity
//! transforms and no-op behavior instead of reporting errors.

pub mod drawable;
pub mod image;
pub mod transform;

pub use drawable::DrawableInfo;
pub use image::{Crop, Image, Sprite, TextureId};
pub use transform::{JumpOffset, Rotate, Scale, Translate};

/// The optional capabilities attached to one entity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Capabilities {
    /// Size and scale; without it the entity has an identity matrix and no box
    pub scale: Option<Scale>,
    /// Position
    pub translate: Option<Translate>,
    /// Rotation
    pub rotate: Option<Rotate>,
    /// Pivot and current sprite
    pub image: Option<Image>,
    /// Layer, viewport and shader settings
    pub drawable: Option<DrawableInfo>,
    /// Position nudge
    pub jump_offset: Option<JumpOffset>,
    /// Visible sub-rectangle
    pub crop: Option<Crop>,
}

impl Capabilities {
    /// Builder pattern: Set size/scale
    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Builder pattern: Set position
    pub fn with_translate(mut self, translate: Translate) -> Self {
        self.translate = Some(translate);
        self
    }

    /// Builder pattern: Set rotation
    pub fn with_rotate(mut self, rotate: Rotate) -> Self {
        self.rotate = Some(rotate);
        self
    }

    /// Builder pattern: Set image
    pub fn with_image(mut self, image: Image) -> Self {
        self.image = Some(image);
        self
    }

    /// Builder pattern: Set drawable info
    pub fn with_drawable(mut self, drawable: DrawableInfo) -> Self {
        self.drawable = Some(drawable);
        self
    }

    /// Builder pattern: Set jump offset
    pub fn with_jump_offset(mut self, jump_offset: JumpOffset) -> Self {
        self.jump_offset = Some(jump_offset);
        self
    }

    /// Builder pattern: Set crop
    pub fn with_crop(mut self, crop: Crop) -> Self {
        self.crop = Some(crop);
        self
    }

    /// Horizontal position (0 without [`Translate`])
    pub fn x(&self) -> f32 {
        self.translate.map_or(0.0, |t| t.x)
    }

    /// Depth used for ordering: own z plus the current sprite's z offset
    pub fn render_z(&self) -> f32 {
        let z = self.translate.map_or(0.0, |t| t.effective_z());
        z + self.image.map_or(0.0, |image| image.sprite_z())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_z_adds_sprite_offset() {
        let caps = Capabilities::default()
            .with_translate(Translate::new(0.0, 10.0))
            .with_image(Image::default().with_sprite(Sprite {
                z: 2.5,
                ..Default::default()
            }));
        assert!((caps.render_z() - 12.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_capabilities_default_to_zero() {
        let caps = Capabilities::default();
        assert!(caps.x().abs() < f32::EPSILON);
        assert!(caps.render_z().abs() < f32::EPSILON);
    }
}
