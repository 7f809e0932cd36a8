//! Drawing-related capability

use crate::render::layer::LayerId;
use crate::render::renderer::ShaderId;

/// How and where an entity is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawableInfo {
    /// Render layer; `None` inherits the parent's layer (or the scene default)
    pub render_layer: Option<LayerId>,
    /// Draw in screen space, unaffected by the viewport camera
    pub ignore_viewport: bool,
    /// Never apply room scaling areas to this entity
    pub ignore_scaling_area: bool,
    /// Shader override; `None` uses the pipeline default
    pub shader: Option<ShaderId>,
}

impl DrawableInfo {
    /// Drawable on a specific layer
    pub fn on_layer(layer: LayerId) -> Self {
        Self {
            render_layer: Some(layer),
            ..Default::default()
        }
    }

    /// Builder pattern: Draw in screen space
    pub fn ignoring_viewport(mut self) -> Self {
        self.ignore_viewport = true;
        self
    }

    /// Builder pattern: Opt out of scaling areas
    pub fn ignoring_scaling_area(mut self) -> Self {
        self.ignore_scaling_area = true;
        self
    }

    /// Builder pattern: Use a specific shader
    pub fn with_shader(mut self, shader: ShaderId) -> Self {
        self.shader = Some(shader);
        self
    }
}
