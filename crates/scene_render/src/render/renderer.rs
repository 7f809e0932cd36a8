//! Entity renderers and the draw instructions they emit
//!
//! Rasterization happens outside this crate. An [`EntityRenderer`] turns an
//! entity's render box into [`DrawInstruction`]s that the batch renderer
//! groups and hands over. Entities without a registered renderer fall back
//! to the built-in [`SpriteRenderer`].

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::bounding_box::BoundingBoxes;
use super::viewport::ViewportId;
use crate::ecs::components::{Capabilities, TextureId};
use crate::ecs::Entity;
use crate::foundation::time::FrameContext;

/// Identifier of a shader program known to the rasterizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShaderId(pub u32);

impl ShaderId {
    /// The shader used when nothing else is requested
    pub const DEFAULT: ShaderId = ShaderId(0);
}

impl Default for ShaderId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One corner of a textured quad
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct QuadVertex {
    /// Position in the render layer's resolution
    pub position: [f32; 2],
    /// Texture coordinate
    pub tex_coord: [f32; 2],
}

impl QuadVertex {
    /// Create a vertex
    pub fn new(position: [f32; 2], tex_coord: [f32; 2]) -> Self {
        Self { position, tex_coord }
    }
}

/// A single textured quad to draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawInstruction {
    /// Entity the quad belongs to
    pub entity: Entity,
    /// Texture to sample, `None` for untextured quads
    pub texture: Option<TextureId>,
    /// Corners in bottom-left, bottom-right, top-left, top-right order
    pub vertices: [QuadVertex; 4],
}

impl DrawInstruction {
    /// Vertex data as raw bytes for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Everything a renderer may look at for one entity in one viewport
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Entity being drawn
    pub entity: Entity,
    /// Viewport being drawn
    pub viewport: ViewportId,
    /// The entity's boxes in that viewport
    pub boxes: &'a BoundingBoxes,
    /// The entity's capabilities
    pub capabilities: &'a Capabilities,
    /// Current frame
    pub frame: &'a FrameContext,
}

/// Emits draw instructions for an entity
pub trait EntityRenderer: Send + Sync {
    /// Instruction for this frame, or `None` to draw nothing
    fn instruction(&mut self, context: &RenderContext<'_>) -> Option<DrawInstruction>;

    /// Human-readable name for logs
    fn name(&self) -> &str {
        "renderer"
    }
}

/// Draws an entity's current sprite as a textured quad over its render box
#[derive(Debug, Clone, Copy, Default)]
pub struct SpriteRenderer;

impl EntityRenderer for SpriteRenderer {
    fn instruction(&mut self, context: &RenderContext<'_>) -> Option<DrawInstruction> {
        let sprite = context.capabilities.image?.current_sprite?;
        let quad = &context.boxes.render;
        let tex = &context.boxes.tex_coords;
        let vertex = |corner: crate::foundation::math::Point2, u: f32, v: f32| {
            QuadVertex::new([corner.x, corner.y], [u, v])
        };
        Some(DrawInstruction {
            entity: context.entity,
            texture: sprite.texture,
            vertices: [
                vertex(quad.bottom_left, tex.left, tex.bottom),
                vertex(quad.bottom_right, tex.right, tex.bottom),
                vertex(quad.top_left, tex.left, tex.top),
                vertex(quad.top_right, tex.right, tex.top),
            ],
        })
    }

    fn name(&self) -> &str {
        "sprite"
    }
}

struct Registration {
    z_priority: i32,
    renderer: Box<dyn EntityRenderer>,
}

/// Renderers per entity, ordered by z-priority
#[derive(Default)]
pub struct RendererRegistry {
    renderers: HashMap<Entity, Vec<Registration>>,
    fallback: SpriteRenderer,
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("entities", &self.renderers.len())
            .finish()
    }
}

impl RendererRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a renderer to an entity; lower priorities draw first
    ///
    /// Registrations with equal priority keep their insertion order.
    pub fn register(&mut self, entity: Entity, z_priority: i32, renderer: Box<dyn EntityRenderer>) {
        let list = self.renderers.entry(entity).or_default();
        let at = list.partition_point(|r| r.z_priority <= z_priority);
        list.insert(at, Registration { z_priority, renderer });
    }

    /// Drop every renderer of an entity
    pub fn unregister(&mut self, entity: Entity) {
        self.renderers.remove(&entity);
    }

    /// Number of renderers registered for an entity
    pub fn count(&self, entity: Entity) -> usize {
        self.renderers.get(&entity).map_or(0, Vec::len)
    }

    /// Append the entity's instructions for this frame to `out`
    pub fn emit(&mut self, context: &RenderContext<'_>, out: &mut Vec<DrawInstruction>) {
        match self.renderers.get_mut(&context.entity) {
            Some(list) if !list.is_empty() => {
                out.extend(list.iter_mut().filter_map(|r| r.renderer.instruction(context)));
            }
            _ => out.extend(self.fallback.instruction(context)),
        }
    }
}
