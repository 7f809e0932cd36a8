//! # Rendering System
//!
//! The derived data a 2D scene needs before anything reaches the GPU.
//!
//! ## Architecture
//!
//! - **Model matrices**: Per-entity local-to-virtual transforms composed through the entity tree
//! - **Bounding boxes**: Render quads per viewport and flip-normalized hit-test quads
//! - **Render order**: Strict total order used for drawing and picking
//! - **Display lists**: What each viewport shows, sorted once per frame
//! - **Batching**: Display lists grouped into resolution/shader runs for an external rasterizer
//!
//! Every derived cache is wrapped in a [`LockStep`] so that bulk mutations
//! can be applied atomically with at most one notification per entity.

pub mod batch_renderer;
pub mod bounding_box;
pub mod bounding_box_children;
pub mod display_list;
pub mod layer;
pub mod lock_step;
pub mod model_matrix;
pub mod render_order;
pub mod renderer;
pub mod viewport;

#[cfg(test)]
mod tests;

pub use batch_renderer::{BatchStats, CapacityHint, RenderBatch, RenderPipeline, ViewportBatches};
pub use bounding_box::{BoundingBox, BoundingBoxBuilder, BoundingBoxes, FlipState, TexCoords, AABB};
pub use display_list::{DisplayList, DisplayListBuilder};
pub use layer::{LayerId, RenderLayer, Resolution};
pub use lock_step::LockStep;
pub use model_matrix::ModelMatrices;
pub use render_order::{sort_by_render_order, RenderOrderComparator};
pub use renderer::{DrawInstruction, EntityRenderer, QuadVertex, RenderContext, RendererRegistry, ShaderId, SpriteRenderer};
pub use viewport::{DisplayListSettings, ProjectionBox, Viewport, ViewportId};
