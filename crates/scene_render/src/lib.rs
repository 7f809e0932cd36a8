//! # Scene Render
//!
//! Transform, ordering and batching core for hierarchical 2D scenes.
//!
//! ## Features
//!
//! - **Hierarchical transforms**: Model matrices composed through an entity tree, in virtual and per-layer resolution
//! - **Lock-step updates**: Bulk mutations with snapshot reads and a single change notification per entity
//! - **Bounding boxes**: Render quads per viewport, flip-normalized hit-test quads, containing boxes
//! - **Render order**: Ancestor, layer and depth ordering shared by drawing and picking
//! - **Batching**: Per-viewport display lists grouped into resolution/shader batches
//!
//! ## Quick Start
//!
//! ```rust
//! use scene_render::prelude::*;
//!
//! fn main() -> Result<(), SceneError> {
//!     let mut scene = Scene::default();
//!     let hero = scene.spawn(
//!         "hero",
//!         Capabilities::default()
//!             .with_scale(Scale::from_size(16.0, 32.0))
//!             .with_translate(Translate::new(50.0, 50.0))
//!             .with_image(Image::default().with_sprite(Sprite::from_texture(TextureId(1)))),
//!     )?;
//!     scene.update_room(|room| room.objects.push(hero));
//!
//!     let mut pipeline = RenderPipeline::new();
//!     let frame = FrameContext::new();
//!     let output = pipeline.render_frame(&mut scene, &frame);
//!     assert_eq!(output[0].batches.len(), 1);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod ecs;
pub mod events;
pub mod foundation;
pub mod input;
pub mod render;
pub mod scene;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, RenderSettings},
        ecs::{
            components::{Crop, DrawableInfo, Image, JumpOffset, Rotate, Scale, Sprite, TextureId, Translate},
            Capabilities, Entity, World,
        },
        events::{EventSystem, SceneEvent},
        foundation::{
            math::{Mat4, Point2, Vec2},
            time::FrameContext,
        },
        input::{HitTester, MouseState},
        render::{
            BatchStats, BoundingBox, BoundingBoxes, EntityRenderer, LayerId, ModelMatrices, RenderBatch,
            RenderLayer, RenderPipeline, Resolution, ShaderId, Viewport, ViewportBatches, ViewportId,
        },
        scene::{Room, Scene, SceneError, SharedScene},
    };
}
