//! Scene management
//!
//! The [`Scene`] is the single owner of everything the renderer reads: the
//! entity [`World`](crate::ecs::World), render layers, viewports, the current
//! [`Room`] and UI, and the derived per-entity caches (model matrices,
//! bounding boxes, containing boxes).
//!
//! ## Architecture
//!
//! ```text
//! World mutation (capabilities, tree, visibility)
//!      ↓ PropertyChange queue
//! Scene::sync (dirty flags, SceneEvent notifications)
//!      ↓ lazy recompute on query
//! Display list → sort → batches
//! ```

mod room;
mod scene_graph;

pub use room::{Area, Room, ScalingArea, ScalingAxis, WalkBehind};
pub use scene_graph::{Scene, SharedScene};

use thiserror::Error;

use crate::ecs::Entity;
use crate::render::layer::LayerId;
use crate::render::viewport::ViewportId;

/// Errors reported by the scene mutation API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The entity handle is stale or was never issued
    #[error("Unknown entity: {0:?}")]
    UnknownEntity(Entity),

    /// Another entity already uses this id
    #[error("Duplicate entity id: {0}")]
    DuplicateId(String),

    /// The re-parenting would make an entity its own ancestor
    #[error("Cyclic parent: {child:?} cannot be placed under {parent:?}")]
    CyclicParent {
        /// Entity being moved
        child: Entity,
        /// Requested parent
        parent: Entity,
    },

    /// The layer handle is stale or was never issued
    #[error("Unknown render layer: {0:?}")]
    UnknownLayer(LayerId),

    /// The viewport handle is stale or was never issued
    #[error("Unknown viewport: {0:?}")]
    UnknownViewport(ViewportId),

    /// The main viewport cannot be removed
    #[error("The main viewport cannot be removed")]
    MainViewportRemoval,
}
