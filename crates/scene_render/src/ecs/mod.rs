//! Entity storage
//!
//! Entities are generational handles into a [`World`] that owns each
//! entity's stable id, capability components, tree links and visibility.
//! Mutations are recorded as [`PropertyChange`]s that the scene drains to
//! invalidate its caches.

pub mod components;
pub mod entity;
pub mod world;

pub use components::Capabilities;
pub use entity::Entity;
pub use world::{ChangeFlags, EntityRecord, PropertyChange, World};
