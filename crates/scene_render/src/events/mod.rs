//! Change notifications produced by the scene caches
//!
//! Key principles:
//! - Handler returns bool (true = consumed, stops forwarding)
//! - Registration system (only notify interested handlers)
//! - Queued delivery: caches enqueue, the owner dispatches or drains

use std::collections::HashMap;

use crate::ecs::Entity;

/// Event type identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// An entity's model matrices changed (or will on next query)
    ModelMatrixChanged,
    /// An entity's bounding boxes changed
    BoundingBoxChanged,
    /// The containing box of an entity and its descendants changed
    BoundingBoxWithChildrenChanged,
}

/// A change notification about one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    /// See [`EventType::ModelMatrixChanged`]
    ModelMatrixChanged(Entity),
    /// See [`EventType::BoundingBoxChanged`]
    BoundingBoxChanged(Entity),
    /// See [`EventType::BoundingBoxWithChildrenChanged`]
    BoundingBoxWithChildrenChanged(Entity),
}

impl SceneEvent {
    /// Type of this event
    pub fn event_type(&self) -> EventType {
        match self {
            Self::ModelMatrixChanged(_) => EventType::ModelMatrixChanged,
            Self::BoundingBoxChanged(_) => EventType::BoundingBoxChanged,
            Self::BoundingBoxWithChildrenChanged(_) => EventType::BoundingBoxWithChildrenChanged,
        }
    }

    /// Entity the event is about
    pub fn entity(&self) -> Entity {
        match *self {
            Self::ModelMatrixChanged(entity)
            | Self::BoundingBoxChanged(entity)
            | Self::BoundingBoxWithChildrenChanged(entity) => entity,
        }
    }
}

/// Event handler trait
/// Returns true if event was consumed (stops forwarding)
/// Returns false to allow forwarding to other handlers
pub trait EventHandler: Send + Sync {
    /// Handle an event, return true if consumed
    fn on_event(&mut self, event: &SceneEvent) -> bool;
}

/// Event system with registration and queuing
/// Follows chain of responsibility pattern
#[derive(Default)]
pub struct EventSystem {
    queue: Vec<SceneEvent>,
    handlers: HashMap<EventType, Vec<Box<dyn EventHandler>>>,
}

impl std::fmt::Debug for EventSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSystem")
            .field("queued", &self.queue.len())
            .field("handler_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EventSystem {
    /// Create a new empty event system
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a specific event type
    /// Only handlers registered for this type will be notified
    pub fn register_handler(&mut self, event_type: EventType, handler: Box<dyn EventHandler>) {
        self.handlers.entry(event_type).or_default().push(handler);
    }

    /// Queue an event for the next dispatch
    pub fn send(&mut self, event: SceneEvent) {
        self.queue.push(event);
    }

    /// Number of queued events
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Deliver all queued events to registered handlers
    pub fn dispatch(&mut self) {
        let queued = std::mem::take(&mut self.queue);
        for event in &queued {
            if let Some(handlers) = self.handlers.get_mut(&event.event_type()) {
                for handler in handlers.iter_mut() {
                    if handler.on_event(event) {
                        // Event consumed, stop forwarding
                        break;
                    }
                }
            }
        }
    }

    /// Remove and return all queued events without dispatching them
    pub fn drain(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.queue)
    }

    /// Clear all queued events
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
