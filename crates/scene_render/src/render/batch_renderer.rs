//! # Batch Renderer
//!
//! Turns each viewport's display list into a list of [`RenderBatch`]es ready
//! for an external rasterizer.
//!
//! ## Architecture
//!
//! - **RenderPipeline**: Walks every viewport once per frame and batches its draw instructions
//! - **RenderBatch**: Run of consecutive instructions sharing a resolution and a shader
//! - **BatchStats**: Per-frame counters for monitoring
//!
//! Batching never reorders: a new batch starts whenever the next entity's
//! resolution or shader differs from the running batch, so the draw order of
//! the display list is preserved exactly.

use std::collections::HashMap;
use std::sync::{RwLock, TryLockError};

use log::{debug, trace, warn};

use super::display_list::DisplayListBuilder;
use super::layer::Resolution;
use super::renderer::{DrawInstruction, RenderContext, RendererRegistry, ShaderId};
use super::viewport::ViewportId;
use crate::ecs::Entity;
use crate::foundation::time::FrameContext;
use crate::scene::{Scene, SceneError};

/// Consecutive draw instructions sharing a resolution and a shader
#[derive(Debug, Clone, PartialEq)]
pub struct RenderBatch {
    resolution: Resolution,
    shader: ShaderId,
    instructions: Vec<DrawInstruction>,
}

impl RenderBatch {
    fn with_capacity(resolution: Resolution, shader: ShaderId, capacity: usize) -> Self {
        Self {
            resolution,
            shader,
            instructions: Vec::with_capacity(capacity),
        }
    }

    /// Resolution the instructions are expressed in
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Shader all instructions are drawn with
    pub fn shader(&self) -> ShaderId {
        self.shader
    }

    /// Instructions in draw order
    pub fn instructions(&self) -> &[DrawInstruction] {
        &self.instructions
    }

    /// Check if this batch is empty
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Get the number of instructions in this batch
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }
}

/// Batches produced for one viewport
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportBatches {
    /// Viewport the batches draw into
    pub viewport: ViewportId,
    /// Batches in draw order
    pub batches: Vec<RenderBatch>,
}

/// Statistics for batch rendering performance monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Total number of draw instructions emitted
    pub total_instructions: usize,

    /// Number of batches created
    pub batch_count: usize,

    /// Number of resolution or shader switches between consecutive batches
    pub state_changes: usize,

    /// Viewports whose previous batches were reused because the scene was busy
    pub skipped_viewports: usize,
}

impl BatchStats {
    /// Calculate average instructions per batch
    pub fn avg_instructions_per_batch(&self) -> f32 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.total_instructions as f32 / self.batch_count as f32
        }
    }
}

/// High-water marks used to pre-size the next frame's batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapacityHint {
    /// Most batches seen in one frame
    pub batches: usize,
    /// Most instructions seen in one batch
    pub batch_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BatchKey {
    resolution: Resolution,
    shader: ShaderId,
}

impl BatchKey {
    fn of(scene: &Scene, entity: Entity) -> Self {
        let (_, layer) = scene.layer_of(entity);
        let shader = scene
            .world
            .capabilities(entity)
            .and_then(|caps| caps.drawable)
            .and_then(|drawable| drawable.shader)
            .unwrap_or(scene.settings.default_shader);
        Self {
            resolution: layer.resolution(scene.settings.virtual_resolution),
            shader,
        }
    }
}

/// Per-frame driver from scene to batches
#[derive(Debug, Default)]
pub struct RenderPipeline {
    builder: DisplayListBuilder,
    registry: RendererRegistry,
    hints: HashMap<ViewportId, CapacityHint>,
    last_frame: HashMap<ViewportId, Vec<RenderBatch>>,
    scratch: Vec<DrawInstruction>,
    stats: BatchStats,
}

impl RenderPipeline {
    /// Create a pipeline with an empty renderer registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pipeline around an existing registry
    pub fn with_registry(registry: RendererRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    /// Entity renderers
    pub fn registry(&self) -> &RendererRegistry {
        &self.registry
    }

    /// Entity renderers, for registration
    pub fn registry_mut(&mut self) -> &mut RendererRegistry {
        &mut self.registry
    }

    /// Statistics of the last frame
    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    /// Capacity high-water marks of a viewport
    pub fn capacity_hint(&self, viewport: ViewportId) -> Option<CapacityHint> {
        self.hints.get(&viewport).copied()
    }

    /// Batches produced for a viewport by the last successful pass
    pub fn last_batches(&self, viewport: ViewportId) -> Option<&[RenderBatch]> {
        self.last_frame.get(&viewport).map(Vec::as_slice)
    }

    /// Render every viewport of an exclusively owned scene
    pub fn render_frame(&mut self, scene: &mut Scene, frame: &FrameContext) -> Vec<ViewportBatches> {
        self.stats = BatchStats::default();
        let viewports = scene.viewport_ids().to_vec();
        self.last_frame.retain(|id, _| viewports.contains(id));

        let mut output = Vec::with_capacity(viewports.len());
        for viewport in viewports {
            match self.render_viewport(scene, viewport, frame) {
                Ok(batches) => output.push(ViewportBatches { viewport, batches }),
                Err(err) => warn!("Skipping viewport {:?}: {}", viewport, err),
            }
        }
        trace!(
            "Frame {}: {} instructions in {} batches",
            frame.frame(),
            self.stats.total_instructions,
            self.stats.batch_count
        );
        output
    }

    /// Render every viewport of a shared scene without blocking
    ///
    /// The scene is write-locked once per viewport with `try_write`. A
    /// viewport whose lock is contended keeps its previous batches and is
    /// retried next frame. A poisoned lock is recovered.
    pub fn render_shared(&mut self, scene: &RwLock<Scene>, frame: &FrameContext) -> Vec<ViewportBatches> {
        self.stats = BatchStats::default();

        let viewports = match scene.try_read() {
            Ok(guard) => guard.viewport_ids().to_vec(),
            Err(TryLockError::WouldBlock) => {
                debug!("Scene busy at frame {}, reusing previous batches", frame.frame());
                self.stats.skipped_viewports = self.last_frame.len();
                return self.previous_frame();
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("Scene lock poisoned, recovering");
                poisoned.into_inner().viewport_ids().to_vec()
            }
        };
        self.last_frame.retain(|id, _| viewports.contains(id));

        let mut output = Vec::with_capacity(viewports.len());
        for viewport in viewports {
            let mut guard = match scene.try_write() {
                Ok(guard) => guard,
                Err(TryLockError::WouldBlock) => {
                    debug!("Scene busy, skipping viewport {:?} this frame", viewport);
                    self.stats.skipped_viewports += 1;
                    if let Some(batches) = self.last_frame.get(&viewport) {
                        output.push(ViewportBatches {
                            viewport,
                            batches: batches.clone(),
                        });
                    }
                    continue;
                }
                Err(TryLockError::Poisoned(poisoned)) => {
                    warn!("Scene lock poisoned, recovering for viewport {:?}", viewport);
                    poisoned.into_inner()
                }
            };
            match self.render_viewport(&mut guard, viewport, frame) {
                Ok(batches) => output.push(ViewportBatches { viewport, batches }),
                Err(err) => warn!("Skipping viewport {:?}: {}", viewport, err),
            }
        }
        output
    }

    fn previous_frame(&self) -> Vec<ViewportBatches> {
        self.last_frame
            .iter()
            .map(|(&viewport, batches)| ViewportBatches {
                viewport,
                batches: batches.clone(),
            })
            .collect()
    }

    /// Build and batch the display list of one viewport
    pub fn render_viewport(
        &mut self,
        scene: &mut Scene,
        viewport: ViewportId,
        frame: &FrameContext,
    ) -> Result<Vec<RenderBatch>, SceneError> {
        let list = self.builder.build(scene, viewport)?;
        let hint = self.hints.get(&viewport).copied().unwrap_or(CapacityHint {
            batches: 1,
            batch_size: scene.settings.batch_capacity_hint,
        });

        let mut batches: Vec<RenderBatch> = Vec::with_capacity(hint.batches);
        for &entity in &list.entities {
            self.emit(scene, viewport, entity, frame);
            if self.scratch.is_empty() {
                continue;
            }
            let key = BatchKey::of(scene, entity);
            match batches.last_mut() {
                Some(batch) if batch.resolution == key.resolution && batch.shader == key.shader => {
                    batch.instructions.append(&mut self.scratch);
                }
                _ => {
                    if !batches.is_empty() {
                        self.stats.state_changes += 1;
                    }
                    let mut batch = RenderBatch::with_capacity(key.resolution, key.shader, hint.batch_size);
                    batch.instructions.append(&mut self.scratch);
                    batches.push(batch);
                }
            }
        }

        // The cursor always draws last, on top of the main viewport only
        if viewport == scene.main_viewport() {
            if let Some(cursor) = list.cursor {
                self.emit(scene, viewport, cursor, frame);
                let key = BatchKey::of(scene, cursor);
                let mut batch = RenderBatch::with_capacity(key.resolution, key.shader, self.scratch.len());
                batch.instructions.append(&mut self.scratch);
                batches.push(batch);
            }
        }

        let largest = batches.iter().map(RenderBatch::instruction_count).max().unwrap_or(0);
        let entry = self.hints.entry(viewport).or_default();
        entry.batches = entry.batches.max(batches.len());
        entry.batch_size = entry.batch_size.max(largest);

        self.stats.batch_count += batches.len();
        self.stats.total_instructions += batches.iter().map(RenderBatch::instruction_count).sum::<usize>();
        self.last_frame.insert(viewport, batches.clone());
        Ok(batches)
    }

    fn emit(&mut self, scene: &mut Scene, viewport: ViewportId, entity: Entity, frame: &FrameContext) {
        self.scratch.clear();
        let Some(boxes) = scene.bounding_boxes(entity, viewport) else {
            trace!("{:?} has no render box, nothing to draw", entity);
            return;
        };
        let Some(capabilities) = scene.world.capabilities(entity).copied() else {
            return;
        };
        let context = RenderContext {
            entity,
            viewport,
            boxes: &boxes,
            capabilities: &capabilities,
            frame,
        };
        self.registry.emit(&context, &mut self.scratch);
    }
}
