//! Render order
//!
//! The order used for drawing (ascending) and hit-testing (descending).
//! `Ordering::Less` means "drawn earlier", i.e. farther from the viewer.
//!
//! Two entities are ranked by, in turn:
//!
//! 1. ancestry: an ancestor is always drawn before its descendants
//! 2. their own effective render-layer z, larger first
//! 3. the siblings where their ancestor chains diverge, keyed by layer z,
//!    z plus the current sprite's z offset (larger first), then x (larger
//!    first), then stable id, then handle order
//!
//! While every entity shares its tree's layer this is a depth-first
//! pre-order and subtrees never interleave. A child placed on a layer that
//! crosses an unrelated tree can make the relation intransitive; such
//! scenes are reported by [`find_order_cycle`].

use std::cmp::Ordering;

use log::warn;
use slotmap::Key;

use crate::ecs::Entity;
use crate::scene::Scene;

/// Compares entities of one scene by draw order
#[derive(Debug, Clone, Copy)]
pub struct RenderOrderComparator<'a> {
    scene: &'a Scene,
}

impl<'a> RenderOrderComparator<'a> {
    /// Comparator over `scene`
    pub fn new(scene: &'a Scene) -> Self {
        Self { scene }
    }

    /// Draw order of `a` relative to `b`
    pub fn compare(&self, a: Entity, b: Entity) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }

        let world = self.scene.world();
        if world.is_ancestor_of(a, b) {
            return Ordering::Less;
        }
        if world.is_ancestor_of(b, a) {
            return Ordering::Greater;
        }

        let by_layer = self.layer_z(b).cmp(&self.layer_z(a));
        if by_layer != Ordering::Equal {
            return by_layer;
        }

        // Walk both chains from the root until they diverge
        let mut chain_a = world.ancestors(a);
        chain_a.insert(0, a);
        let mut chain_b = world.ancestors(b);
        chain_b.insert(0, b);
        loop {
            match (chain_a.pop(), chain_b.pop()) {
                (Some(x), Some(y)) if x == y => continue,
                (Some(x), Some(y)) => return self.compare_siblings(x, y),
                // Unreachable after the ancestor checks
                _ => return self.fallback(a, b),
            }
        }
    }

    /// Ranking of two entities that share a parent (or are both roots)
    fn compare_siblings(&self, a: Entity, b: Entity) -> Ordering {
        self.layer_z(b)
            .cmp(&self.layer_z(a))
            .then_with(|| self.render_z(b).total_cmp(&self.render_z(a)))
            .then_with(|| self.fallback(a, b))
    }

    /// Reversed x, then stable id, then handle order
    fn fallback(&self, a: Entity, b: Entity) -> Ordering {
        let world = self.scene.world();
        let x = |e: Entity| world.capabilities(e).map_or(0.0, |caps| caps.x());
        x(b).total_cmp(&x(a))
            .then_with(|| world.id(a).cmp(&world.id(b)))
            .then_with(|| a.data().as_ffi().cmp(&b.data().as_ffi()))
    }

    fn layer_z(&self, entity: Entity) -> i32 {
        let layer = self.scene.effective_layer(entity);
        self.scene.layer(layer).map_or(0, |layer| layer.z)
    }

    fn render_z(&self, entity: Entity) -> f32 {
        self.scene
            .world()
            .capabilities(entity)
            .map_or(0.0, |caps| caps.render_z())
    }
}

/// Sort entities into draw order
///
/// Stable. Crossed layers leave the result unspecified but never panic.
pub fn sort_by_render_order(scene: &Scene, entities: &mut [Entity]) {
    let comparator = RenderOrderComparator::new(scene);
    let mut scratch = Vec::with_capacity(entities.len());
    merge_sort(entities, &mut scratch, &comparator);
}

// `slice::sort_by` may panic on an intransitive comparator
fn merge_sort(items: &mut [Entity], scratch: &mut Vec<Entity>, comparator: &RenderOrderComparator<'_>) {
    let len = items.len();
    if len < 2 {
        return;
    }
    let mid = len / 2;
    merge_sort(&mut items[..mid], scratch, comparator);
    merge_sort(&mut items[mid..], scratch, comparator);
    if comparator.compare(items[mid - 1], items[mid]) != Ordering::Greater {
        return;
    }

    scratch.clear();
    scratch.extend_from_slice(items);
    let (left, right) = scratch.split_at(mid);
    let (mut i, mut j) = (0, 0);
    for slot in items.iter_mut() {
        let take_left = j == right.len()
            || (i < left.len() && comparator.compare(left[i], right[j]) != Ordering::Greater);
        if take_left {
            *slot = left[i];
            i += 1;
        } else {
            *slot = right[j];
            j += 1;
        }
    }
}

/// Look for an ordering cycle (A < B < … < A) among `entities`
///
/// Builds the full "drawn before" relation and searches it depth-first, so
/// it is quadratic in the number of entities; meant for debugging. A found
/// cycle is logged at warn level and returned.
pub fn find_order_cycle(scene: &Scene, entities: &[Entity]) -> Option<Vec<Entity>> {
    let comparator = RenderOrderComparator::new(scene);
    let n = entities.len();
    let before: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| i != j && comparator.compare(entities[i], entities[j]) == Ordering::Less)
                .collect()
        })
        .collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }
    let mut marks = vec![Mark::Unvisited; n];

    for start in 0..n {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        // (node, next edge index)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::OnStack;
        while let Some(top) = stack.last_mut() {
            let (node, edge) = *top;
            if let Some(&next) = before[node].get(edge) {
                top.1 += 1;
                match marks[next] {
                    Mark::Unvisited => {
                        marks[next] = Mark::OnStack;
                        stack.push((next, 0));
                    }
                    Mark::OnStack => {
                        let from = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                        let mut cycle: Vec<Entity> =
                            stack[from..].iter().map(|&(n, _)| entities[n]).collect();
                        cycle.push(entities[next]);
                        let ids: Vec<&str> = cycle
                            .iter()
                            .map(|&e| scene.world().id(e).unwrap_or("?"))
                            .collect();
                        warn!("Render order cycle detected: {}", ids.join(" < "));
                        return Some(cycle);
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                stack.pop();
            }
        }
    }
    None
}
