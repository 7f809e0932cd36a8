//! Lock-step double buffer for derived per-entity data
//!
//! A cache wrapped in [`LockStep`] can be locked around a bulk mutation so
//! that readers keep seeing the pre-lock value, recomputation can be staged
//! into a pending buffer, and the change notification fires at most once
//! when the last lock is released.

/// Double-buffered cached value with a nested lock counter
#[derive(Debug, Clone, Default)]
pub struct LockStep<T> {
    live: Option<T>,
    snapshot: Option<T>,
    pending: Option<T>,
    locks: u32,
    dirty: bool,
    notify_on_unlock: bool,
}

impl<T: Clone> LockStep<T> {
    /// Empty, dirty cache
    pub fn new() -> Self {
        Self {
            live: None,
            snapshot: None,
            pending: None,
            locks: 0,
            dirty: true,
            notify_on_unlock: false,
        }
    }

    /// Flag the value as stale
    ///
    /// Returns `true` when the caller should notify now. While locked the
    /// notification is deferred to the final [`unlock`](Self::unlock).
    pub fn mark_dirty(&mut self) -> bool {
        self.dirty = true;
        if self.locks > 0 {
            self.notify_on_unlock = true;
            false
        } else {
            true
        }
    }

    /// Whether the value is stale
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether an unlocked query should recompute
    pub fn needs_recompute(&self) -> bool {
        self.locks == 0 && (self.dirty || self.live.is_none())
    }

    /// Whether at least one lock is held
    pub fn is_locked(&self) -> bool {
        self.locks > 0
    }

    /// Store a freshly computed value
    pub fn publish(&mut self, value: T) {
        self.live = Some(value);
        self.dirty = false;
    }

    /// The value readers should see: the snapshot while locked, else the live value
    pub fn current(&self) -> Option<&T> {
        if self.locks > 0 {
            self.snapshot.as_ref().or(self.live.as_ref())
        } else {
            self.live.as_ref()
        }
    }

    /// The live value, ignoring any lock
    pub fn live(&self) -> Option<&T> {
        self.live.as_ref()
    }

    /// Mutable live value, for caches that fill in parts lazily
    pub fn live_mut(&mut self) -> Option<&mut T> {
        self.live.as_mut()
    }

    /// Take a lock; the first lock snapshots the live value
    pub fn lock(&mut self) {
        if self.locks == 0 {
            self.snapshot = self.live.clone();
        }
        self.locks += 1;
    }

    /// Stage a recomputed value to be published on the final unlock
    pub fn prepare(&mut self, value: T) {
        self.pending = Some(value);
        self.dirty = false;
    }

    /// Release a lock
    ///
    /// On the final release the pending value (if any) becomes live and the
    /// return value tells whether a deferred notification must fire now.
    pub fn unlock(&mut self) -> bool {
        if self.locks == 0 {
            return false;
        }
        self.locks -= 1;
        if self.locks > 0 {
            return false;
        }
        self.snapshot = None;
        if let Some(pending) = self.pending.take() {
            self.live = Some(pending);
        }
        std::mem::take(&mut self.notify_on_unlock)
    }
}
