//! Entity handles

slotmap::new_key_type! {
    /// Generational entity handle
    ///
    /// Handles of removed entities never alias a live entity; lookups with a
    /// stale handle simply miss.
    pub struct Entity;
}
