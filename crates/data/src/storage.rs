use alloy_primitives::U256;
use std::collections::HashMap;

/// Assigns persistent storage slots to state fields.
///
/// Slots are handed out monotonically from zero in request order. Asking for a name twice
/// returns the slot it already holds, so appending a field never moves existing ones.
#[derive(Debug, Default, Clone)]
pub struct StorageLayout {
    slots: HashMap<String, U256>,
    order: Vec<String>,
    next: U256,
}

impl StorageLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, name: &str) -> U256 {
        self.allocate_span(name, 1)
    }

    /// Reserves `span` consecutive slots and returns the first.
    pub fn allocate_span(&mut self, name: &str, span: u32) -> U256 {
        if let Some(slot) = self.slots.get(name) {
            return *slot;
        }
        let slot = self.next;
        self.next += U256::from(span.max(1));
        self.slots.insert(name.to_string(), slot);
        self.order.push(name.to_string());
        slot
    }

    pub fn slot_of(&self, name: &str) -> Option<U256> {
        self.slots.get(name).copied()
    }

    /// First slot not yet handed out.
    pub fn next_free(&self) -> U256 {
        self.next
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, U256)> {
        self.order.iter().map(|name| (name.as_str(), self.slots[name]))
    }
}
