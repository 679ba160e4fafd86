//! Index-addressed table of controller records.

use crate::error::RegistryError;
use crate::record::ControllerRecord;
use mgmt_wire::Address;
use tracing::debug;

/// Sparse, growable table of controllers keyed by index
#[derive(Debug, Default)]
pub struct ControllerRegistry {
    slots: Vec<Option<ControllerRecord>>,
}

impl ControllerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh record at `index`, discarding whatever was there.
    ///
    /// The table grows to cover `index`; new slots start unoccupied.
    pub fn register(&mut self, index: u16) -> &mut ControllerRecord {
        let slot = index as usize;
        if slot >= self.slots.len() {
            self.slots.resize_with(slot + 1, || None);
        }

        debug!("Added controller {}", index);
        self.slots[slot].insert(ControllerRecord::new(index))
    }

    /// Remove the record at `index`, returning it if the slot was occupied
    pub fn unregister(&mut self, index: u16) -> Option<ControllerRecord> {
        let record = self.slots.get_mut(index as usize)?.take()?;
        debug!("Removed controller {}", index);
        Some(record)
    }

    /// Look up an occupied slot
    pub fn get(&self, index: u16) -> Result<&ControllerRecord, RegistryError> {
        self.slots
            .get(index as usize)
            .and_then(Option::as_ref)
            .ok_or(RegistryError::UnknownController(index))
    }

    /// Look up an occupied slot mutably
    pub fn get_mut(&mut self, index: u16) -> Result<&mut ControllerRecord, RegistryError> {
        self.slots
            .get_mut(index as usize)
            .and_then(Option::as_mut)
            .ok_or(RegistryError::UnknownController(index))
    }

    /// Highest index the table has grown to, `None` when never grown
    pub fn max_index(&self) -> Option<u16> {
        self.slots.len().checked_sub(1).map(|i| i as u16)
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Whether no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices of occupied slots, ascending
    pub fn indices(&self) -> impl Iterator<Item = u16> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| i as u16)
    }

    /// Index of the controller with the given identity address
    pub fn find_by_address(&self, address: &Address) -> Option<u16> {
        self.slots
            .iter()
            .flatten()
            .find(|record| record.has_info() && record.address() == *address)
            .map(ControllerRecord::index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::IdentifierOp;
    use uuid::Uuid;

    #[test]
    fn test_empty_registry() {
        let registry = ControllerRegistry::new();
        assert_eq!(registry.max_index(), None);
        assert!(registry.is_empty());
        assert_eq!(
            registry.get(0).unwrap_err(),
            RegistryError::UnknownController(0)
        );
    }

    #[test]
    fn test_register_sparse_index() {
        let mut registry = ControllerRegistry::new();
        registry.register(2);

        assert_eq!(registry.max_index(), Some(2));
        let record = registry.get(2).unwrap();
        assert_eq!(record.index(), 2);
        assert!(!record.has_info());
        assert!(!record.pending().in_flight());

        assert_eq!(
            registry.get(0).unwrap_err(),
            RegistryError::UnknownController(0)
        );
        assert!(registry.get(3).is_err());
        assert_eq!(registry.indices().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_register_out_of_order_keeps_existing() {
        let mut registry = ControllerRegistry::new();
        registry.register(1).pending_mut().mark_in_flight();
        registry.register(5);
        registry.register(0);

        assert!(registry.get(1).unwrap().pending().in_flight());
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.max_index(), Some(5));
    }

    #[test]
    fn test_reregister_discards_state() {
        let mut registry = ControllerRegistry::new();
        let record = registry.register(0);
        record.pending_mut().mark_in_flight();
        record.pending_mut().submit(IdentifierOp::Remove { uuid: Uuid::nil() });

        let record = registry.register(0);
        assert!(!record.pending().in_flight());
        assert_eq!(record.pending().queued(), 0);
    }

    #[test]
    fn test_unregister() {
        let mut registry = ControllerRegistry::new();
        assert!(registry.unregister(7).is_none());

        registry.register(1);
        let removed = registry.unregister(1).unwrap();
        assert_eq!(removed.index(), 1);
        assert!(registry.get(1).is_err());
        assert!(registry.unregister(1).is_none());
        // The table does not shrink
        assert_eq!(registry.max_index(), Some(1));
    }
}
