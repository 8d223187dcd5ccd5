/// Which projection, if any, occupies each candidate direction.
///
/// Two projections never share a candidate slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable {
    owners: Vec<Option<usize>>,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            owners: vec![None; capacity],
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.owners.len()
    }

    #[inline]
    pub fn owner(&self, slot: usize) -> Option<usize> {
        self.owners.get(slot).copied().flatten()
    }

    /// Marks `slot` as held by `projection`. Returns `false` if the slot is out of
    /// range or held by another projection.
    pub fn claim(&mut self, slot: usize, projection: usize) -> bool {
        match self.owners.get_mut(slot) {
            Some(owner @ None) => {
                *owner = Some(projection);
                true
            }
            Some(Some(current)) => *current == projection,
            None => false,
        }
    }

    pub fn release(&mut self, slot: usize) {
        if let Some(owner) = self.owners.get_mut(slot) {
            *owner = None;
        }
    }

    pub fn free_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.owners
            .iter()
            .enumerate()
            .filter_map(|(slot, owner)| owner.is_none().then_some(slot))
    }
}
