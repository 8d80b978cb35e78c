//! Register values left behind by a finished alignment.

use afe_traits::Register;

use crate::chain::ChainRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub chain: ChainRole,
    pub register: Register,
    pub value: u8,
}

/// Ordered `(chain, register, value)` rows, one per register, first write wins
/// the position and the last write wins the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterSnapshot {
    entries: Vec<SnapshotEntry>,
}

impl RegisterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, chain: ChainRole, register: Register, value: u8) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.chain == chain && e.register == register)
        {
            Some(e) => e.value = value,
            None => self.entries.push(SnapshotEntry {
                chain,
                register,
                value,
            }),
        }
    }

    pub fn get(&self, chain: ChainRole, register: Register) -> Option<u8> {
        self.entries
            .iter()
            .find(|e| e.chain == chain && e.register == register)
            .map(|e| e.value)
    }

    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows of one chain, in snapshot order.
    pub fn chain(&self, chain: ChainRole) -> impl Iterator<Item = &SnapshotEntry> + '_ {
        self.entries.iter().filter(move |e| e.chain == chain)
    }
}

impl FromIterator<SnapshotEntry> for RegisterSnapshot {
    fn from_iter<I: IntoIterator<Item = SnapshotEntry>>(iter: I) -> Self {
        let mut snap = Self::new();
        for e in iter {
            snap.upsert(e.chain, e.register, e.value);
        }
        snap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_keeps_position_and_takes_latest_value() {
        let mut s = RegisterSnapshot::new();
        s.upsert(ChainRole::Primary, Register::FullScale, 130);
        s.upsert(ChainRole::Primary, Register::CommonOffset, 120);
        s.upsert(ChainRole::Primary, Register::FullScale, 243);
        assert_eq!(s.len(), 2);
        assert_eq!(s.entries()[0].register, Register::FullScale);
        assert_eq!(s.get(ChainRole::Primary, Register::FullScale), Some(243));
        assert_eq!(s.get(ChainRole::Secondary, Register::FullScale), None);
    }
}
