//! Addressing of the acquisition chains taking part in one alignment run.

use afe_traits::Device;

use crate::error::AlignError;

/// Which board a register or feedback value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChainRole {
    Primary,
    Secondary,
}

impl ChainRole {
    pub const ALL: [ChainRole; 2] = [ChainRole::Primary, ChainRole::Secondary];
    const PRIMARY_ONLY: &'static [ChainRole] = &[ChainRole::Primary];

    pub const fn index(self) -> usize {
        match self {
            ChainRole::Primary => 0,
            ChainRole::Secondary => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ChainRole::Primary => "primary",
            ChainRole::Secondary => "secondary",
        }
    }
}

impl core::fmt::Display for ChainRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Borrowed device handles, indexed by `ChainRole`.
pub(crate) struct Chains<'a> {
    primary: &'a mut dyn Device,
    secondary: Option<&'a mut dyn Device>,
}

impl<'a> Chains<'a> {
    pub(crate) fn single(primary: &'a mut dyn Device) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub(crate) fn dual(primary: &'a mut dyn Device, secondary: &'a mut dyn Device) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
        }
    }

    pub(crate) fn roles(&self) -> &'static [ChainRole] {
        if self.secondary.is_some() {
            &ChainRole::ALL
        } else {
            ChainRole::PRIMARY_ONLY
        }
    }

    pub(crate) fn get(&mut self, role: ChainRole) -> Result<&mut (dyn Device + 'a), AlignError> {
        match role {
            ChainRole::Primary => Ok(&mut *self.primary),
            ChainRole::Secondary => self
                .secondary
                .as_deref_mut()
                .ok_or(AlignError::MissingChain(role)),
        }
    }
}
