//! Identifiers for skeleton entities.

use serde::{Deserialize, Serialize};

/// Dense index of a bone inside its [`Skeleton`](crate::skeleton::Skeleton).
/// Only meaningful for the skeleton that produced it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct BoneId(pub u32);

impl BoneId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        BoneId(index as u32)
    }
}

impl std::fmt::Display for BoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips() {
        let id = BoneId::from_index(7);
        assert_eq!(id, BoneId(7));
        assert_eq!(id.index(), 7);
        assert_eq!(id.to_string(), "#7");
    }
}
