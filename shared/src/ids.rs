//! Entity identity.

use serde::{Deserialize, Serialize};

/// Tags an entity's category. Closed set grounded on the space constants the
/// original server defines (`playerSpace`, `weaponSpace`, `wallSpace`,
/// `pickupSpace`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Space {
    Player,
    Weapon,
    Wall,
    Pickup,
}

/// `(space, id)` pair identifying an entity. Stable for the entity's
/// lifetime. `SpacedId::INVALID` is the reserved sentinel used where "no
/// entity" needs to travel through code that otherwise expects a SpacedId
/// (e.g. `Health::last_damage_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpacedId {
    pub space: Space,
    pub id: u32,
}

impl SpacedId {
    pub const INVALID_ID: u32 = u32::MAX;

    pub fn new(space: Space, id: u32) -> Self {
        SpacedId { space, id }
    }

    pub fn invalid(space: Space) -> Self {
        SpacedId {
            space,
            id: Self::INVALID_ID,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.id == Self::INVALID_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_sid_reports_invalid() {
        let sid = SpacedId::invalid(Space::Player);
        assert!(sid.is_invalid());
    }

    #[test]
    fn ordinary_sid_is_valid() {
        let sid = SpacedId::new(Space::Player, 3);
        assert!(!sid.is_invalid());
    }

    #[test]
    fn distinct_spaces_dont_collide() {
        let a = SpacedId::new(Space::Player, 0);
        let b = SpacedId::new(Space::Weapon, 0);
        assert_ne!(a, b);
    }
}
