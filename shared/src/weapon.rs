//! Weapon and pickup entities. A weapon is spawned when a player interacts
//! with a pickup and lives attached to that player's body sub-profile for
//! the rest of its lifetime (or until the player is deleted).

use crate::error::SimError;
use crate::grid::Grid;
use crate::ids::SpacedId;
use crate::object::{BaseObject, Object};
use crate::packet::{KeyMsg, Keycode};
use crate::profile::Profile;
use crate::vec2::Vec2;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WeaponType {
    None,
    Pistol,
    Rifle,
}

#[derive(Debug, Clone)]
pub struct Weapon {
    pub base: BaseObject,
    pub owner: SpacedId,
    pub weapon_type: WeaponType,
    keys: crate::player::Keys,
}

impl Weapon {
    pub fn new(sid: SpacedId, pos: Vec2, owner: SpacedId) -> Self {
        let profile = Profile::rec2(pos, Vec2::new(0.3, 0.3));
        Weapon {
            base: BaseObject::new(sid, profile),
            owner,
            weapon_type: WeaponType::None,
            keys: crate::player::Keys::new(),
        }
    }

    pub fn update_keys(&mut self, msg: &KeyMsg) {
        self.keys.update(msg);
    }

    /// Called by the owning player when it becomes grounded; a real weapon
    /// implementation would use this to reset air-only cooldowns.
    pub fn on_grounded(&mut self) {}

    pub fn update_state(
        &mut self,
        _grid: &mut Grid,
        _attachments: &mut HashMap<SpacedId, crate::attachment::Attachment>,
        _now: Instant,
    ) -> Result<bool, SimError> {
        // Pose is driven entirely by the offset attachment to its owner in
        // the Postprocess phase; nothing to simulate here.
        Ok(true)
    }

    pub fn postprocess(&mut self, _grid: &mut Grid, _now: Instant) {
        self.keys.save();
    }

    pub fn on_delete(&mut self, _grid: &mut Grid) -> Result<(), SimError> {
        Ok(())
    }
}

impl Object for Weapon {
    fn base(&self) -> &BaseObject {
        &self.base
    }
    fn base_mut(&mut self) -> &mut BaseObject {
        &mut self.base
    }
}

/// A static pickup: touching it (with `interact` held) spawns or reassigns
/// a weapon for the player.
#[derive(Debug, Clone)]
pub struct Pickup {
    pub base: BaseObject,
    pub weapon_type: WeaponType,
}

impl Pickup {
    pub fn new(sid: SpacedId, pos: Vec2, dim: Vec2, weapon_type: WeaponType) -> Self {
        Pickup {
            base: BaseObject::new(sid, Profile::rec2(pos, dim)),
            weapon_type,
        }
    }

    pub fn update_state(
        &mut self,
        _grid: &mut Grid,
        _attachments: &mut HashMap<SpacedId, crate::attachment::Attachment>,
        _now: Instant,
    ) -> Result<bool, SimError> {
        Ok(true)
    }

    pub fn postprocess(&mut self, _grid: &mut Grid, _now: Instant) {}

    pub fn on_delete(&mut self, _grid: &mut Grid) -> Result<(), SimError> {
        Ok(())
    }
}

impl Object for Pickup {
    fn base(&self) -> &BaseObject {
        &self.base
    }
    fn base_mut(&mut self) -> &mut BaseObject {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Space;

    #[test]
    fn new_weapon_has_no_type_until_assigned() {
        let weapon = Weapon::new(
            SpacedId::new(Space::Weapon, 0),
            Vec2::ZERO,
            SpacedId::new(Space::Player, 0),
        );
        assert_eq!(weapon.weapon_type, WeaponType::None);
    }
}
