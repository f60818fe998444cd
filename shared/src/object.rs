//! `BaseObject`: the fields every simulated entity carries regardless of
//! kind (pose/kinematics live on the `Profile`; this adds identity, health,
//! attribute flags, and ownership).

use crate::ids::SpacedId;
use crate::profile::Profile;
use std::collections::HashSet;
use std::time::Instant;

/// Boolean entity flags. A `HashSet` rather than a bitmask: the set is
/// small and rarely read in a hot loop, and this keeps call sites readable
/// (`has_attribute(Attribute::Grounded)` instead of a magic mask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Grounded,
    Attached,
    Dead,
}

/// Hit points plus enough bookkeeping to credit a kill to whoever last
/// damaged this entity, if that damage is still "fresh" (within the
/// window the caller passes to `last_damage_id`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub hp: u8,
    last_damage_id: Option<SpacedId>,
    last_damage_time: Option<Instant>,
}

impl Default for Health {
    fn default() -> Self {
        Health {
            hp: 100,
            last_damage_id: None,
            last_damage_time: None,
        }
    }
}

impl Health {
    pub fn dead(&self) -> bool {
        self.hp == 0
    }

    pub fn respawn(&mut self) {
        self.hp = 100;
        self.last_damage_id = None;
        self.last_damage_time = None;
    }

    pub fn apply_damage(&mut self, amount: u8, attacker: SpacedId, now: Instant) {
        self.hp = self.hp.saturating_sub(amount);
        self.last_damage_id = Some(attacker);
        self.last_damage_time = Some(now);
    }

    /// The attacker who last damaged this entity, if that damage happened
    /// within `window` of `now`. Returns `None` outside the window or if
    /// there was no damage.
    pub fn last_damage_id(&self, now: Instant, window: std::time::Duration) -> Option<SpacedId> {
        let time = self.last_damage_time?;
        if now.saturating_duration_since(time) <= window {
            self.last_damage_id
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct BaseObject {
    pub sid: SpacedId,
    pub profile: Profile,
    pub health: Health,
    pub attributes: HashSet<Attribute>,
    pub byte_attributes: std::collections::HashMap<u8, u8>,
    pub owner: Option<SpacedId>,
    pub last_update: Option<Instant>,
}

impl BaseObject {
    pub fn new(sid: SpacedId, profile: Profile) -> Self {
        BaseObject {
            sid,
            profile,
            health: Health::default(),
            attributes: HashSet::new(),
            byte_attributes: std::collections::HashMap::new(),
            owner: None,
            last_update: None,
        }
    }

    pub fn has_attribute(&self, attr: Attribute) -> bool {
        self.attributes.contains(&attr)
    }

    pub fn add_attribute(&mut self, attr: Attribute) {
        self.attributes.insert(attr);
    }

    pub fn remove_attribute(&mut self, attr: Attribute) {
        self.attributes.remove(&attr);
    }

    pub fn set_byte_attribute(&mut self, key: u8, value: u8) {
        self.byte_attributes.insert(key, value);
    }

    /// Seconds since `last_update`, or `0` on the object's first tick. Also
    /// stamps `last_update = now` for next tick's call.
    pub fn prepare_update(&mut self, now: Instant) -> f64 {
        let ts = crate::util::timestep(now, self.last_update);
        self.last_update = Some(now);
        ts
    }
}

/// A lightweight "Object" marker trait implemented by every entity kind
/// stored in [`crate::game::Entity`], so `Game` can reach shared fields
/// without matching on the entity variant first.
pub trait Object {
    fn base(&self) -> &BaseObject;
    fn base_mut(&mut self) -> &mut BaseObject;

    fn sid(&self) -> SpacedId {
        self.base().sid
    }
}
