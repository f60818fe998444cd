//! Owns the [`Grid`] and the attachment map, and drives the four-phase
//! per-tick pipeline: `UpdateState` over objects, `UpdateState` over
//! attachments, `Postprocess` over objects, `Postprocess` over attachments.
//!
//! Every phase takes each entity out of the grid before mutating it and
//! puts it back afterward (`Grid::take`/`Grid::upsert`) so an entity's own
//! `update_state` can freely query the grid for *other* entities without
//! the borrow checker seeing it alias itself. A side effect: an entity
//! created mid-tick (e.g. a weapon spawned from a pickup interaction)
//! wasn't in the snapshot this tick iterates, so it naturally sits out
//! until the next tick — it "joins" rather than being updated twice or
//! updated while half-initialized.

use crate::attachment::Connection;
use crate::error::SimError;
use crate::grid::{Entity, Grid};
use crate::ids::{Space, SpacedId};
use crate::object::Object;
use crate::packet::{EntitySnapshot, KeyMsg, Packet, WallPlacement};
use crate::profile::Profile;
use crate::vec2::Vec2;
use std::collections::HashMap;
use std::time::Instant;

pub struct Game {
    grid: Grid,
    attachments: HashMap<SpacedId, crate::attachment::Attachment>,
    tick: u32,
    kills: HashMap<u32, u32>,
    deaths: HashMap<u32, u32>,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    pub fn new() -> Self {
        Game {
            grid: Grid::new(),
            attachments: HashMap::new(),
            tick: 0,
            kills: HashMap::new(),
            deaths: HashMap::new(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn load_level(&mut self, walls: &[WallPlacement]) -> Result<(), SimError> {
        for wall in walls {
            let sid = self.grid.next_sid(Space::Wall)?;
            let base = crate::object::BaseObject::new(sid, Profile::rec2(wall.pos, wall.dim));
            self.grid.upsert(Entity::Wall(base))?;
        }
        Ok(())
    }

    pub fn add(&mut self, entity: Entity) -> Result<SpacedId, SimError> {
        let sid = entity.sid();
        self.grid.upsert(entity)?;
        Ok(sid)
    }

    /// Removes `sid`, running its `on_delete` hook and tearing down any
    /// attachment where it is the child or a parent.
    pub fn delete(&mut self, sid: SpacedId) -> Result<(), SimError> {
        self.attachments.remove(&sid);
        for attachment in self.attachments.values_mut() {
            attachment.remove_connection(sid);
        }
        self.grid.delete(sid)?;
        Ok(())
    }

    pub fn process_key_msg(&mut self, sid: SpacedId, msg: &KeyMsg) {
        match self.grid.get_mut(sid) {
            Some(Entity::Player(player)) => player.update_keys(msg),
            Some(Entity::Weapon(weapon)) => weapon.update_keys(msg),
            _ => {}
        }
    }

    pub fn record_kill(&mut self, killer: u32) {
        *self.kills.entry(killer).or_insert(0) += 1;
    }

    pub fn record_death(&mut self, victim: u32) {
        *self.deaths.entry(victim).or_insert(0) += 1;
    }

    /// Runs one tick of the four-phase pipeline. Fails with
    /// [`SimError::InvariantViolation`] if anything it touches (entity
    /// dimensions, the grid's own cell index, an id space) turns up
    /// corrupt — per spec, that's fatal to the room this game belongs to,
    /// so the caller is expected to stop driving this `Game` rather than
    /// keep ticking a simulation that no longer agrees with its own index.
    pub fn tick(&mut self, now: Instant) -> Result<(), SimError> {
        self.tick = self.tick.wrapping_add(1);

        let sids = self.grid.sids();
        for sid in sids {
            let Some(mut entity) = self.grid.take(sid) else {
                continue;
            };
            let was_dead = entity.base().has_attribute(crate::object::Attribute::Dead);
            let survives = entity.update_state(&mut self.grid, &mut self.attachments, now)?;
            if let Entity::Player(player) = &entity {
                if !was_dead && player.base.has_attribute(crate::object::Attribute::Dead) {
                    let (victim, killer) = player.score_on_death(now);
                    self.record_death(victim.id);
                    if let Some(killer) = killer {
                        self.record_kill(killer.id);
                    }
                }
            }
            if survives {
                self.grid.upsert(entity)?;
            } else {
                entity.on_delete(&mut self.grid)?;
                self.attachments.remove(&sid);
                for attachment in self.attachments.values_mut() {
                    attachment.remove_connection(sid);
                }
            }
        }

        self.apply_attract_connections(now)?;

        let sids = self.grid.sids();
        for sid in sids {
            let Some(mut entity) = self.grid.take(sid) else {
                continue;
            };
            entity.postprocess(&mut self.grid, now);
            self.grid.upsert(entity)?;
        }

        self.apply_offset_connections()?;
        Ok(())
    }

    /// Pre-collision attract pass: pulls the child's velocity toward
    /// `parent.pos + offset`, capped so the child never overshoots
    /// (`scale = min(1, |force|)`), then marks it `attached`. Missing
    /// parent/child cleanup is identical to [`Self::apply_offset_connections`]
    /// — both phases drop the offending connection, and clear `attached`
    /// once the child's last connection is gone.
    fn apply_attract_connections(&mut self, _now: Instant) -> Result<(), SimError> {
        let children: Vec<SpacedId> = self.attachments.keys().copied().collect();
        for child_sid in children {
            self.resolve_connections(child_sid, |game, child, parent_sid, connection| {
                let Connection::Attract { offset, factor } = connection else {
                    return Ok(());
                };
                let Some(parent) = game.grid.get(parent_sid) else {
                    return Err(SimError::MissingEntity(parent_sid));
                };
                let target = parent.profile().pose.pos + offset;
                let force = target - child.profile().pose.pos;
                let scale = force.len().min(1.0);
                let mut vel = force;
                vel.normalize();
                vel.scale(scale * factor);
                child.profile_mut().kinematics.vel = vel;
                child.base_mut().add_attribute(crate::object::Attribute::Attached);
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Post-collision offset pass: stamps the child's pose and kinematics
    /// directly from the parent's, bypassing whatever collision resolution
    /// the child's own `update_state` computed this tick.
    fn apply_offset_connections(&mut self) -> Result<(), SimError> {
        let children: Vec<SpacedId> = self.attachments.keys().copied().collect();
        for child_sid in children {
            self.resolve_connections(child_sid, |game, child, parent_sid, connection| {
                let Connection::Offset { offset } = connection else {
                    return Ok(());
                };
                let Some(parent) = game.grid.get(parent_sid) else {
                    return Err(SimError::MissingEntity(parent_sid));
                };
                let parent_kinematics = parent.profile().kinematics;
                child.profile_mut().pose.pos = parent.profile().pose.pos + offset;
                child.profile_mut().kinematics = parent_kinematics;
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Shared machinery for both attachment phases: takes `child_sid` out
    /// of the grid, runs `apply` once per connection. `apply` returning
    /// `Err(SimError::MissingEntity(parent))` means exactly that — the
    /// connection's parent is gone — and is handled right here by dropping
    /// the connection, per spec's "remove the offending connection, clear
    /// `attached` once empty" rule; any other error is a genuine grid
    /// invariant failure from the final re-upsert and is propagated to the
    /// caller. Drops the whole attachment entry if the child itself no
    /// longer exists.
    fn resolve_connections(
        &mut self,
        child_sid: SpacedId,
        mut apply: impl FnMut(&mut Self, &mut Entity, SpacedId, Connection) -> Result<(), SimError>,
    ) -> Result<(), SimError> {
        let Some(connections) = self
            .attachments
            .get(&child_sid)
            .map(|a| a.connections().iter().map(|(p, c)| (*p, *c)).collect::<Vec<_>>())
        else {
            return Ok(());
        };

        let Some(mut child) = self.grid.take(child_sid) else {
            self.attachments.remove(&child_sid);
            return Ok(());
        };

        for (parent_sid, connection) in connections {
            if let Err(SimError::MissingEntity(missing)) = apply(self, &mut child, parent_sid, connection) {
                debug_assert_eq!(missing, parent_sid);
                if let Some(attachment) = self.attachments.get_mut(&child_sid) {
                    attachment.remove_connection(parent_sid);
                }
            }
        }

        let empty = self
            .attachments
            .get(&child_sid)
            .map(|a| a.is_empty())
            .unwrap_or(true);
        if empty {
            child.base_mut().remove_attribute(crate::object::Attribute::Attached);
            self.attachments.remove(&child_sid);
        }

        self.grid.upsert(child)
    }

    pub fn create_level_init_msg(&self) -> Packet {
        let walls = self
            .grid
            .sids()
            .into_iter()
            .filter_map(|sid| match self.grid.get(sid) {
                Some(Entity::Wall(base)) => Some(WallPlacement {
                    pos: base.profile.pose.pos,
                    dim: base.profile.pose.dim,
                }),
                _ => None,
            })
            .collect();
        Packet::LevelInit { walls }
    }

    pub fn create_player_init_msg(&self, sid: SpacedId) -> Packet {
        Packet::PlayerInit { sid }
    }

    pub fn create_game_init_msg(&self) -> Packet {
        Packet::GameInit {
            entities: self.snapshot_all(),
        }
    }

    pub fn create_game_state_msg(&self) -> Packet {
        Packet::GameState {
            tick: self.tick,
            entities: self.snapshot_all(),
        }
    }

    /// Drains the accumulated kill/death tallies into a reliable update
    /// packet, or `None` if nothing happened this tick. Unlike `GameState`
    /// (sent every tick, unreliable), this is meant to go out only when
    /// there's something to report.
    pub fn create_game_update_msg(&mut self) -> Option<Packet> {
        if self.kills.is_empty() && self.deaths.is_empty() {
            return None;
        }
        let entities = self.snapshot_all();
        let kills = std::mem::take(&mut self.kills);
        let deaths = std::mem::take(&mut self.deaths);
        Some(Packet::GameUpdate {
            entities,
            kills,
            deaths,
        })
    }

    fn snapshot_all(&self) -> Vec<EntitySnapshot> {
        self.grid
            .sids()
            .into_iter()
            .filter_map(|sid| self.grid.get(sid).map(|entity| entity_snapshot(sid, entity)))
            .collect()
    }
}

fn entity_snapshot(sid: SpacedId, entity: &Entity) -> EntitySnapshot {
    let base = entity.base();
    let profile = &base.profile;
    let dir = match entity {
        Entity::Player(p) => p.dir,
        _ => Vec2::new(1.0, 0.0),
    };
    EntitySnapshot {
        sid,
        pos: profile.pose.pos,
        vel: profile.kinematics.vel,
        dir,
        attributes: attribute_bits(entity),
        health: base.health.hp,
    }
}

fn attribute_bits(entity: &Entity) -> u8 {
    use crate::object::Attribute;
    let base = entity.base();
    let mut bits = 0u8;
    if base.has_attribute(Attribute::Grounded) {
        bits |= 1;
    }
    if base.has_attribute(Attribute::Attached) {
        bits |= 2;
    }
    if base.has_attribute(Attribute::Dead) {
        bits |= 4;
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::BaseObject;

    #[test]
    fn load_level_registers_walls_in_grid() {
        let mut game = Game::new();
        game.load_level(&[WallPlacement {
            pos: Vec2::new(0.0, 0.0),
            dim: Vec2::new(4.0, 4.0),
        }])
        .unwrap();
        assert_eq!(game.grid().len(), 1);
    }

    #[test]
    fn delete_removes_entity_and_its_attachments() {
        let mut game = Game::new();
        let parent = game
            .add(Entity::Wall(BaseObject::new(
                SpacedId::new(Space::Wall, 0),
                Profile::rec2(Vec2::ZERO, Vec2::new(1.0, 1.0)),
            )))
            .unwrap();
        let child_sid = SpacedId::new(Space::Weapon, 0);
        let mut attachment = crate::attachment::Attachment::new(child_sid);
        attachment.add_connection(parent, Connection::Offset { offset: Vec2::ZERO });
        game.attachments.insert(child_sid, attachment);

        game.delete(parent).unwrap();
        assert!(!game.grid().contains(parent));
        assert!(game.attachments.get(&child_sid).map(|a| a.is_empty()).unwrap_or(true));
    }

    #[test]
    fn death_credits_killer_and_victim() {
        let mut game = Game::new();
        let mut rng = rand::thread_rng();
        let victim_sid = SpacedId::new(Space::Player, 0);
        let attacker_sid = SpacedId::new(Space::Player, 1);
        let mut victim = crate::player::Player::new(
            victim_sid,
            Vec2::new(0.0, 20.0),
            Vec2::new(0.8, 1.44),
            &mut rng,
        );
        let now = Instant::now();
        victim.base.health.apply_damage(100, attacker_sid, now);
        victim.base.profile.pose.pos.y = -10.0;
        game.add(Entity::Player(victim)).unwrap();

        game.tick(now).unwrap();

        assert_eq!(*game.deaths.get(&victim_sid.id).unwrap(), 1);
        assert_eq!(*game.kills.get(&attacker_sid.id).unwrap(), 1);
    }

    #[test]
    fn attract_connection_pulls_velocity_toward_parent() {
        let mut game = Game::new();
        let parent_sid = SpacedId::new(Space::Player, 0);
        let parent = BaseObject::new(parent_sid, Profile::rec2(Vec2::new(10.0, 0.0), Vec2::new(1.0, 1.0)));
        game.add(Entity::Wall(parent)).unwrap();

        let child_sid = SpacedId::new(Space::Weapon, 0);
        let child = BaseObject::new(child_sid, Profile::rec2(Vec2::new(8.0, 0.0), Vec2::new(0.3, 0.3)));
        game.add(Entity::Wall(child)).unwrap();

        let mut attachment = crate::attachment::Attachment::new(child_sid);
        attachment.add_connection(
            parent_sid,
            Connection::Attract {
                offset: Vec2::ZERO,
                factor: 0.5,
            },
        );
        game.attachments.insert(child_sid, attachment);

        game.apply_attract_connections(Instant::now()).unwrap();

        let vel = game.grid().get(child_sid).unwrap().profile().kinematics.vel;
        assert!((vel.x - 0.5).abs() < 1e-9);
        assert!(vel.y.abs() < 1e-9);
        assert!(game.grid().get(child_sid).unwrap().base().has_attribute(crate::object::Attribute::Attached));
    }

    #[test]
    fn attract_connection_drops_when_parent_missing_and_clears_attached() {
        let mut game = Game::new();
        let missing_parent = SpacedId::new(Space::Player, 99);

        let child_sid = SpacedId::new(Space::Weapon, 0);
        let child = BaseObject::new(child_sid, Profile::rec2(Vec2::new(8.0, 0.0), Vec2::new(0.3, 0.3)));
        game.add(Entity::Wall(child)).unwrap();

        let mut attachment = crate::attachment::Attachment::new(child_sid);
        attachment.add_connection(
            missing_parent,
            Connection::Attract {
                offset: Vec2::ZERO,
                factor: 0.5,
            },
        );
        game.attachments.insert(child_sid, attachment);

        game.apply_attract_connections(Instant::now()).unwrap();

        assert!(!game.attachments.contains_key(&child_sid));
        assert!(!game.grid().get(child_sid).unwrap().base().has_attribute(crate::object::Attribute::Attached));
    }

    #[test]
    fn tick_advances_without_entities() {
        let mut game = Game::new();
        game.tick(Instant::now()).unwrap();
        assert_eq!(game.grid().len(), 0);
    }

    #[test]
    fn offset_connection_follows_parent_after_postprocess() {
        let mut game = Game::new();
        let parent_sid = SpacedId::new(Space::Player, 0);
        let parent = BaseObject::new(parent_sid, Profile::rec2(Vec2::new(3.0, 4.0), Vec2::new(1.0, 1.0)));
        game.add(Entity::Wall(parent)).unwrap();

        let child_sid = SpacedId::new(Space::Weapon, 0);
        let child = BaseObject::new(child_sid, Profile::rec2(Vec2::ZERO, Vec2::new(0.3, 0.3)));
        game.add(Entity::Wall(child)).unwrap();

        let mut attachment = crate::attachment::Attachment::new(child_sid);
        attachment.add_connection(
            parent_sid,
            Connection::Offset {
                offset: Vec2::new(0.0, 1.0),
            },
        );
        game.attachments.insert(child_sid, attachment);

        game.tick(Instant::now()).unwrap();

        let pos = game.grid().get(child_sid).unwrap().profile().pose.pos;
        assert!((pos.x - 3.0).abs() < 1e-9);
        assert!((pos.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn tick_reports_invariant_violation_instead_of_silently_swallowing_it() {
        let mut game = Game::new();
        let sid = SpacedId::new(Space::Wall, 0);
        game.add(Entity::Wall(BaseObject::new(sid, Profile::rec2(Vec2::ZERO, Vec2::new(1.0, 1.0)))))
            .unwrap();

        // Corrupt the entity's profile directly, bypassing `Grid::upsert`'s
        // own check, so the next tick's re-upsert is the one that catches it.
        game.grid_mut().get_mut(sid).unwrap().profile_mut().pose.dim = Vec2::new(-1.0, 1.0);

        let err = game.tick(Instant::now()).unwrap_err();
        assert!(matches!(err, SimError::InvariantViolation(_)));
    }
}
