//! The player state machine: grounded/jump/double-jump/knockback timers
//! driven by discrete inputs, on top of [`BaseObject`].
//!
//! Every constant below is carried over verbatim from the tuned values the
//! original implementation shipped with (gravity, accelerations, timer
//! durations, the `sqrt(1/2)` direction-snap threshold) — these are feel
//! tuning, not something a rewrite should second-guess.

use crate::attachment::Connection;
use crate::error::SimError;
use crate::grid::{Entity, Grid};
use crate::ids::{Space, SpacedId};
use crate::object::{Attribute, BaseObject, Object};
use crate::packet::{KeyMsg, Keycode};
use crate::profile::{ColliderOptions, Profile, SubProfile};
use crate::timer::Timer;
use crate::vec2::Vec2;
use crate::weapon::WeaponType;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

const SQRT_HALF: f64 = 0.7071;

const GRAVITY_ACC: f64 = -18.0;
const DOWN_ACC: f64 = -18.0;

const RIGHT_ACC: f64 = 18.0;
const LEFT_ACC: f64 = -RIGHT_ACC;
const TURN_MULTIPLIER: f64 = 3.0;

const MAX_UPWARD_VEL: f64 = 12.0;
const MAX_HORIZONTAL_VEL: f64 = 12.0;
const MAX_DOWNWARD_VEL: f64 = -24.0;
const MAX_VEL_MULTIPLIER: f64 = 0.9;
const MAX_SPEED: f64 = 50.0;
const KNOCKBACK_FORCE_SQUARED: f64 = 50.0;

const JUMP_VEL: f64 = 10.0;

const FRICTION: f64 = 0.4;
const KNOCKBACK_FRICTION: f64 = 0.9;
const AIR_RESISTANCE: f64 = 0.9;

const JUMP_DURATION: Duration = Duration::from_millis(300);
const JUMP_GRACE_DURATION: Duration = Duration::from_millis(100);
const KNOCKBACK_DURATION: Duration = Duration::from_millis(150);
const DEATH_DURATION: Duration = Duration::from_secs(1);

pub const BODY_SUB_PROFILE: u32 = 1;
const BODY_SUB_PROFILE_OFFSET_Y: f64 = 0.22;

const DEATH_FLOOR_Y: f64 = -5.0;
pub const HEALTH_BYTE_ATTRIBUTE: u8 = 0;

/// Pressed/released keycodes with a prior-tick snapshot, so "just pressed"
/// (edge-triggered) input like double-jump can be detected.
#[derive(Debug, Clone, Default)]
pub struct Keys {
    current: HashSet<Keycode>,
    previous: HashSet<Keycode>,
    enabled: bool,
}

impl Keys {
    pub fn new() -> Self {
        Keys {
            current: HashSet::new(),
            previous: HashSet::new(),
            enabled: true,
        }
    }

    pub fn update(&mut self, msg: &KeyMsg) {
        if self.enabled {
            self.current = msg.keys.clone();
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.current.clear();
        }
    }

    pub fn key_down(&self, key: Keycode) -> bool {
        self.current.contains(&key)
    }

    /// True only on the tick the key transitioned from up to down.
    pub fn key_pressed(&self, key: Keycode) -> bool {
        self.current.contains(&key) && !self.previous.contains(&key)
    }

    /// Snapshots `current` into `previous`; call once per tick after all
    /// state-dependent reads for the tick are done.
    pub fn save(&mut self) {
        self.previous = self.current.clone();
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub base: BaseObject,
    pub keys: Keys,
    pub weapon: Option<SpacedId>,
    pub dir: Vec2,

    pub can_jump: bool,
    pub can_double_jump: bool,

    pub jump_timer: Timer,
    pub jump_grace_timer: Timer,
    pub knockback_timer: Timer,
    pub death_timer: Timer,

    pending_force: Vec2,
}

impl Player {
    pub fn new(sid: SpacedId, pos: Vec2, dim: Vec2, rng: &mut impl Rng) -> Self {
        let mut profile = Profile::rec2(pos, dim);

        let points = vec![
            Vec2::new(0.48, -0.53),
            Vec2::new(0.48, 0.53),
            Vec2::new(-0.48, 0.53),
            Vec2::new(-0.48, -0.53),
        ];
        profile.add_sub_profile(
            BODY_SUB_PROFILE,
            SubProfile {
                offset: Vec2::new(0.0, BODY_SUB_PROFILE_OFFSET_Y),
                shape: crate::profile::Shape::RotPoly { points },
                dim: Vec2::ZERO,
                dir: 0.0,
            },
        );

        let mut overlap_options = ColliderOptions::new();
        overlap_options.set_spaces(true, &[Space::Wall, Space::Pickup]);
        profile.overlap_options = overlap_options;

        let mut snap_options = ColliderOptions::new();
        snap_options.set_spaces(true, &[Space::Wall]);
        profile.snap_options = snap_options;

        let mut player = Player {
            base: BaseObject::new(sid, profile),
            keys: Keys::new(),
            weapon: None,
            dir: Vec2::new(1.0, 0.0),
            can_jump: false,
            can_double_jump: true,
            jump_timer: Timer::new(JUMP_DURATION),
            jump_grace_timer: Timer::new(JUMP_GRACE_DURATION),
            knockback_timer: Timer::new(KNOCKBACK_DURATION),
            death_timer: Timer::new(DEATH_DURATION),
            pending_force: Vec2::ZERO,
        };
        player.respawn(rng);
        player
    }

    pub fn dead(&self) -> bool {
        self.base.health.dead()
    }

    pub fn die(&mut self) {
        self.base.health.hp = 0;
    }

    pub fn add_force(&mut self, force: Vec2) {
        self.pending_force.add(force, 1.0);
    }

    fn apply_forces(&mut self) -> Vec2 {
        let force = self.pending_force;
        self.base.profile.kinematics.vel.add(force, 1.0);
        self.pending_force = Vec2::ZERO;
        force
    }

    pub fn respawn(&mut self, rng: &mut impl Rng) {
        self.base.health.respawn();
        self.base.remove_attribute(Attribute::Grounded);
        self.can_double_jump = true;

        let x = 15.0 + rng.gen_range(0..15) as f64;
        self.base.profile.pose.pos = Vec2::new(x, 20.0);
        self.base.profile.kinematics.vel = Vec2::ZERO;
        self.base.profile.kinematics.acc = Vec2::ZERO;
    }

    /// Credits whoever last damaged this player with a kill, and this
    /// player with a death, returning `(victim, Some(killer))` or
    /// `(victim, None)` if the last damage is stale/unknown.
    pub fn score_on_death(&self, now: Instant) -> (SpacedId, Option<SpacedId>) {
        let killer = self.base.health.last_damage_id(now, Duration::from_secs(30));
        (self.base.sid, killer)
    }

    pub fn update_keys(&mut self, msg: &KeyMsg) {
        self.keys.update(msg);

        let body_pos = self
            .base
            .profile
            .sub_profile_pos(BODY_SUB_PROFILE)
            .unwrap_or(self.base.profile.pose.pos);

        let mut dir = msg.m - body_pos;
        dir.normalize();

        let last_dir = self.dir;
        if dir.x.abs() < 0.3 && crate::util::sign_pos(dir.x) != crate::util::sign_pos(last_dir.x) {
            dir.x = crate::util::fsign_pos(last_dir.x) * dir.x.abs();
        }
        if dir.x.abs() < SQRT_HALF {
            dir.x = SQRT_HALF * crate::util::fsign_pos(dir.x);
            dir.y = SQRT_HALF * crate::util::fsign_pos(dir.y);
        }
        self.dir = dir;
    }

    pub fn update_state(
        &mut self,
        grid: &mut Grid,
        attachments: &mut HashMap<SpacedId, crate::attachment::Attachment>,
        now: Instant,
    ) -> Result<bool, SimError> {
        let ts = self.base.prepare_update(now);

        if self.base.profile.pose.pos.y < DEATH_FLOOR_Y {
            self.die();
        }

        self.base
            .set_byte_attribute(HEALTH_BYTE_ATTRIBUTE, self.base.health.hp);

        if self.dead() {
            if !self.base.has_attribute(Attribute::Dead) {
                self.base.add_attribute(Attribute::Dead);
                self.keys.set_enabled(false);
                self.death_timer.start(now);
            }
            if !self.death_timer.on(now) {
                self.base.remove_attribute(Attribute::Dead);
                self.keys.set_enabled(true);
                let mut rng = rand::thread_rng();
                self.respawn(&mut rng);
            }
        }

        let grounded = self.base.has_attribute(Attribute::Grounded);
        if grounded {
            self.jump_grace_timer.start(now);
            self.can_jump = true;
            self.can_double_jump = true;
            if let Some(weapon_sid) = self.weapon {
                if let Some(Entity::Weapon(weapon)) = grid.get_mut(weapon_sid) {
                    weapon.on_grounded();
                }
            }
        }

        let mut acc = Vec2::new(0.0, GRAVITY_ACC);
        let vel = self.base.profile.kinematics.vel;
        if !grounded && (!self.jump_timer.on(now) || vel.y <= 0.0) {
            acc.y += DOWN_ACC;
        }

        let left_down = self.keys.key_down(Keycode::Left);
        let right_down = self.keys.key_down(Keycode::Right);
        if left_down != right_down {
            acc.x = if left_down { LEFT_ACC } else { RIGHT_ACC };
            if crate::util::sign(acc.x) == -crate::util::sign(vel.x) {
                acc.x *= TURN_MULTIPLIER;
            }
        } else {
            acc.x = 0.0;
        }
        self.base.profile.kinematics.acc = acc;

        let mut vel = self.base.profile.kinematics.vel;
        vel.add(acc, ts);

        if self.keys.key_down(Keycode::Jump) {
            if self.can_jump && self.jump_grace_timer.on(now) {
                self.can_jump = false;
                vel.y = vel.y.max(0.0) + JUMP_VEL;
                self.jump_timer.start(now);
            } else if self.keys.key_pressed(Keycode::Jump) && self.can_double_jump {
                vel.y = JUMP_VEL;
                self.can_double_jump = false;
                self.jump_timer.start(now);
            }
        }
        self.base.profile.kinematics.vel = vel;

        let force = self.apply_forces();
        if force.len_squared() > KNOCKBACK_FORCE_SQUARED {
            self.knockback_timer.start(now);
        }
        let mut vel = self.base.profile.kinematics.vel;

        if grounded {
            if crate::util::sign(acc.x) != crate::util::sign(vel.x) {
                if self.knockback_timer.on(now) {
                    vel.x *= self.knockback_timer.lerp(now, KNOCKBACK_FRICTION, FRICTION);
                } else {
                    vel.x *= FRICTION;
                }
            }
        } else if acc.x == 0.0 {
            vel.x *= AIR_RESISTANCE;
        }

        if vel.x.abs() > MAX_HORIZONTAL_VEL {
            vel.x *= MAX_VEL_MULTIPLIER;
        }
        if vel.y < MAX_DOWNWARD_VEL {
            vel.y *= MAX_VEL_MULTIPLIER;
        }
        if vel.y > MAX_UPWARD_VEL {
            vel.y *= MAX_VEL_MULTIPLIER;
        }
        if vel.len_squared() >= MAX_SPEED * MAX_SPEED {
            vel.normalize();
            vel.scale(MAX_SPEED);
        }
        self.base.profile.kinematics.vel = vel;

        let mut pos = self.base.profile.pose.pos;
        pos.add(self.base.profile.kinematics.vel, ts);
        self.base.profile.pose.pos = pos;

        self.check_collisions(grid, attachments, now)?;

        Ok(true)
    }

    pub fn postprocess(&mut self, _grid: &mut Grid, _now: Instant) {
        self.keys.save();
    }

    pub fn on_delete(&mut self, grid: &mut Grid) -> Result<(), SimError> {
        if let Some(weapon_sid) = self.weapon.take() {
            grid.delete(weapon_sid)?;
        }
        Ok(())
    }

    fn check_collisions(
        &mut self,
        grid: &mut Grid,
        attachments: &mut HashMap<SpacedId, crate::attachment::Attachment>,
        now: Instant,
    ) -> Result<(), SimError> {
        let snap_ids = grid.colliders(&self.base.profile, &self.base.profile.snap_options);
        let snap_profiles: Vec<Profile> = snap_ids
            .iter()
            .filter_map(|sid| grid.get(*sid).map(|e| e.profile().clone()))
            .collect();
        let snap_refs: Vec<&Profile> = snap_profiles.iter().collect();
        let snap_result = self.base.profile.snap(&snap_refs);
        self.base.profile.pose.pos.add(snap_result.pos_adj, 1.0);
        self.base.profile.kinematics.ext_vel = snap_result.ext_vel;

        if snap_result.pos_adj.y > 0.0 {
            self.base.add_attribute(Attribute::Grounded);
        } else {
            self.base.remove_attribute(Attribute::Grounded);
        }

        let overlap_ids = grid.colliders(&self.base.profile, &self.base.profile.overlap_options);
        for sid in overlap_ids {
            let weapon_type = match grid.get(sid) {
                Some(Entity::Pickup(pickup)) => pickup.weapon_type,
                _ => continue,
            };
            if !self.keys.key_down(Keycode::Interact) {
                continue;
            }
            if self.weapon.is_none() {
                let weapon_sid = grid.next_sid(Space::Weapon)?;
                let mut weapon = crate::weapon::Weapon::new(
                    weapon_sid,
                    self.base.profile.pose.pos,
                    self.base.sid,
                );
                weapon.weapon_type = weapon_type;
                grid.upsert(Entity::Weapon(weapon))?;

                let mut attachment = crate::attachment::Attachment::new(weapon_sid);
                attachment.add_connection(
                    self.base.sid,
                    Connection::Offset {
                        offset: Vec2::new(0.0, BODY_SUB_PROFILE_OFFSET_Y),
                    },
                );
                attachments.insert(weapon_sid, attachment);

                self.weapon = Some(weapon_sid);
            } else if let Some(Entity::Weapon(weapon)) =
                self.weapon.and_then(|sid| grid.get_mut(sid))
            {
                weapon.weapon_type = weapon_type;
            }
        }
        let _ = now;
        Ok(())
    }
}

impl Object for Player {
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
    use assert_approx_eq::assert_approx_eq;

    fn new_player() -> Player {
        let mut rng = rand::thread_rng();
        Player::new(
            SpacedId::new(Space::Player, 0),
            Vec2::new(0.0, 20.0),
            Vec2::new(0.8, 1.44),
            &mut rng,
        )
    }

    #[test]
    fn jump_while_grounded_sets_velocity_and_timer() {
        let mut player = new_player();
        player.base.add_attribute(Attribute::Grounded);
        player.can_jump = true;
        let now = Instant::now();
        player.jump_grace_timer.start(now);
        player.keys.update(&KeyMsg {
            keys: [Keycode::Jump].into_iter().collect(),
            m: Vec2::ZERO,
        });

        let mut grid = Grid::new();
        let mut attachments = HashMap::new();
        player.update_state(&mut grid, &mut attachments, now).unwrap();

        assert!(!player.can_jump);
        assert!(player.jump_timer.on(now));
        assert!(player.base.profile.kinematics.vel.y >= JUMP_VEL);
    }

    #[test]
    fn double_jump_consumes_can_double_jump() {
        let mut player = new_player();
        player.can_double_jump = true;
        let now = Instant::now();
        player.keys.update(&KeyMsg {
            keys: [Keycode::Jump].into_iter().collect(),
            m: Vec2::ZERO,
        });

        let mut grid = Grid::new();
        let mut attachments = HashMap::new();
        player.update_state(&mut grid, &mut attachments, now).unwrap();

        assert!(!player.can_double_jump);
        assert_approx_eq!(player.base.profile.kinematics.vel.y, JUMP_VEL);
    }

    #[test]
    fn death_floor_kills_player() {
        let mut player = new_player();
        player.base.profile.pose.pos.y = -10.0;
        let now = Instant::now();
        let mut grid = Grid::new();
        let mut attachments = HashMap::new();
        player.update_state(&mut grid, &mut attachments, now).unwrap();
        assert!(player.base.has_attribute(Attribute::Dead));
    }

    #[test]
    fn update_keys_snaps_near_horizontal_midline() {
        let mut player = new_player();
        player.dir = Vec2::new(1.0, 0.0);
        player.update_keys(&KeyMsg {
            keys: HashSet::new(),
            m: player.base.profile.pose.pos + Vec2::new(0.05, 1.0),
        });
        assert!(player.dir.x > 0.0);
    }
}
