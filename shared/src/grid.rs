//! Uniform-cell spatial hash: the broad-phase collision index, plus the
//! authoritative entity registry it indexes (matching the original's `Grid`,
//! which carries both the cell maps and the `sid -> Object` map).

use crate::attachment::Attachment;
use crate::error::SimError;
use crate::ids::{Space, SpacedId};
use crate::object::BaseObject;
use crate::player::Player;
use crate::profile::{ColliderOptions, Profile};
use crate::vec2::{Line, Vec2};
use crate::weapon::{Pickup, Weapon};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

pub const GRID_UNIT_LENGTH: i64 = 4;
pub const GRID_UNIT_HEIGHT: i64 = 4;

pub type Cell = (i64, i64);

/// Every kind of simulated entity. A closed enum rather than trait objects:
/// the entity set is small and fixed, and matching on it keeps the tick
/// pipeline's borrow pattern (take entity out of the grid, mutate, put it
/// back) straightforward.
#[derive(Debug, Clone)]
pub enum Entity {
    Player(Player),
    Weapon(Weapon),
    Pickup(Pickup),
    Wall(BaseObject),
}

impl Entity {
    pub fn sid(&self) -> SpacedId {
        match self {
            Entity::Player(p) => p.base.sid,
            Entity::Weapon(w) => w.base.sid,
            Entity::Pickup(p) => p.base.sid,
            Entity::Wall(b) => b.sid,
        }
    }

    pub fn profile(&self) -> &Profile {
        match self {
            Entity::Player(p) => &p.base.profile,
            Entity::Weapon(w) => &w.base.profile,
            Entity::Pickup(p) => &p.base.profile,
            Entity::Wall(b) => &b.profile,
        }
    }

    pub fn profile_mut(&mut self) -> &mut Profile {
        match self {
            Entity::Player(p) => &mut p.base.profile,
            Entity::Weapon(w) => &mut w.base.profile,
            Entity::Pickup(p) => &mut p.base.profile,
            Entity::Wall(b) => &mut b.profile,
        }
    }

    pub fn base(&self) -> &BaseObject {
        match self {
            Entity::Player(p) => &p.base,
            Entity::Weapon(w) => &w.base,
            Entity::Pickup(p) => &p.base,
            Entity::Wall(b) => b,
        }
    }

    pub fn base_mut(&mut self) -> &mut BaseObject {
        match self {
            Entity::Player(p) => &mut p.base,
            Entity::Weapon(w) => &mut w.base,
            Entity::Pickup(p) => &mut p.base,
            Entity::Wall(b) => b,
        }
    }

    pub fn update_state(
        &mut self,
        grid: &mut Grid,
        attachments: &mut HashMap<SpacedId, Attachment>,
        now: Instant,
    ) -> Result<bool, SimError> {
        match self {
            Entity::Player(p) => p.update_state(grid, attachments, now),
            Entity::Weapon(w) => w.update_state(grid, attachments, now),
            Entity::Pickup(p) => p.update_state(grid, attachments, now),
            Entity::Wall(_) => Ok(true),
        }
    }

    pub fn postprocess(&mut self, grid: &mut Grid, now: Instant) {
        match self {
            Entity::Player(p) => p.postprocess(grid, now),
            Entity::Weapon(w) => w.postprocess(grid, now),
            Entity::Pickup(p) => p.postprocess(grid, now),
            Entity::Wall(_) => {}
        }
    }

    pub fn on_delete(&mut self, grid: &mut Grid) -> Result<(), SimError> {
        match self {
            Entity::Player(p) => p.on_delete(grid),
            Entity::Weapon(w) => w.on_delete(grid),
            Entity::Pickup(p) => p.on_delete(grid),
            Entity::Wall(_) => Ok(()),
        }
    }
}

/// An entity ranked by its overlap area against the profile that queried
/// it — the ordering `Grid::colliders` returns, largest overlap first, so
/// callers resolving snap/overlap in priority order can just iterate.
#[derive(Debug, Clone, Copy)]
struct RankedCollider {
    sid: SpacedId,
    area: f64,
}

pub struct Grid {
    entities: HashMap<SpacedId, Entity>,
    cells: HashMap<Cell, HashSet<SpacedId>>,
    reverse: HashMap<SpacedId, Vec<Cell>>,
    next_id: HashMap<Space, u32>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Grid {
            entities: HashMap::new(),
            cells: HashMap::new(),
            reverse: HashMap::new(),
            next_id: HashMap::new(),
        }
    }

    /// Allocates the next id in `space`. Fails once a space's counter would
    /// reach [`SpacedId::INVALID_ID`] — that value is the reserved sentinel
    /// for "no entity" (see `SpacedId::invalid`), so handing it out as a
    /// real id would make a later `is_invalid()` check lie.
    pub fn next_sid(&mut self, space: Space) -> Result<SpacedId, SimError> {
        let counter = self.next_id.entry(space).or_insert(0);
        if *counter == SpacedId::INVALID_ID {
            return Err(SimError::InvariantViolation(format!(
                "id space {space:?} exhausted at the reserved sentinel value"
            )));
        }
        let id = *counter;
        *counter += 1;
        Ok(SpacedId::new(space, id))
    }

    pub fn get(&self, sid: SpacedId) -> Option<&Entity> {
        self.entities.get(&sid)
    }

    pub fn get_mut(&mut self, sid: SpacedId) -> Option<&mut Entity> {
        self.entities.get_mut(&sid)
    }

    pub fn contains(&self, sid: SpacedId) -> bool {
        self.entities.contains_key(&sid)
    }

    pub fn sids(&self) -> Vec<SpacedId> {
        self.entities.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Removes `sid` from the index and registry and returns the owned
    /// entity, without running its `on_delete` hook. Used by the tick
    /// pipeline to take an entity out before mutating it.
    pub fn take(&mut self, sid: SpacedId) -> Option<Entity> {
        self.remove_from_cells(sid);
        self.entities.remove(&sid)
    }

    fn remove_from_cells(&mut self, sid: SpacedId) {
        if let Some(cells) = self.reverse.remove(&sid) {
            for cell in cells {
                if let Some(occupants) = self.cells.get_mut(&cell) {
                    occupants.remove(&sid);
                    if occupants.is_empty() {
                        self.cells.remove(&cell);
                    }
                }
            }
        }
    }

    /// Inserts or re-indexes `entity` at its current profile's occupancy.
    /// No-op (aside from the value swap) if the occupancy is unchanged.
    ///
    /// Fails with [`SimError::InvariantViolation`] if the profile carries a
    /// negative dimension, or if the cell index ends up out of sync with
    /// the reverse-lookup map it mirrors. Neither should be reachable given
    /// the rest of this module, but every entity passes through here before
    /// becoming visible to collision queries, so it's the one place worth
    /// actually checking.
    pub fn upsert(&mut self, entity: Entity) -> Result<(), SimError> {
        let sid = entity.sid();
        let dim = entity.profile().pose.dim;
        if dim.x < 0.0 || dim.y < 0.0 {
            return Err(SimError::InvariantViolation(format!(
                "{sid:?} has negative profile dimension {dim:?}"
            )));
        }

        let new_cells = self.occupancy(entity.profile());

        let unchanged = self
            .reverse
            .get(&sid)
            .is_some_and(|existing| existing == &new_cells);

        if !unchanged {
            self.remove_from_cells(sid);
            for cell in &new_cells {
                self.cells.entry(*cell).or_default().insert(sid);
            }
            self.reverse.insert(sid, new_cells.clone());
        }
        self.entities.insert(sid, entity);

        if self.reverse.get(&sid) != Some(&new_cells) {
            return Err(SimError::InvariantViolation(format!(
                "grid cell index desynced from its reverse lookup for {sid:?}"
            )));
        }
        Ok(())
    }

    /// Removes `sid`, runs its `on_delete` hook, and drops it from the
    /// registry. Returns the entity for callers that want to inspect it
    /// after deletion (e.g. to also tear down attachments). Propagates
    /// whatever `on_delete` itself reports — none of the current `on_delete`
    /// impls fail, but the caller should still see a real error rather than
    /// a silently dropped one if that ever changes.
    pub fn delete(&mut self, sid: SpacedId) -> Result<Option<Entity>, SimError> {
        let Some(mut entity) = self.take(sid) else {
            return Ok(None);
        };
        entity.on_delete(self)?;
        Ok(Some(entity))
    }

    fn floor_cell(v: f64, unit: i64) -> i64 {
        let c = crate::util::int_down(v);
        c - crate::util::modulo(c, unit)
    }

    pub fn cell_of(&self, point: Vec2) -> Cell {
        (
            Self::floor_cell(point.x, GRID_UNIT_LENGTH),
            Self::floor_cell(point.y, GRID_UNIT_HEIGHT),
        )
    }

    /// The AABB-derived range of cells a profile occupies.
    fn occupancy(&self, profile: &Profile) -> Vec<Cell> {
        let pos = profile.pose.pos;
        let dim = profile.pose.dim;

        let xmin = pos.x - dim.x / 2.0;
        let xmax = pos.x + dim.x / 2.0;
        let ymin = pos.y - dim.y / 2.0;
        let ymax = pos.y + dim.y / 2.0;

        let cxmin = crate::util::int_up(xmin) - crate::util::modulo(crate::util::int_up(xmin), GRID_UNIT_LENGTH);
        let cxmax = crate::util::int_up(xmax) - crate::util::modulo(crate::util::int_up(xmax), GRID_UNIT_LENGTH);
        let cymin = crate::util::int_up(ymin) - crate::util::modulo(crate::util::int_up(ymin), GRID_UNIT_HEIGHT);
        let cymax = crate::util::int_up(ymax) - crate::util::modulo(crate::util::int_up(ymax), GRID_UNIT_HEIGHT);

        let mut cells = Vec::new();
        let mut x = cxmin;
        while x <= cxmax {
            let mut y = cymin;
            while y <= cymax {
                cells.push((x, y));
                y += GRID_UNIT_HEIGHT;
            }
            x += GRID_UNIT_LENGTH;
        }
        cells
    }

    pub fn objects_near(&self, profile: &Profile) -> HashSet<SpacedId> {
        let mut found = HashSet::new();
        for cell in self.occupancy(profile) {
            if let Some(occupants) = self.cells.get(&cell) {
                found.extend(occupants.iter().copied());
            }
        }
        found
    }

    /// Candidates overlapping `profile`, filtered by `options.spaces` and
    /// `options.ignored`, ordered by descending overlap area.
    pub fn colliders(&self, profile: &Profile, options: &ColliderOptions) -> Vec<SpacedId> {
        let mut ranked: Vec<RankedCollider> = self
            .objects_near(profile)
            .into_iter()
            .filter_map(|sid| {
                let entity = self.entities.get(&sid)?;
                let space = sid.space;
                if !options.accepts(space, sid) {
                    return None;
                }
                let overlap = profile.overlap(entity.profile());
                if !overlap.overlap {
                    return None;
                }
                Some(RankedCollider {
                    sid,
                    area: overlap.amount.area(),
                })
            })
            .collect();
        ranked.sort_by(|a, b| b.area.partial_cmp(&a.area).unwrap_or(std::cmp::Ordering::Equal));
        ranked.into_iter().map(|r| r.sid).collect()
    }

    /// DDA walk along `line`: the first cell (the one containing `line.o`)
    /// always wins over any later cell, even if a later cell would report a
    /// smaller `t` — this matches the original's early-return-on-first-hit
    /// behavior exactly (see the explicit test below).
    pub fn line_collider(&self, line: Line) -> Option<(SpacedId, f64)> {
        let mut coord = self.cell_of(line.o);

        loop {
            let mut best: Option<(SpacedId, f64)> = None;
            if let Some(occupants) = self.cells.get(&coord) {
                for &sid in occupants {
                    let entity = match self.entities.get(&sid) {
                        Some(e) => e,
                        None => continue,
                    };
                    let result = entity.profile().intersects(line);
                    if result.hit {
                        best = Some(match best {
                            Some((_, t)) if t <= result.t => best.unwrap(),
                            _ => (sid, result.t),
                        });
                    }
                }
            }
            if let Some(hit) = best {
                return Some(hit);
            }

            let sign_x = crate::util::sign(line.r.x) as f64;
            let mut xstart = Vec2::new(coord.0 as f64, coord.1 as f64);
            if sign_x > 0.0 {
                xstart.x += GRID_UNIT_LENGTH as f64;
            }
            let xline = Line::new(xstart, Vec2::new(0.0, GRID_UNIT_HEIGHT as f64));

            let sign_y = crate::util::sign(line.r.y) as f64;
            let mut ystart = Vec2::new(coord.0 as f64, coord.1 as f64);
            if sign_y > 0.0 {
                ystart.y += GRID_UNIT_HEIGHT as f64;
            }
            let yline = Line::new(ystart, Vec2::new(GRID_UNIT_LENGTH as f64, 0.0));

            let (xhit, xt) = line.intersects(xline);
            let (yhit, yt) = line.intersects(yline);

            if !xhit && !yhit {
                return None;
            }
            if xhit && (xt <= yt || !yhit) {
                coord.0 += sign_x as i64 * GRID_UNIT_LENGTH;
            }
            if yhit && (yt <= xt || !xhit) {
                coord.1 += sign_y as i64 * GRID_UNIT_HEIGHT;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::BaseObject;

    fn wall(sid: SpacedId, pos: Vec2, dim: Vec2) -> Entity {
        Entity::Wall(BaseObject::new(sid, Profile::rec2(pos, dim)))
    }

    #[test]
    fn upsert_indexes_occupied_cells_matching_aabb() {
        let mut grid = Grid::new();
        let sid = SpacedId::new(Space::Wall, 0);
        grid.upsert(wall(sid, Vec2::new(2.0, 2.0), Vec2::new(4.0, 4.0))).unwrap();
        let found = grid.objects_near(&Profile::rec2(Vec2::new(2.0, 2.0), Vec2::new(1.0, 1.0)));
        assert!(found.contains(&sid));
    }

    #[test]
    fn upsert_rejects_negative_dimension() {
        let mut grid = Grid::new();
        let sid = SpacedId::new(Space::Wall, 0);
        let err = grid
            .upsert(wall(sid, Vec2::new(2.0, 2.0), Vec2::new(-4.0, 4.0)))
            .unwrap_err();
        assert!(matches!(err, SimError::InvariantViolation(_)));
        assert!(!grid.contains(sid));
    }

    #[test]
    fn delete_removes_from_all_cells() {
        let mut grid = Grid::new();
        let sid = SpacedId::new(Space::Wall, 0);
        grid.upsert(wall(sid, Vec2::new(2.0, 2.0), Vec2::new(4.0, 4.0))).unwrap();
        grid.delete(sid).unwrap();
        assert!(!grid.contains(sid));
        let found = grid.objects_near(&Profile::rec2(Vec2::new(2.0, 2.0), Vec2::new(1.0, 1.0)));
        assert!(!found.contains(&sid));
    }

    #[test]
    fn line_collider_hits_wall_at_expected_t() {
        let mut grid = Grid::new();
        let sid = SpacedId::new(Space::Wall, 0);
        grid.upsert(wall(sid, Vec2::new(8.0, 2.0), Vec2::new(4.0, 4.0))).unwrap();
        let line = Line::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        let (hit_sid, t) = grid.line_collider(line).expect("expected a hit");
        assert_eq!(hit_sid, sid);
        assert!((t - 0.8).abs() < 1e-6);
    }

    #[test]
    fn line_collider_misses_when_nothing_in_path() {
        let grid = Grid::new();
        let line = Line::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        assert!(grid.line_collider(line).is_none());
    }

    #[test]
    fn line_collider_starting_cell_wins_over_later_cells() {
        // A collider in the starting cell must win even though a further
        // collider along the ray would report a smaller t if tested alone.
        let mut grid = Grid::new();
        let near = SpacedId::new(Space::Wall, 0);
        let far = SpacedId::new(Space::Wall, 1);
        grid.upsert(wall(near, Vec2::new(1.0, 0.0), Vec2::new(4.0, 4.0))).unwrap();
        grid.upsert(wall(far, Vec2::new(20.0, 0.0), Vec2::new(4.0, 4.0))).unwrap();
        let line = Line::new(Vec2::new(0.0, 0.0), Vec2::new(30.0, 0.0));
        let (hit_sid, _) = grid.line_collider(line).expect("expected a hit");
        assert_eq!(hit_sid, near);
    }

    #[test]
    fn next_sid_increments_per_space() {
        let mut grid = Grid::new();
        let a = grid.next_sid(Space::Weapon).unwrap();
        let b = grid.next_sid(Space::Weapon).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn next_sid_refuses_to_hand_out_the_invalid_sentinel() {
        let mut grid = Grid::new();
        grid.next_id.insert(Space::Weapon, SpacedId::INVALID_ID);
        let err = grid.next_sid(Space::Weapon).unwrap_err();
        assert!(matches!(err, SimError::InvariantViolation(_)));
    }
}
