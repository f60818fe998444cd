//! Parent→child constraints. The algorithm that walks the entity registry
//! and applies these lives in [`crate::game`]'s tick pipeline, because it
//! needs simultaneous read access to a parent entity and mutable access to
//! the child — this module holds only the data and the decision of which
//! connection kind is in play.

use crate::ids::SpacedId;
use crate::vec2::Vec2;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Connection {
    /// Child pose is driven entirely from parent pose, stamped in
    /// `Postprocess` after collision resolution — an offset-attached child
    /// never resolves its own collisions.
    Offset { offset: Vec2 },
    /// Child accelerates toward `parent.pos + offset` during `UpdateState`,
    /// before collision resolution.
    Attract { offset: Vec2, factor: f64 },
}

/// One child's set of parent constraints, keyed by parent `SpacedId`.
/// Additive: a child may be constrained by more than one parent
/// simultaneously (though in practice this simulation only ever attaches
/// one).
#[derive(Debug, Clone)]
pub struct Attachment {
    pub child: SpacedId,
    connections: HashMap<SpacedId, Connection>,
}

impl Attachment {
    pub fn new(child: SpacedId) -> Self {
        Attachment {
            child,
            connections: HashMap::new(),
        }
    }

    /// No-op if `parent == self.child` — an entity must never attract or
    /// offset itself.
    pub fn add_connection(&mut self, parent: SpacedId, connection: Connection) {
        if parent == self.child {
            return;
        }
        self.connections.insert(parent, connection);
    }

    pub fn remove_connection(&mut self, parent: SpacedId) {
        self.connections.remove(&parent);
    }

    pub fn connections(&self) -> &HashMap<SpacedId, Connection> {
        &self.connections
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Space;

    #[test]
    fn cannot_attach_to_self() {
        let sid = SpacedId::new(Space::Weapon, 0);
        let mut attachment = Attachment::new(sid);
        attachment.add_connection(sid, Connection::Offset { offset: Vec2::ZERO });
        assert!(attachment.is_empty());
    }

    #[test]
    fn remove_connection_clears_map() {
        let child = SpacedId::new(Space::Weapon, 0);
        let parent = SpacedId::new(Space::Player, 1);
        let mut attachment = Attachment::new(child);
        attachment.add_connection(parent, Connection::Offset { offset: Vec2::ZERO });
        assert!(!attachment.is_empty());
        attachment.remove_connection(parent);
        assert!(attachment.is_empty());
    }
}
