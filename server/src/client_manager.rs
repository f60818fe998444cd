//! Membership bookkeeping for a single room: address <-> client id mapping,
//! display names, voice-roster flags, and timeout detection.

use shared::{ClientData, SpacedId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ClientEntry {
    pub id: u32,
    pub addr: SocketAddr,
    pub name: String,
    pub voice: bool,
    pub sid: SpacedId,
    last_seen: Instant,
}

impl ClientEntry {
    pub fn client_data(&self) -> ClientData {
        ClientData {
            id: self.id,
            name: self.name.clone(),
            voice: self.voice,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// All clients currently joined to a room, keyed both by client id and by
/// socket address (every inbound datagram arrives addressed, but most room
/// logic wants to talk about a client id).
#[derive(Debug, Default)]
pub struct ClientManager {
    clients: HashMap<u32, ClientEntry>,
    addr_to_id: HashMap<SocketAddr, u32>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        ClientManager {
            clients: HashMap::new(),
            addr_to_id: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<&ClientEntry> {
        self.addr_to_id.get(&addr).and_then(|id| self.clients.get(id))
    }

    pub fn get(&self, id: u32) -> Option<&ClientEntry> {
        self.clients.get(&id)
    }

    /// Reserves a client id and address without yet admitting the client to
    /// the room roster (mirrors the register/init split: registration can
    /// fail or be rejected before the client ever becomes visible to
    /// others).
    pub fn reserve(&mut self, addr: SocketAddr, name: String) -> Option<u32> {
        if self.is_full() || self.addr_to_id.contains_key(&addr) {
            return None;
        }
        let id = self.next_client_id;
        self.next_client_id += 1;
        let entry = ClientEntry {
            id,
            addr,
            name,
            voice: false,
            sid: SpacedId::new(shared::Space::Player, id),
            last_seen: Instant::now(),
        };
        self.addr_to_id.insert(addr, id);
        self.clients.insert(id, entry);
        Some(id)
    }

    pub fn remove(&mut self, addr: SocketAddr) -> Option<ClientEntry> {
        let id = self.addr_to_id.remove(&addr)?;
        self.clients.remove(&id)
    }

    pub fn set_voice(&mut self, id: u32, voice: bool) {
        if let Some(entry) = self.clients.get_mut(&id) {
            entry.voice = voice;
        }
    }

    pub fn touch(&mut self, addr: SocketAddr) {
        if let Some(id) = self.addr_to_id.get(&addr).copied() {
            if let Some(entry) = self.clients.get_mut(&id) {
                entry.touch();
            }
        }
    }

    pub fn roster(&self, exclude: Option<u32>, voice_only: bool) -> Vec<ClientData> {
        self.clients
            .values()
            .filter(|c| Some(c.id) != exclude)
            .filter(|c| !voice_only || c.voice)
            .map(ClientEntry::client_data)
            .collect()
    }

    pub fn all_addrs(&self) -> Vec<SocketAddr> {
        self.clients.values().map(|c| c.addr).collect()
    }

    pub fn timed_out(&self, timeout: Duration) -> Vec<SocketAddr> {
        self.clients
            .values()
            .filter(|c| c.is_timed_out(timeout))
            .map(|c| c.addr)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn reserve_assigns_increasing_ids() {
        let mut manager = ClientManager::new(4);
        let a = manager.reserve(addr(1), "a".into()).unwrap();
        let b = manager.reserve(addr(2), "b".into()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn reserve_rejects_beyond_capacity() {
        let mut manager = ClientManager::new(1);
        assert!(manager.reserve(addr(1), "a".into()).is_some());
        assert!(manager.reserve(addr(2), "b".into()).is_none());
    }

    #[test]
    fn remove_clears_address_mapping() {
        let mut manager = ClientManager::new(4);
        manager.reserve(addr(1), "a".into()).unwrap();
        assert!(manager.remove(addr(1)).is_some());
        assert!(manager.find_by_addr(addr(1)).is_none());
    }

    #[test]
    fn roster_excludes_requested_client() {
        let mut manager = ClientManager::new(4);
        let a = manager.reserve(addr(1), "a".into()).unwrap();
        manager.reserve(addr(2), "b".into()).unwrap();
        let roster = manager.roster(Some(a), false);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "b");
    }
}
