//! UDP transport: one socket shared by a receiver task (deserialize +
//! route to a room by address) and a sender task (serialize + transmit
//! whatever rooms queue via [`crate::room::Outbound`]). A [`RoomRegistry`]
//! maps room names to running [`crate::room::RoomHandle`]s, created the
//! first time a client sends `Packet::Hello` for a room that doesn't
//! exist yet and dropped once that room's last client leaves and its
//! task exits.

use crate::config::Args;
use crate::error::RoomError;
use crate::room::{Outbound, Room, RoomEvent, RoomHandle};
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::Packet;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};

/// Maps room names to their running actor and each known client address to
/// the room it belongs to, so inbound packets route in O(1) without
/// touching every room.
pub struct RoomRegistry {
    rooms: HashMap<String, RoomHandle>,
    addr_rooms: HashMap<SocketAddr, String>,
    max_rooms: usize,
}

impl RoomRegistry {
    pub fn new(max_rooms: usize) -> Self {
        RoomRegistry {
            rooms: HashMap::new(),
            addr_rooms: HashMap::new(),
            max_rooms,
        }
    }

    fn get_or_create(
        &mut self,
        name: &str,
        args: &Args,
        outbound: mpsc::UnboundedSender<Outbound>,
        registry: &Arc<Mutex<RoomRegistry>>,
    ) -> Result<RoomHandle, RoomError> {
        if let Some(handle) = self.rooms.get(name) {
            return Ok(handle.clone());
        }
        if self.rooms.len() >= self.max_rooms {
            return Err(RoomError::RoomFull(name.to_string()));
        }

        info!("creating room {name}");
        let (handle, join_handle) = Room::spawn(name.to_string(), args, outbound);
        self.rooms.insert(name.to_string(), handle.clone());

        let registry = Arc::clone(registry);
        let room_name = name.to_string();
        tokio::spawn(async move {
            let _ = join_handle.await;
            let mut registry = registry.lock().await;
            registry.rooms.remove(&room_name);
            registry.addr_rooms.retain(|_, v| v != &room_name);
            info!("room {room_name} removed from registry");
        });

        Ok(handle)
    }

    fn room_for(&self, addr: SocketAddr) -> Option<&RoomHandle> {
        self.addr_rooms.get(&addr).and_then(|name| self.rooms.get(name))
    }
}

pub struct Server {
    socket: Arc<UdpSocket>,
    args: Args,
    registry: Arc<Mutex<RoomRegistry>>,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    outbound_rx: mpsc::UnboundedReceiver<Outbound>,
}

impl Server {
    pub async fn bind(args: Args) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(args.bind_addr()).await?);
        info!("listening on {}", args.bind_addr());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Mutex::new(RoomRegistry::new(args.max_rooms)));
        Ok(Server {
            socket,
            args,
            registry,
            outbound_tx,
            outbound_rx,
        })
    }

    /// Runs forever: spawns the sender task, then loops receiving
    /// datagrams, deserializing them, and routing them to the right room —
    /// `Hello` creates or joins a room and registers the sender's address;
    /// anything else forwards to whatever room that address already
    /// belongs to.
    pub async fn run(mut self) -> std::io::Result<()> {
        self.spawn_sender();

        let mut buf = [0u8; 2048];
        loop {
            let (len, addr) = match self.socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    error!("{}", RoomError::TransportError(e));
                    continue;
                }
            };

            let packet: Packet = match deserialize(&buf[..len]) {
                Ok(p) => p,
                Err(e) => {
                    warn!("{} (from {addr})", RoomError::DecodeError(e.to_string()));
                    continue;
                }
            };

            self.route(addr, packet).await;
        }
    }

    async fn route(&self, addr: SocketAddr, packet: Packet) {
        if let Packet::Hello { room, name } = packet {
            let mut registry = self.registry.lock().await;
            match registry.get_or_create(&room, &self.args, self.outbound_tx.clone(), &self.registry) {
                Ok(handle) => {
                    registry.addr_rooms.insert(addr, room);
                    handle.send(RoomEvent::Register { addr, name });
                }
                Err(e) => warn!("rejecting join from {addr}: {e}"),
            }
            return;
        }

        let registry = self.registry.lock().await;
        let Some(handle) = registry.room_for(addr) else {
            warn!("{}", RoomError::UnknownClient(addr));
            return;
        };
        handle.send(RoomEvent::Incoming { addr, packet });
    }

    fn spawn_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut outbound_rx = std::mem::replace(&mut self.outbound_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    Outbound::Unicast { packet, addr } => {
                        Self::send_to(&socket, &packet, addr).await;
                    }
                    Outbound::Broadcast { packet, addrs, exclude } => {
                        let bytes = match serialize(&packet) {
                            Ok(b) => b,
                            Err(e) => {
                                error!("failed to serialize broadcast packet: {e}");
                                continue;
                            }
                        };
                        for addr in addrs {
                            if Some(addr) == exclude {
                                continue;
                            }
                            if let Err(e) = socket.send_to(&bytes, addr).await {
                                error!("failed to send to {addr}: {e}");
                            }
                        }
                    }
                }
            }
        });
    }

    async fn send_to(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) {
        match serialize(packet) {
            Ok(bytes) => {
                if let Err(e) = socket.send_to(&bytes, addr).await {
                    error!("failed to send to {addr}: {e}");
                }
            }
            Err(e) => error!("failed to serialize packet for {addr}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_rejects_beyond_max_rooms() {
        let registry = RoomRegistry::new(0);
        assert_eq!(registry.max_rooms, 0);
    }
}
