//! Wire protocol: the message taxonomy carried over the reliable and
//! unreliable channels. Framing itself (the actual bytes on the socket) is
//! `bincode::serialize`/`deserialize` over this enum, the same encoding the
//! teacher crate uses for its own `Packet` type — only the variant set
//! differs, expanded here to the full taxonomy a room needs (membership,
//! level/game init, chat, voice signaling) rather than just connect/input.

use crate::ids::SpacedId;
use crate::vec2::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keycode {
    Up,
    Down,
    Left,
    Right,
    Jump,
    Interact,
}

/// A snapshot of one client's membership info, sent inside `Init`/`Join`/
/// `Left` and voice-roster messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientData {
    pub id: u32,
    pub name: String,
    pub voice: bool,
}

/// `keys` the input message carries, plus the aim point `m`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMsg {
    pub keys: HashSet<Keycode>,
    pub m: Vec2,
}

impl KeyMsg {
    pub fn key_down(&self, key: Keycode) -> bool {
        self.keys.contains(&key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMsg {
    pub name: String,
    pub message: String,
}

/// Opaque transport-setup payloads forwarded verbatim by the room; their
/// contents are never inspected by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMsg {
    pub sdp_mid: String,
    pub sdp_mline_index: u16,
    pub candidate: String,
}

/// Point-to-point signaling envelope used for voice offer/answer/candidate
/// forwarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerMsg {
    pub from: u32,
    pub to: u32,
    pub json: String,
}

/// A positioned, attributed entity as it appears in a `GameState` or
/// `GameUpdate` snapshot. Not every field is meaningful for every space
/// (e.g. walls never move), but carrying one shape keeps encode/decode
/// uniform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub sid: SpacedId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub dir: Vec2,
    pub attributes: u8,
    pub health: u8,
}

/// Static wall placement carried by `LevelInit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallPlacement {
    pub pos: Vec2,
    pub dim: Vec2,
}

/// The full message taxonomy. Tags correspond to the small-integer `T`
/// field of the original protocol; here the tag and payload are unified
/// into one enum, which `bincode` encodes as a single discriminant plus
/// payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    /// Client-to-server handshake: which room to join and under what
    /// display name. Always the first packet a fresh address sends; the
    /// websocket-path room selector of the original protocol has no UDP
    /// equivalent, so the room name travels in-band instead.
    Hello { room: String, name: String },

    Ping { seq: u32 },

    Offer { sdp: String },
    Answer { sdp: String },
    Candidate(CandidateMsg),

    Init { client: ClientData, clients: Vec<ClientData> },
    Join { client: ClientData, clients: Vec<ClientData> },
    Left { client: ClientData, clients: Vec<ClientData> },

    LevelInit { walls: Vec<WallPlacement> },
    PlayerInit { sid: SpacedId },
    GameInit { entities: Vec<EntitySnapshot> },
    GameUpdate { entities: Vec<EntitySnapshot>, kills: HashMap<u32, u32>, deaths: HashMap<u32, u32> },
    GameState { tick: u32, entities: Vec<EntitySnapshot> },

    Chat(ChatMsg),
    Key(KeyMsg),

    JoinVoice { client: ClientData, clients: Vec<ClientData> },
    LeftVoice { client: ClientData, clients: Vec<ClientData> },
    VoiceOffer(PeerMsg),
    VoiceAnswer(PeerMsg),
    VoiceCandidate(PeerMsg),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(packet: &Packet) {
        let bytes = bincode::serialize(packet).expect("serialize");
        let decoded: Packet = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&decoded, packet);
        let bytes2 = bincode::serialize(&decoded).expect("serialize again");
        assert_eq!(bytes, bytes2);
    }

    #[test]
    fn ping_roundtrips() {
        roundtrip(&Packet::Ping { seq: 7 });
    }

    #[test]
    fn hello_roundtrips() {
        roundtrip(&Packet::Hello {
            room: "lobby".into(),
            name: "ada".into(),
        });
    }

    #[test]
    fn key_roundtrips() {
        let mut keys = HashSet::new();
        keys.insert(Keycode::Jump);
        keys.insert(Keycode::Right);
        roundtrip(&Packet::Key(KeyMsg {
            keys,
            m: Vec2::new(1.0, 2.0),
        }));
    }

    #[test]
    fn chat_roundtrips() {
        roundtrip(&Packet::Chat(ChatMsg {
            name: "ada".into(),
            message: "hello".into(),
        }));
    }

    #[test]
    fn voice_offer_roundtrips() {
        roundtrip(&Packet::VoiceOffer(PeerMsg {
            from: 1,
            to: 2,
            json: "{}".into(),
        }));
    }

    #[test]
    fn game_state_roundtrips_with_entities() {
        roundtrip(&Packet::GameState {
            tick: 42,
            entities: vec![EntitySnapshot {
                sid: SpacedId::new(crate::ids::Space::Player, 1),
                pos: Vec2::new(1.0, 2.0),
                vel: Vec2::ZERO,
                dir: Vec2::new(1.0, 0.0),
                attributes: 0,
                health: 100,
            }],
        });
    }

    #[test]
    fn join_roundtrips_with_membership_list() {
        roundtrip(&Packet::Join {
            client: ClientData {
                id: 1,
                name: "a".into(),
                voice: false,
            },
            clients: vec![ClientData {
                id: 2,
                name: "b".into(),
                voice: true,
            }],
        });
    }
}
