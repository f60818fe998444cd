//! Server-level error types. Simulation errors ([`shared::SimError`]) are
//! kept separate since they originate in a crate with no networking
//! dependencies; this type wraps both plus the transport/protocol/config
//! failures specific to running the binary. Every variant is constructed at
//! an actual call site in [`crate::network`] or [`crate::room`] — see those
//! modules for where each one surfaces.

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room {0} is full")]
    RoomFull(String),
    #[error("unknown client address {0}")]
    UnknownClient(SocketAddr),
    #[error("transport error: {0}")]
    TransportError(#[from] std::io::Error),
    #[error("failed to decode packet: {0}")]
    DecodeError(String),
    #[error("unexpected packet type from client {0}")]
    UnknownMessageType(SocketAddr),
    #[error("simulation error: {0}")]
    Sim(#[from] shared::SimError),
}
