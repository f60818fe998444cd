//! # Room Server Library
//!
//! Authoritative server for room-based multiplayer sessions. Simulation
//! itself (physics, collision, the player state machine) lives in the
//! `shared` crate as a [`shared::Game`]; this crate is the transport and
//! room-lifecycle layer wrapped around it.
//!
//! ## Module Organization
//!
//! ### `config`
//! Command-line configuration via `clap`.
//!
//! ### `error`
//! [`error::RoomError`], wrapping simulation errors alongside transport and
//! room-lookup failures.
//!
//! ### `client_manager`
//! Per-room client roster: address/id mapping, display names, voice-roster
//! flags, and timeout detection.
//!
//! ### `room`
//! [`room::Room`], a single-writer actor owning one [`shared::Game`] and one
//! `ClientManager`. Inbound events (register/unregister/incoming) are
//! queued and drained in a fixed priority order once per loop iteration,
//! interleaved with the simulation tick.
//!
//! ### `network`
//! UDP socket handling: a receiver task that deserializes packets and
//! routes them to the right room by address, and a sender task that
//! serializes and transmits queued outbound packets.
//!
//! ## Architecture
//!
//! Each room is its own task; rooms never share mutable state, so there's
//! no cross-room locking on the hot path. A [`network::RoomRegistry`]
//! behind a single mutex maps room names to handles, created on first join
//! and dropped once a room's last client leaves.

pub mod client_manager;
pub mod config;
pub mod error;
pub mod network;
pub mod room;
