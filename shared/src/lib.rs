//! # Shared Simulation Library
//!
//! Data structures, constants, and math shared by the room server. A future
//! client would depend on this crate the same way; today it is consumed only
//! by the `server` crate and by the root integration tests.
//!
//! ## Core Components
//!
//! ### Geometry
//! [`vec2`] and its `Vec2`/`Line` primitives underlie every shape and every
//! kinematic field on every entity.
//!
//! ### Shapes
//! [`profile`] implements the closed `Profile` variant set (`Rec2`,
//! `RotPoly`, `Circle`, `SubProfile`) and the four operations every variant
//! supports: `contains`, `intersects`, `overlap`, `snap`.
//!
//! ### Spatial index
//! [`grid`] is the uniform-cell broad-phase index: incremental upsert/delete,
//! neighbor queries, and the DDA raycast walk.
//!
//! ### Entities
//! [`object`] (BaseObject/Health/attributes), [`attachment`]
//! (parent→child constraints), [`player`] (the input-driven state machine),
//! and [`weapon`] (pickup/weapon lifecycle) build on the shape system.
//!
//! ### Simulation
//! [`game`] owns the entity registry and drives the four-phase per-tick
//! pipeline.
//!
//! ### Wire protocol
//! [`packet`] defines the message taxonomy carried over the reliable and
//! unreliable channels. Encoding itself is `serde` + `bincode`, the same
//! pair the server binary uses for every frame.
//!
//! ## Design philosophy
//!
//! Every numeric field that flows into the simulation is `f64`, matching the
//! precision the original implementation relied on for its collision math;
//! this is a deliberate divergence from typical game-client code (which
//! favors `f32`) because snap/overlap accumulate error across many ticks.
//!
//! All wire types implement `Serialize`/`Deserialize` for `bincode` framing.
//! Nothing in this crate touches sockets, channels, or time-of-day directly
//! except through an injected `Instant`/`now` parameter, so the simulation
//! stays deterministic given the same sequence of inputs and timestamps.

pub mod attachment;
pub mod error;
pub mod game;
pub mod grid;
pub mod ids;
pub mod object;
pub mod packet;
pub mod player;
pub mod profile;
pub mod timer;
pub mod util;
pub mod vec2;
pub mod weapon;

pub use attachment::{Attachment, Connection};
pub use error::SimError;
pub use game::Game;
pub use grid::{Entity, Grid};
pub use ids::{Space, SpacedId};
pub use object::{Attribute, BaseObject, Health, Object};
pub use packet::{ChatMsg, ClientData, KeyMsg, Keycode, Packet};
pub use player::Player;
pub use profile::{ColliderOptions, Profile};
pub use timer::Timer;
pub use vec2::{Line, Vec2};
pub use weapon::{Pickup, Weapon, WeaponType};
