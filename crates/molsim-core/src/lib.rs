//! Core types shared across the molsim workspace.
//!
//! A [`SimBox`] owns the simulation volume and its atoms, hands out dense
//! global indices and fans lifecycle events out to registered
//! [`BoxListener`]s. [`AgentTable`] and [`AgentManager`] keep per-atom side
//! data keyed by global index in sync with those events.

pub mod agents;
pub mod container;
pub mod geometry;
pub mod particle;
pub mod reservoir;

pub use agents::{AgentError, AgentManager, AgentSource, AgentTable, Agents};
pub use container::{
    BoxConfig, BoxError, BoxEvent, BoxListener, BoxView, ListenerError, ListenerId,
    ParticleStore, SharedListener, SimBox,
};
pub use geometry::{Boundary, DIM, GeometryError, PeriodicBox, Vector};
pub use particle::{Atom, AtomSpec, GroupId, MoleculeId, ParticleRef, ParticleSpec};
pub use reservoir::IndexReservoir;
