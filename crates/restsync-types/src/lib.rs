//! Shared model types for the restsync extraction engine.
//!
//! Pure data types with no I/O so that the state, engine, and CLI crates
//! can share them without circular dependencies.

pub mod cursor;
pub mod error;
pub mod page;
pub mod resource;
pub mod state;
