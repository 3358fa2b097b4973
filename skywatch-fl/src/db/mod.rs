//! Database access layer for skywatch-fl
//!
//! Store primitives over the shared catalog and per-user ordering rows.
//! Functions that belong to a mutating sequence take the caller's open
//! transaction; standalone reads take a pool.

pub mod favorites;
pub mod locations;
