//! Domain model for key custody and room attendance.
//!
//! # Responsibility
//! - Define the directory entities the ledgers resolve (buildings, rooms,
//!   students, instructors, keys).
//! - Define the key custody state machine and the immutable ledger facts.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID that is never reused.
//! - Ledger facts are write-once; descriptive fields are snapshots taken at
//!   admission time.

pub mod directory;
pub mod fact;
pub mod key;
pub mod schedule;
