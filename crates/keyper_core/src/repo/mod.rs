//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define the lookup and commit capabilities the ledgers consume.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repositories borrow an explicit connection; there is no process-wide
//!   database handle.
//! - Constraint violations surface as semantic errors (`UniqueViolation`,
//!   `ForeignKeyViolation`) distinct from transport failures.
//! - Ledger commits run inside one `IMMEDIATE` transaction each.

pub mod directory_repo;
mod error;
pub mod ledger_repo;
pub mod schedule_repo;
mod support;

pub use error::{RepoError, RepoResult};
