//! Core use-case services.
//!
//! # Responsibility
//! - Admit borrow/return and check-in events into the ledgers.
//! - Administer the directory and the schedule catalog.
//! - Keep callers decoupled from storage details.

pub mod admission;
pub mod attendance_ledger;
pub mod directory_service;
pub mod record_ledger;
pub mod schedule_service;
