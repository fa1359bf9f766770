//! Domain model for academic identities, cohort groups and memberships.
//!
//! # Responsibility
//! - Define the value objects produced by identity parsing.
//! - Define persisted group/membership/student records.
//!
//! # Invariants
//! - Cohort levels form a strict containment chain:
//!   branch ⊇ class ⊇ year ⊇ section.
//! - A cohort key fully determines which tuple fields are set.

pub mod cohort;
pub mod identity;
pub mod student;
