//! Institutional email decoding into academic identities.
//!
//! # Responsibility
//! - Describe the local-part layout as data (`grammar`).
//! - Hold the program/branch code directories (`tables`).
//! - Validate and decode emails into `AcademicIdentity` (`parser`).
//!
//! # Invariants
//! - Parsing is pure apart from reading the current calendar year.
//! - Unknown program/branch codes degrade to defaults; they never fail.
//! - Malformed input yields `IdentityParseError::InvalidFormat`, never a panic.

pub mod grammar;
pub mod parser;
pub mod tables;

pub use parser::{
    parse_student_email, IdentityParseError, IdentityParser, InvalidFormatReason,
};
