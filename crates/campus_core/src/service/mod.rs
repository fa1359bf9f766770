//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep CLI/outer layers decoupled from storage details.

pub mod cohort_assigner;
pub mod enrollment_service;
pub mod group_service;
