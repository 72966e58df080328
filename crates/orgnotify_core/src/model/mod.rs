//! Domain model for organizations and pending notification records.
//!
//! # Invariants
//! - Organizations are identified by opaque, non-empty string keys.
//! - Parent/child links form a directed graph that is not guaranteed to be
//!   acyclic; consumers must traverse it with a visited set.

pub mod notification;
pub mod organization;
