//! `catequesis-core`: shared primitives for the catechesis client.
//!
//! This crate contains **pure** value types (no IO, no async).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{ParishId, UserId};
