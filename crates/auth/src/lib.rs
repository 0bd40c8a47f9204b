//! `catequesis-auth`: pure authorization boundary for the catechesis client.
//!
//! Roles, permission keys, the static permission matrix and the evaluator that
//! answers capability queries. This crate is intentionally decoupled from HTTP
//! and storage.

pub mod evaluator;
pub mod identity;
pub mod matrix;
pub mod permissions;
pub mod roles;

pub use evaluator::{AuthzError, DecisionReason, PermissionDecision, PermissionEvaluator};
pub use identity::{Identity, IdentityUpdate, ParishAffiliation};
pub use matrix::{PermissionMatrix, RoleDefinition};
pub use permissions::Permission;
pub use roles::Role;
