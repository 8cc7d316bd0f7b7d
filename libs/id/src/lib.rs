//! # dockyard-id
//!
//! Identifiers for the dockyard deployment tool.
//!
//! ## Container identifiers
//!
//! A container [`Identifier`] names one instance on a host. It is either
//! derived deterministically from a deployment (`{prefix}{name}-{n}`, e.g.
//! `web-1`) or generated at random when a deployment asks for randomized ids.
//! Valid identifiers are 4 to 24 characters drawn from `[a-zA-Z0-9.-]`.
//!
//! Identifiers read back from a persisted deployment are taken as-is; call
//! [`Identifier::validate`] to enforce the format.
//!
//! ## Typed IDs
//!
//! Request-scoped IDs use a prefixed ULID format: `{prefix}_{ulid}`, e.g.
//! `req_01HV4Z2WQXKJNM8GPQY6VBKC3D`.

mod error;
mod identifier;
mod macros;
mod types;

pub use error::IdError;
pub use identifier::*;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
