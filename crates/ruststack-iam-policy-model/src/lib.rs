//! Model types for the RustStack IAM policy engine.
//!
//! This crate holds the data the policy engine operates on, independent of how
//! it is evaluated:
//!
//! - [`policy`] - policy documents, statements, principals and condition blocks
//!   parsed from the IAM/S3 JSON policy grammar
//! - [`request`] - the read-only request context and the authenticated requestor
//! - [`decision`] - the authorization outcome
//! - [`error`] - policy rejection codes surfaced to API callers

pub mod decision;
pub mod error;
pub mod policy;
pub mod request;

pub use decision::Decision;
pub use error::{PolicyError, PolicyErrorCode};
pub use policy::{ConditionEntry, Effect, PolicyDocument, Principal, PrincipalProvider, Statement};
pub use request::{AccountIdentity, AuthorizationRequestor, RequestContext, UserIdentity};
