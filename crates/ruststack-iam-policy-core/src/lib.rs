//! IAM and bucket policy engine for RustStack.
//!
//! Validates policy documents before they are stored and evaluates stored
//! documents against incoming requests. The engine is stateless apart from
//! catalogs loaded once at startup; accounts and users are looked up through
//! the [`directory::Directory`] collaborator.
//!
//! # Architecture
//!
//! ```text
//!            PolicyEngine (catalogs + directory + config)
//!             |                         |
//!             v                         v
//!   PolicyValidator               PolicyAuthorizer
//!   (bucket | iam)                (bucket | iam)
//!             |                         |
//!             +-----------+-------------+
//!                         v
//!     arn / pattern / catalog / condition / operation
//! ```

pub mod arn;
pub mod authorizer;
pub mod catalog;
pub mod condition;
pub mod config;
pub mod directory;
pub mod error;
pub mod operation;
pub mod pattern;
pub mod provider;
pub mod validation;

pub use authorizer::{BucketPolicyAuthorizer, IamPolicyAuthorizer, PolicyAuthorizer};
pub use catalog::Catalogs;
pub use config::PolicyConfig;
pub use directory::{Directory, InMemoryDirectory};
pub use error::{AuthorizationError, CatalogError, DirectoryError};
pub use provider::PolicyEngine;
pub use validation::{BucketPolicyValidator, IamPolicyValidator, PolicyValidator};
