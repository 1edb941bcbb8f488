//! Policy engine entry point.
//!
//! [`PolicyEngine`] owns the catalogs and the directory handle and hands out
//! validators and authorizers that share them. Catalogs are loaded once at
//! construction and never change afterwards, so every component built from
//! one engine sees the same data.

use std::sync::Arc;

use crate::authorizer::{BucketPolicyAuthorizer, IamPolicyAuthorizer};
use crate::catalog::Catalogs;
use crate::config::PolicyConfig;
use crate::directory::Directory;
use crate::error::CatalogError;
use crate::validation::{BucketPolicyValidator, IamPolicyValidator};

/// Shared state of the policy engine.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use ruststack_iam_policy_core::config::PolicyConfig;
/// use ruststack_iam_policy_core::directory::InMemoryDirectory;
/// use ruststack_iam_policy_core::provider::PolicyEngine;
///
/// let engine = PolicyEngine::from_config(PolicyConfig::default(), Arc::new(InMemoryDirectory::new()))
///     .expect("bundled catalogs load");
/// assert!(!engine.catalogs().s3().is_empty());
/// ```
#[derive(Clone)]
pub struct PolicyEngine {
    catalogs: Arc<Catalogs>,
    directory: Arc<dyn Directory>,
    config: Arc<PolicyConfig>,
}

impl PolicyEngine {
    /// Create an engine from already loaded catalogs.
    #[must_use]
    pub fn new(catalogs: Catalogs, directory: Arc<dyn Directory>, config: PolicyConfig) -> Self {
        Self {
            catalogs: Arc::new(catalogs),
            directory,
            config: Arc::new(config),
        }
    }

    /// Load the catalogs selected by `config` and create an engine.
    ///
    /// # Errors
    ///
    /// Fails when a configured catalog file cannot be read or parsed.
    pub fn from_config(
        config: PolicyConfig,
        directory: Arc<dyn Directory>,
    ) -> Result<Self, CatalogError> {
        let catalogs = Catalogs::load(&config)?;
        Ok(Self::new(catalogs, directory, config))
    }

    /// Validator for bucket policies.
    #[must_use]
    pub fn bucket_validator(&self) -> BucketPolicyValidator {
        BucketPolicyValidator::new(Arc::clone(&self.catalogs), Arc::clone(&self.directory))
    }

    /// Validator for identity policies, bounded by the configured size limit.
    #[must_use]
    pub fn iam_validator(&self) -> IamPolicyValidator {
        IamPolicyValidator::new(
            Arc::clone(&self.catalogs),
            Arc::clone(&self.directory),
            self.config.max_iam_policy_size,
        )
    }

    /// Authorizer for bucket policies.
    #[must_use]
    pub fn bucket_authorizer(&self) -> BucketPolicyAuthorizer {
        BucketPolicyAuthorizer::new(Arc::clone(&self.catalogs), Arc::clone(&self.directory))
    }

    /// Authorizer for identity policies.
    #[must_use]
    pub fn iam_authorizer(&self) -> IamPolicyAuthorizer {
        IamPolicyAuthorizer::new(Arc::clone(&self.catalogs))
    }

    /// Returns the loaded catalogs.
    #[must_use]
    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    /// Returns the directory handle.
    #[must_use]
    pub fn directory(&self) -> &dyn Directory {
        self.directory.as_ref()
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("s3_actions", &self.catalogs.s3().len())
            .field("iam_actions", &self.catalogs.iam().len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
