//! Policy document validation.
//!
//! A validator runs before a policy is persisted and rejects it with a
//! [`PolicyError`] carrying the first rule it breaks. There is one variant per
//! policy class:
//!
//! - [`BucketPolicyValidator`] for resource (bucket) policies
//! - [`IamPolicyValidator`] for identity (IAM) policies
//!
//! Both are read-only: the only side effects are directory lookups that check
//! principals exist.

mod bucket;
mod iam;

use async_trait::async_trait;
use ruststack_iam_policy_model::{ConditionEntry, PolicyError, Principal, PrincipalProvider};
use tracing::{debug, error};

pub use bucket::BucketPolicyValidator;
pub use iam::IamPolicyValidator;

use crate::arn::{ArnParser, PrincipalArnParser, extract_account, split_storage_resource};
use crate::catalog::{ActionScope, ActionTaxonomy, ConditionCatalog};
use crate::directory::Directory;

/// Validates a policy document before it is stored.
#[async_trait]
pub trait PolicyValidator: Send + Sync {
    /// Validate `policy_json` for attachment to `target_resource` (a bucket
    /// name for bucket policies, a policy name for identity policies).
    ///
    /// # Errors
    ///
    /// Returns `MalformedPolicy` or `LimitExceeded` with the reason of the
    /// first failing rule.
    async fn validate(&self, target_resource: &str, policy_json: &str) -> Result<(), PolicyError>;
}

/// Log and build a `MalformedPolicy` rejection.
pub(crate) fn reject(message: impl Into<String>) -> PolicyError {
    let err = PolicyError::malformed_policy(message);
    debug!(reason = %err.message, "policy rejected");
    err
}

/// Whether a statement's actions apply to a storage resource: a bucket-scoped
/// action needs a bare bucket, an object-scoped action needs an object part.
pub(crate) fn actions_apply_to(taxonomy: &ActionTaxonomy, actions: &[&str], resource: &str) -> bool {
    let (_, object) = split_storage_resource(resource);
    actions
        .iter()
        .any(|action| match taxonomy.scope_of(action) {
            ActionScope::Bucket => object.is_none(),
            ActionScope::Object => object.is_some(),
            ActionScope::Unknown => false,
        })
}

/// Check every condition's type, key and values against the catalog.
pub(crate) fn validate_conditions(
    catalog: &ConditionCatalog,
    conditions: &[ConditionEntry],
) -> Result<(), PolicyError> {
    for condition in conditions {
        if !catalog.is_type_valid(&condition.condition_type) {
            return Err(reject(format!(
                "Invalid Condition type : {}",
                condition.condition_type
            )));
        }
        if !catalog.is_key_valid(&condition.key) {
            return Err(reject(format!("Invalid Condition key : {}", condition.key)));
        }
        if !catalog.is_value_valid(&condition.condition_type, &condition.values) {
            let bad = condition
                .values
                .iter()
                .find(|v| {
                    !catalog.is_value_valid(&condition.condition_type, std::slice::from_ref(*v))
                })
                .map_or("", String::as_str);
            return Err(reject(format!("Invalid Condition value : {bad}")));
        }
    }
    Ok(())
}

/// Check that a statement names principals and that each one exists.
pub(crate) async fn validate_principals(
    directory: &dyn Directory,
    principals: &[Principal],
) -> Result<(), PolicyError> {
    if principals.is_empty() {
        return Err(reject("Missing required field Principal"));
    }
    for principal in principals {
        match principal.provider {
            PrincipalProvider::Other(_) => return Err(reject("Invalid bucket policy syntax")),
            // Federated identities are not supported.
            PrincipalProvider::Federated => return Err(reject("Invalid principal in policy")),
            _ => {}
        }
        if !principal.is_wildcard() && !principal_exists(directory, principal).await {
            return Err(reject("Invalid principal in policy"));
        }
    }
    Ok(())
}

/// Resolve a principal against the directory. A failed lookup counts as
/// "does not exist".
async fn principal_exists(directory: &dyn Directory, principal: &Principal) -> bool {
    let id = principal.id.as_str();
    let found = match principal.provider {
        PrincipalProvider::Aws if PrincipalArnParser.is_valid(id) => {
            if id.ends_with(":root") {
                directory
                    .find_account_by_id(extract_account(id))
                    .await
                    .map(|a| a.is_some())
            } else {
                directory.find_user_by_arn(id).await.map(|u| u.is_some())
            }
        }
        PrincipalProvider::Aws => match directory.find_account_by_id(id).await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => directory.find_user_by_id(id).await.map(|u| u.is_some()),
            Err(e) => Err(e),
        },
        PrincipalProvider::CanonicalUser => directory
            .find_account_by_canonical_id(id)
            .await
            .map(|a| a.is_some()),
        PrincipalProvider::Federated | PrincipalProvider::Any | PrincipalProvider::Other(_) => {
            Ok(false)
        }
    };

    found.unwrap_or_else(|e| {
        error!(principal = %id, error = %e, "failed to resolve principal");
        false
    })
}
