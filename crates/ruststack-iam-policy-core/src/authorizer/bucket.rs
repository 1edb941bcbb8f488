//! Bucket (resource) policy authorization.

use std::sync::Arc;

use async_trait::async_trait;
use ruststack_iam_policy_model::{
    AuthorizationRequestor, Decision, Principal, PrincipalProvider, RequestContext, Statement,
};
use tracing::{debug, error};

use super::{PolicyAuthorizer, action_matches, parse_stored_policy, resource_matches};
use crate::arn::{ArnParser, PrincipalArnParser, extract_account};
use crate::catalog::Catalogs;
use crate::condition;
use crate::directory::Directory;
use crate::error::{AuthorizationError, DirectoryError};
use crate::operation::{identify_s3_action, is_policy_management};

/// Authorizes storage requests against bucket policies.
///
/// Bucket-policy management (`s3:PutBucketPolicy`, `s3:GetBucketPolicy`,
/// `s3:DeleteBucketPolicy`) gets two extra rules after the statements are
/// folded: an `Allow` only stands for the bucket owner's account, and when no
/// statement applied the owning account's root user is allowed.
pub struct BucketPolicyAuthorizer {
    catalogs: Arc<Catalogs>,
    directory: Arc<dyn Directory>,
}

impl BucketPolicyAuthorizer {
    /// Create an authorizer over shared catalogs and a directory.
    #[must_use]
    pub fn new(catalogs: Arc<Catalogs>, directory: Arc<dyn Directory>) -> Self {
        Self {
            catalogs,
            directory,
        }
    }

    async fn evaluate_document(
        &self,
        document: &str,
        requestor: &AuthorizationRequestor,
        ctx: &RequestContext,
        action: &str,
        requested: &str,
    ) -> Result<Decision, AuthorizationError> {
        let policy = parse_stored_policy(document)?;
        let mut decision = Decision::NoOpinion;
        for statement in &policy.statements {
            if self.statement_applies(statement, requestor, ctx, action, requested).await? {
                debug!(sid = ?statement.sid, effect = %statement.effect, "statement applies");
                decision = decision.combine(statement.effect.into());
                if decision == Decision::Deny {
                    break;
                }
            }
        }
        Ok(decision)
    }

    async fn statement_applies(
        &self,
        statement: &Statement,
        requestor: &AuthorizationRequestor,
        ctx: &RequestContext,
        action: &str,
        requested: &str,
    ) -> Result<bool, DirectoryError> {
        Ok(self.principal_matches(&statement.principals, requestor).await?
            && resource_matches(&statement.resources, requested)
            && action_matches(&self.catalogs, &statement.actions, action)
            && condition::all_satisfied(&statement.conditions, ctx))
    }

    async fn principal_matches(
        &self,
        principals: &[Principal],
        requestor: &AuthorizationRequestor,
    ) -> Result<bool, DirectoryError> {
        for principal in principals {
            if principal.is_wildcard() {
                return Ok(true);
            }
            let id = principal.id.as_str();
            let matched = match principal.provider {
                PrincipalProvider::Aws if PrincipalArnParser.is_valid(id) => {
                    if id.ends_with(":root") {
                        extract_account(id) == requestor.account.id
                    } else {
                        self.directory.find_user_by_arn(id).await?.is_some_and(|user| {
                            user.account_name == requestor.account.name
                                && user.id == requestor.user.id
                        })
                    }
                }
                PrincipalProvider::Aws => id == requestor.account.id,
                PrincipalProvider::CanonicalUser => id == requestor.account.canonical_id,
                PrincipalProvider::Federated | PrincipalProvider::Any | PrincipalProvider::Other(_) => {
                    false
                }
            };
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Apply the owner rules for bucket-policy management.
    async fn guard_policy_management(
        &self,
        requestor: &AuthorizationRequestor,
        ctx: &RequestContext,
        decision: Decision,
    ) -> Result<Decision, AuthorizationError> {
        match decision {
            Decision::Allow => {
                let owner = match ctx.resource_owner() {
                    Some(canonical_id) => {
                        self.directory
                            .find_account_by_canonical_id(canonical_id)
                            .await?
                    }
                    None => None,
                };
                match owner {
                    Some(owner) if owner.name == requestor.account.name => Ok(Decision::Allow),
                    _ => {
                        debug!(
                            account = %requestor.account.name,
                            "policy management allowed for a foreign account"
                        );
                        Err(AuthorizationError::MethodNotAllowed)
                    }
                }
            }
            Decision::Deny => Ok(Decision::Deny),
            Decision::NoOpinion => {
                let is_root = self
                    .directory
                    .find_user_by_id(&requestor.user.id)
                    .await?
                    .is_some_and(|user| user.is_root());
                let owns_bucket =
                    ctx.resource_owner() == Some(requestor.account.canonical_id.as_str());
                if is_root && owns_bucket {
                    debug!(account = %requestor.account.name, "bucket owner manages its policy");
                    Ok(Decision::Allow)
                } else {
                    Ok(Decision::Deny)
                }
            }
        }
    }
}

impl std::fmt::Debug for BucketPolicyAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketPolicyAuthorizer").finish_non_exhaustive()
    }
}

#[async_trait]
impl PolicyAuthorizer for BucketPolicyAuthorizer {
    async fn authorize(
        &self,
        requestor: &AuthorizationRequestor,
        ctx: &RequestContext,
        policy_documents: &[String],
    ) -> Result<Decision, AuthorizationError> {
        let Some(action) = identify_s3_action(ctx, self.catalogs.s3()) else {
            debug!(method = %ctx.method(), uri = %ctx.absolute_uri(), "no canonical action for request");
            return Ok(Decision::NoOpinion);
        };
        let requested = ctx.requested_resource();

        let mut decision = Decision::NoOpinion;
        for document in policy_documents {
            let outcome = self
                .evaluate_document(document, requestor, ctx, action, &requested)
                .await
                .inspect_err(|e| error!(error = %e, %action, "bucket policy evaluation failed"))?;
            decision = decision.combine(outcome);
            if decision == Decision::Deny {
                break;
            }
        }

        if is_policy_management(action) {
            decision = self.guard_policy_management(requestor, ctx, decision).await?;
        }
        debug!(%action, resource = %requested, %decision, "bucket policy decision");
        Ok(decision)
    }
}
