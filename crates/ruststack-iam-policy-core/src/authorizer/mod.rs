//! Policy authorization.
//!
//! An authorizer evaluates previously validated policy documents against one
//! request and produces a [`Decision`]. Statements and documents are folded
//! with [`Decision::combine`]: an explicit `Deny` anywhere wins, otherwise any
//! matching `Allow` wins, otherwise the result is `NoOpinion`. Evaluation
//! stops at the first `Deny`.
//!
//! A statement matches when its principal (bucket policies only), resource,
//! action and every condition match the request.

mod bucket;
mod iam;

use async_trait::async_trait;
use ruststack_iam_policy_model::{AuthorizationRequestor, Decision, PolicyDocument, RequestContext};
use tracing::warn;

pub use bucket::BucketPolicyAuthorizer;
pub use iam::IamPolicyAuthorizer;

use crate::arn::{ArnParser, GenericArnParser, StorageArnParser, extract_resource_name};
use crate::catalog::Catalogs;
use crate::error::AuthorizationError;

/// Decides whether a request is permitted by a set of policy documents.
#[async_trait]
pub trait PolicyAuthorizer: Send + Sync {
    /// Evaluate `policy_documents` for `requestor` issuing the request in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::Indeterminate`] when the directory fails,
    /// [`AuthorizationError::MalformedStoredPolicy`] when a stored document no
    /// longer parses, and [`AuthorizationError::MethodNotAllowed`] when a
    /// foreign account is allowed to manage a bucket policy.
    async fn authorize(
        &self,
        requestor: &AuthorizationRequestor,
        ctx: &RequestContext,
        policy_documents: &[String],
    ) -> Result<Decision, AuthorizationError>;

    /// Evaluate the policy documents attached to `requestor`.
    ///
    /// # Errors
    ///
    /// Fails the same way as [`PolicyAuthorizer::authorize`].
    async fn authorize_attached(
        &self,
        requestor: &AuthorizationRequestor,
        ctx: &RequestContext,
    ) -> Result<Decision, AuthorizationError> {
        self.authorize(requestor, ctx, &requestor.policy_documents)
            .await
    }
}

pub(crate) fn parse_stored_policy(json: &str) -> Result<PolicyDocument, AuthorizationError> {
    PolicyDocument::from_json(json).map_err(AuthorizationError::MalformedStoredPolicy)
}

/// Whether any statement resource covers `requested` (`bucket[/key]`).
///
/// Only storage ARNs and `*` cover storage paths. Resources that are not
/// ARNs at all are logged and skipped.
pub(crate) fn resource_matches(resources: &[String], requested: &str) -> bool {
    resources.iter().any(|arn| {
        if arn == "*" {
            return true;
        }
        if !StorageArnParser.is_valid(arn) {
            if !GenericArnParser.is_valid(arn) {
                warn!(%arn, "skipping invalid resource in stored policy");
            }
            return false;
        }
        crate::pattern::matches(requested, extract_resource_name(arn))
    })
}

/// Whether any action pattern expands to the canonical `action`.
pub(crate) fn action_matches(catalogs: &Catalogs, patterns: &[String], action: &str) -> bool {
    patterns.iter().any(|pattern| {
        catalogs
            .all_matching_actions(pattern)
            .iter()
            .any(|a| a.eq_ignore_ascii_case(action))
    })
}
