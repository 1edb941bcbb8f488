//! Identity (IAM) policy authorization.

use std::sync::Arc;

use async_trait::async_trait;
use ruststack_iam_policy_model::{AuthorizationRequestor, Decision, RequestContext, Statement};
use tracing::{debug, error};

use super::{PolicyAuthorizer, action_matches, parse_stored_policy, resource_matches};
use crate::arn::{ArnParser, IdentityArnParser};
use crate::catalog::Catalogs;
use crate::condition;
use crate::error::AuthorizationError;
use crate::operation::identify_iam_action;
use crate::pattern;

/// Parameter naming the user an identity API call targets.
pub const USER_NAME_PARAM: &str = "UserName";

/// Parameter naming the managed policy an identity API call targets.
pub const POLICY_ARN_PARAM: &str = "PolicyArn";

/// Authorizes identity-service and storage requests against the identity
/// policies attached to the requestor.
///
/// Identity policies have no principal: they always speak for the requestor
/// they are attached to. Besides the storage resource path, a statement's
/// resources may name the targeted user (`UserName` parameter), the requestor
/// itself, or the targeted managed policy (`PolicyArn` parameter). Those only
/// apply to identity actions; storage actions need a storage resource.
#[derive(Debug)]
pub struct IamPolicyAuthorizer {
    catalogs: Arc<Catalogs>,
}

impl IamPolicyAuthorizer {
    /// Create an authorizer over shared catalogs.
    #[must_use]
    pub fn new(catalogs: Arc<Catalogs>) -> Self {
        Self { catalogs }
    }

    fn evaluate_document(
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
            if self.statement_applies(statement, requestor, ctx, action, requested) {
                debug!(sid = ?statement.sid, effect = %statement.effect, "statement applies");
                decision = decision.combine(statement.effect.into());
                if decision == Decision::Deny {
                    break;
                }
            }
        }
        Ok(decision)
    }

    fn statement_applies(
        &self,
        statement: &Statement,
        requestor: &AuthorizationRequestor,
        ctx: &RequestContext,
        action: &str,
        requested: &str,
    ) -> bool {
        let identity_action = self.catalogs.iam().canonical_name(action).is_some();
        (resource_matches(&statement.resources, requested)
            || (identity_action && identity_resource_matches(&statement.resources, requestor, ctx)))
            && action_matches(&self.catalogs, &statement.actions, action)
            && condition::all_satisfied(&statement.conditions, ctx)
    }
}

/// Whether a resource names the targeted user, the requestor itself, or the
/// targeted managed policy. A targeted user always lives in the requestor's
/// account.
fn identity_resource_matches(
    resources: &[String],
    requestor: &AuthorizationRequestor,
    ctx: &RequestContext,
) -> bool {
    let user_name = ctx.parameter(USER_NAME_PARAM);
    let policy_arn = ctx.parameter(POLICY_ARN_PARAM);
    resources.iter().any(|arn| {
        if arn == "*" {
            return true;
        }
        if !IdentityArnParser.is_valid(arn) {
            return false;
        }
        let user_matches = match &user_name {
            Some(name) => [&requestor.account.id, &requestor.account.name]
                .iter()
                .any(|account| {
                    pattern::matches(&format!("arn:aws:iam::{account}:user/{name}"), arn)
                }),
            None => pattern::matches(&requestor.user.arn, arn),
        };
        user_matches
            || policy_arn
                .as_deref()
                .is_some_and(|policy| pattern::matches(policy, arn))
    })
}

#[async_trait]
impl PolicyAuthorizer for IamPolicyAuthorizer {
    async fn authorize(
        &self,
        requestor: &AuthorizationRequestor,
        ctx: &RequestContext,
        policy_documents: &[String],
    ) -> Result<Decision, AuthorizationError> {
        let Some(action) = identify_iam_action(ctx, &self.catalogs) else {
            debug!(method = %ctx.method(), uri = %ctx.absolute_uri(), "no canonical action for request");
            return Ok(Decision::NoOpinion);
        };
        let requested = ctx.requested_resource();

        let mut decision = Decision::NoOpinion;
        for document in policy_documents {
            let outcome = self
                .evaluate_document(document, requestor, ctx, action, &requested)
                .inspect_err(|e| error!(error = %e, %action, "identity policy evaluation failed"))?;
            decision = decision.combine(outcome);
            if decision == Decision::Deny {
                break;
            }
        }
        debug!(%action, user = %requestor.user.name, %decision, "identity policy decision");
        Ok(decision)
    }
}
