//! Bucket (resource) policy validation.

use std::sync::Arc;

use async_trait::async_trait;
use ruststack_iam_policy_model::{PolicyDocument, PolicyError, Statement};
use serde_json::{Map, Value};
use tracing::debug;

use super::{PolicyValidator, actions_apply_to, reject, validate_conditions, validate_principals};
use crate::arn::{ArnParser, StorageArnParser, extract_resource_name, split_storage_resource};
use crate::catalog::Catalogs;
use crate::directory::Directory;

/// Keys allowed at the top level of a bucket policy.
const POLICY_ELEMENTS: [&str; 3] = ["Version", "Id", "Statement"];

/// Keys allowed inside a statement.
const STATEMENT_ELEMENTS: [&str; 6] = ["Sid", "Effect", "Principal", "Action", "Resource", "Condition"];

const SYNTAX_ERROR: &str = "Invalid bucket policy syntax.";

/// Validates bucket policies.
///
/// Checks, in order: JSON syntax, the element whitelist and `Effect`/string
/// `Principal` shape, presence of statements, and per statement the actions
/// and resources, the conditions, then the principals.
pub struct BucketPolicyValidator {
    catalogs: Arc<Catalogs>,
    directory: Arc<dyn Directory>,
}

impl BucketPolicyValidator {
    /// Create a validator over shared catalogs and a directory.
    #[must_use]
    pub fn new(catalogs: Arc<Catalogs>, directory: Arc<dyn Directory>) -> Self {
        Self {
            catalogs,
            directory,
        }
    }

    fn validate_action_and_resource(
        &self,
        statement: &Statement,
        bucket: &str,
    ) -> Result<(), PolicyError> {
        if statement.actions.is_empty() {
            return Err(reject("Missing required field Action"));
        }
        for action in &statement.actions {
            if action.is_empty() {
                return Err(reject("Missing required field Action cannot be empty!"));
            }
            let matching = self.catalogs.s3().all_matching_actions(action);
            if matching.is_empty() {
                return Err(reject("Policy has invalid action"));
            }
            self.validate_resources(&statement.resources, bucket, &matching)?;
        }
        Ok(())
    }

    /// Every resource must be a storage ARN on `bucket`, and at least one
    /// must fit the scope of one of the matched actions.
    fn validate_resources(
        &self,
        resources: &[String],
        bucket: &str,
        actions: &[&str],
    ) -> Result<(), PolicyError> {
        if resources.is_empty() {
            return Err(reject("Missing required field Resource"));
        }
        for arn in resources {
            if !StorageArnParser.is_valid(arn) {
                return Err(reject("Policy has invalid resource"));
            }
            let (resource_bucket, _) = split_storage_resource(extract_resource_name(arn));
            if resource_bucket != bucket {
                debug!(%arn, %bucket, "resource names another bucket");
                return Err(reject("Policy has invalid resource"));
            }
        }
        let in_scope = resources
            .iter()
            .any(|arn| actions_apply_to(self.catalogs.s3(), actions, extract_resource_name(arn)));
        if in_scope {
            Ok(())
        } else {
            Err(reject("Action does not apply to any resource(s) in statement"))
        }
    }
}

impl std::fmt::Debug for BucketPolicyValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketPolicyValidator").finish_non_exhaustive()
    }
}

#[async_trait]
impl PolicyValidator for BucketPolicyValidator {
    async fn validate(&self, bucket: &str, policy_json: &str) -> Result<(), PolicyError> {
        let value: Value = serde_json::from_str(policy_json)
            .map_err(|e| reject(format!("This policy contains invalid Json - {e}")))?;
        let Value::Object(root) = &value else {
            return Err(reject(
                "This policy contains invalid Json - expected a JSON object",
            ));
        };
        check_policy_elements(root)?;

        let document = PolicyDocument::from_value(value).map_err(|e| {
            debug!(error = %e, "bucket policy does not fit the policy grammar");
            reject(SYNTAX_ERROR)
        })?;
        if document.statements.is_empty() {
            return Err(reject("Missing required field Statement"));
        }

        for statement in &document.statements {
            self.validate_action_and_resource(statement, bucket)?;
            validate_conditions(self.catalogs.conditions(), &statement.conditions)?;
            validate_principals(self.directory.as_ref(), &statement.principals).await?;
        }
        debug!(%bucket, statements = document.statements.len(), "bucket policy is valid");
        Ok(())
    }
}

/// Whitelist the document's elements and check what typed parsing would
/// otherwise paper over: `Effect` presence and value, and string principals.
fn check_policy_elements(root: &Map<String, Value>) -> Result<(), PolicyError> {
    for (key, value) in root {
        if !POLICY_ELEMENTS.contains(&key.as_str()) && !STATEMENT_ELEMENTS.contains(&key.as_str()) {
            return Err(reject(format!("Unknown field {key}")));
        }
        match (key.as_str(), value) {
            ("Statement", Value::Array(statements)) => {
                for statement in statements {
                    check_statement_elements(statement)?;
                }
            }
            ("Statement", statement @ Value::Object(_)) => check_statement_elements(statement)?,
            ("Version" | "Id", Value::String(_)) => {}
            _ => return Err(reject(SYNTAX_ERROR)),
        }
    }
    Ok(())
}

fn check_statement_elements(statement: &Value) -> Result<(), PolicyError> {
    let Value::Object(statement) = statement else {
        return Err(reject(SYNTAX_ERROR));
    };

    for (key, value) in statement {
        if !POLICY_ELEMENTS.contains(&key.as_str()) && !STATEMENT_ELEMENTS.contains(&key.as_str()) {
            return Err(reject(format!("Unknown field {key}")));
        }
        if !STATEMENT_ELEMENTS.contains(&key.as_str()) {
            return Err(reject(SYNTAX_ERROR));
        }
        match (key.as_str(), value) {
            ("Effect", Value::String(effect)) if effect.is_empty() => {
                return Err(reject("Missing required field Effect cannot be empty!"));
            }
            ("Effect", Value::String(effect)) if effect != "Allow" && effect != "Deny" => {
                return Err(reject(format!("Invalid effect : {effect}")));
            }
            ("Effect", Value::String(_)) => {}
            ("Effect", other) => return Err(reject(format!("Invalid effect : {other}"))),
            ("Principal", Value::String(principal)) if principal.is_empty() => {
                return Err(reject("Missing required field Principal cannot be empty!"));
            }
            ("Principal", Value::String(principal)) if principal != "*" => {
                return Err(reject("Invalid policy syntax."));
            }
            _ => {}
        }
    }

    if !statement.contains_key("Effect") {
        return Err(reject("Missing required field Effect"));
    }
    Ok(())
}
