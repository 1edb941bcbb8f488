//! Identity (IAM) policy validation.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ruststack_iam_policy_model::{PolicyDocument, PolicyError};
use serde_json::{Map, Value};
use tracing::debug;

use super::{PolicyValidator, actions_apply_to, reject, validate_principals};
use crate::arn::{ArnParser, GenericArnParser, StorageArnParser, extract_resource_name};
use crate::catalog::Catalogs;
use crate::directory::Directory;

const POLICY_ELEMENTS: [&str; 2] = ["Version", "Statement"];
const STATEMENT_ELEMENTS: [&str; 5] = ["Sid", "Effect", "Action", "Resource", "Principal"];
const REQUIRED_STATEMENT_ELEMENTS: [&str; 3] = ["Effect", "Action", "Resource"];

/// Policy language versions accepted in `Version`.
pub const SUPPORTED_VERSIONS: [&str; 2] = ["2012-10-17", "2008-10-17"];

const SYNTAX_ERROR: &str = "Syntax errors in policy.";

/// Validates identity policies.
///
/// The size limit is measured on the compact JSON re-serialization of the
/// document, so whitespace in the submitted text does not count.
pub struct IamPolicyValidator {
    catalogs: Arc<Catalogs>,
    directory: Arc<dyn Directory>,
    max_policy_size: usize,
}

impl IamPolicyValidator {
    /// Create a validator with the given size limit in bytes.
    #[must_use]
    pub fn new(catalogs: Arc<Catalogs>, directory: Arc<dyn Directory>, max_policy_size: usize) -> Self {
        Self {
            catalogs,
            directory,
            max_policy_size,
        }
    }

    fn validate_statement(
        &self,
        statement: &Value,
        sids: &mut HashSet<String>,
    ) -> Result<(), PolicyError> {
        let Value::Object(statement) = statement else {
            return Err(reject(SYNTAX_ERROR));
        };
        if REQUIRED_STATEMENT_ELEMENTS
            .iter()
            .any(|k| !statement.contains_key(*k))
        {
            return Err(reject(SYNTAX_ERROR));
        }
        check_unknown_elements(statement, &STATEMENT_ELEMENTS)?;

        if let Some(sid) = statement.get("Sid") {
            let Value::String(sid) = sid else {
                return Err(reject(SYNTAX_ERROR));
            };
            if !sids.insert(sid.clone()) {
                return Err(reject(
                    "Statement IDs (SID) in a single policy must be unique.",
                ));
            }
        }

        match statement.get("Effect") {
            Some(Value::String(effect)) if effect == "Allow" || effect == "Deny" => {}
            Some(Value::String(effect)) => return Err(reject(format!("Invalid effect : {effect}"))),
            _ => return Err(reject(SYNTAX_ERROR)),
        }

        let actions = string_list(statement.get("Action")).ok_or_else(|| reject(SYNTAX_ERROR))?;
        let mut matching = Vec::new();
        for action in &actions {
            if action.is_empty() {
                return Err(reject("Missing required field Action cannot be empty!"));
            }
            let found = self.catalogs.all_matching_actions(action);
            if found.is_empty() {
                return Err(reject("Policy has invalid action"));
            }
            matching.extend(found);
        }

        let resources =
            string_list(statement.get("Resource")).ok_or_else(|| reject(SYNTAX_ERROR))?;
        if resources.is_empty() {
            return Err(reject(SYNTAX_ERROR));
        }
        if resources
            .iter()
            .any(|r| *r != "*" && !GenericArnParser.is_valid(r))
        {
            return Err(reject("Policy has invalid resource"));
        }
        if resources.iter().all(|r| StorageArnParser.is_valid(r))
            && !resources
                .iter()
                .any(|r| actions_apply_to(self.catalogs.s3(), &matching, extract_resource_name(r)))
        {
            return Err(reject("Action does not apply to any resource(s) in statement"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for IamPolicyValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IamPolicyValidator")
            .field("max_policy_size", &self.max_policy_size)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PolicyValidator for IamPolicyValidator {
    async fn validate(&self, policy_name: &str, policy_json: &str) -> Result<(), PolicyError> {
        let value: Value = serde_json::from_str(policy_json)
            .map_err(|e| reject(format!("This policy contains invalid Json - {e}")))?;

        let size = value.to_string().len();
        if size > self.max_policy_size {
            let err = PolicyError::limit_exceeded(format!(
                "Cannot exceed quota for PolicySize: {}",
                self.max_policy_size
            ));
            debug!(%policy_name, size, reason = %err.message, "policy rejected");
            return Err(err);
        }

        let Value::Object(root) = &value else {
            return Err(reject(
                "This policy contains invalid Json - expected a JSON object",
            ));
        };
        if !root.contains_key("Version") || !root.contains_key("Statement") {
            return Err(reject(SYNTAX_ERROR));
        }
        check_unknown_elements(root, &POLICY_ELEMENTS)?;

        match root.get("Version") {
            Some(Value::String(v)) if SUPPORTED_VERSIONS.contains(&v.as_str()) => {}
            _ => return Err(reject(SYNTAX_ERROR)),
        }

        let statements: Vec<&Value> = match root.get("Statement") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(item @ Value::Object(_)) => vec![item],
            _ => return Err(reject(SYNTAX_ERROR)),
        };
        if statements.is_empty() {
            return Err(reject("Missing required field Statement"));
        }

        let mut sids = HashSet::new();
        for statement in &statements {
            self.validate_statement(statement, &mut sids)?;
        }
        let statement_count = statements.len();

        let document = PolicyDocument::from_value(value).map_err(|e| {
            debug!(error = %e, "identity policy does not fit the policy grammar");
            reject(SYNTAX_ERROR)
        })?;
        for statement in &document.statements {
            if !statement.principals.is_empty() {
                validate_principals(self.directory.as_ref(), &statement.principals).await?;
            }
        }

        debug!(%policy_name, statements = statement_count, "identity policy is valid");
        Ok(())
    }
}

fn check_unknown_elements(object: &Map<String, Value>, allowed: &[&str]) -> Result<(), PolicyError> {
    match object.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => {
            debug!(%key, "unknown policy element");
            Err(reject(SYNTAX_ERROR))
        }
        None => Ok(()),
    }
}

/// A string or an array of strings.
fn string_list(value: Option<&Value>) -> Option<Vec<&str>> {
    match value? {
        Value::String(s) => Some(vec![s.as_str()]),
        Value::Array(items) => items.iter().map(Value::as_str).collect(),
        _ => None,
    }
}
