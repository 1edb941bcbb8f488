//! Policy document model.
//!
//! Parses the IAM/S3 JSON policy grammar:
//!
//! ```json
//! {
//!   "Version": "2012-10-17",
//!   "Statement": [{
//!     "Sid": "AllowRead",
//!     "Effect": "Allow",
//!     "Principal": {"AWS": ["123456789012"]},
//!     "Action": "s3:GetObject",
//!     "Resource": "arn:aws:s3:::bucket/*",
//!     "Condition": {"StringEquals": {"s3:x-amz-acl": "private"}}
//!   }]
//! }
//! ```
//!
//! `Statement`, `Action`, `Resource`, principal ids and condition values may
//! each be written as a single value or as an array. Parsing only checks the
//! shape of the document; semantic checks belong to the validators.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A parsed policy document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PolicyDocument {
    /// Policy language version (informational).
    #[serde(rename = "Version", default)]
    pub version: Option<String>,
    /// Optional policy id.
    #[serde(rename = "Id", default)]
    pub id: Option<String>,
    /// Statements in document order.
    #[serde(rename = "Statement", default, deserialize_with = "one_or_many")]
    pub statements: Vec<Statement>,
}

impl PolicyDocument {
    /// Parse a policy document from JSON text.
    ///
    /// # Examples
    ///
    /// ```
    /// use ruststack_iam_policy_model::{Effect, PolicyDocument};
    ///
    /// let doc = PolicyDocument::from_json(
    ///     r#"{"Statement": {"Effect": "Deny", "Action": "s3:*", "Resource": "*"}}"#,
    /// )
    /// .unwrap();
    /// assert_eq!(doc.statements.len(), 1);
    /// assert_eq!(doc.statements[0].effect, Effect::Deny);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse a policy document from an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// A single policy rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Statement {
    /// Optional statement label.
    #[serde(rename = "Sid", default)]
    pub sid: Option<String>,
    /// Whether a match allows or denies.
    #[serde(rename = "Effect")]
    pub effect: Effect,
    /// Principals the statement applies to. Empty for identity policies.
    #[serde(
        rename = "Principal",
        default,
        deserialize_with = "deserialize_principals"
    )]
    pub principals: Vec<Principal>,
    /// Action patterns (`s3:Get*`, `iam:CreateUser`, `*`).
    #[serde(rename = "Action", default, deserialize_with = "one_or_many")]
    pub actions: Vec<String>,
    /// Resource ARN patterns.
    #[serde(rename = "Resource", default, deserialize_with = "one_or_many")]
    pub resources: Vec<String>,
    /// Conditions, flattened to one entry per (type, key).
    #[serde(
        rename = "Condition",
        default,
        deserialize_with = "deserialize_conditions"
    )]
    pub conditions: Vec<ConditionEntry>,
}

/// Statement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Effect {
    /// Grant access.
    Allow,
    /// Explicitly refuse access.
    Deny,
}

impl Effect {
    /// Parse an effect name. Only the exact spellings `Allow` and `Deny` are accepted.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Allow" => Some(Self::Allow),
            "Deny" => Some(Self::Deny),
            _ => None,
        }
    }

    /// Returns the effect name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::Deny => "Deny",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The namespace a principal id belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrincipalProvider {
    /// `AWS`: account id, user id, or user/role/root ARN.
    Aws,
    /// `CanonicalUser`: an account canonical id.
    CanonicalUser,
    /// `Federated`: an identity provider.
    Federated,
    /// `*`: anybody.
    Any,
    /// Anything else. Never valid, kept so validators can report it.
    Other(String),
}

impl PrincipalProvider {
    /// Map a JSON provider key to a provider.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key {
            "AWS" => Self::Aws,
            "CanonicalUser" => Self::CanonicalUser,
            "Federated" => Self::Federated,
            "*" => Self::Any,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the JSON provider key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Aws => "AWS",
            Self::CanonicalUser => "CanonicalUser",
            Self::Federated => "Federated",
            Self::Any => "*",
            Self::Other(s) => s,
        }
    }
}

/// A principal entry of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    /// Provider namespace.
    pub provider: PrincipalProvider,
    /// Id within the provider namespace, or `*`.
    pub id: String,
}

impl Principal {
    /// The `"Principal": "*"` principal.
    #[must_use]
    pub fn any() -> Self {
        Self {
            provider: PrincipalProvider::Any,
            id: "*".to_owned(),
        }
    }

    /// Whether this principal matches every caller. Only `*`, `AWS` and
    /// `CanonicalUser` principals can be wildcards.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.id == "*"
            && matches!(
                self.provider,
                PrincipalProvider::Any | PrincipalProvider::Aws | PrincipalProvider::CanonicalUser
            )
    }
}

/// One `Condition` entry: `{"<type>": {"<key>": [values]}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionEntry {
    /// Comparison type, e.g. `StringEquals`.
    pub condition_type: String,
    /// Condition key, e.g. `s3:x-amz-acl`.
    pub key: String,
    /// Values to compare against. JSON numbers and booleans are kept as text.
    pub values: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::<T>::deserialize(deserializer)? {
        OneOrMany::One(v) => vec![v],
        OneOrMany::Many(v) => v,
    })
}

fn deserialize_principals<'de, D>(deserializer: D) -> Result<Vec<Principal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if s == "*" => Ok(vec![Principal::any()]),
        Value::String(s) => Err(D::Error::custom(format!(
            "principal must be \"*\" or an object, got \"{s}\""
        ))),
        Value::Object(map) => {
            let mut principals = Vec::new();
            for (key, ids) in map {
                let provider = PrincipalProvider::from_key(&key);
                for id in string_list(ids).map_err(D::Error::custom)? {
                    principals.push(Principal {
                        provider: provider.clone(),
                        id,
                    });
                }
            }
            Ok(principals)
        }
        _ => Err(D::Error::custom("principal must be a string or an object")),
    }
}

fn deserialize_conditions<'de, D>(deserializer: D) -> Result<Vec<ConditionEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(types) = Value::deserialize(deserializer)? else {
        return Err(D::Error::custom("condition must be an object"));
    };

    let mut entries = Vec::new();
    for (condition_type, keys) in types {
        let Value::Object(keys) = keys else {
            return Err(D::Error::custom(format!(
                "condition {condition_type} must map keys to values"
            )));
        };
        for (key, values) in keys {
            entries.push(ConditionEntry {
                condition_type: condition_type.clone(),
                key,
                values: string_list(values).map_err(D::Error::custom)?,
            });
        }
    }
    Ok(entries)
}

/// Flatten a scalar or an array of scalars into strings.
fn string_list(value: Value) -> Result<Vec<String>, String> {
    match value {
        Value::Array(items) => items.into_iter().map(scalar_to_string).collect(),
        other => Ok(vec![scalar_to_string(other)?]),
    }
}

fn scalar_to_string(value: Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a string value, got {other}")),
    }
}
