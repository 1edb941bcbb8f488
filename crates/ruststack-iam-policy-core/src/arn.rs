//! Amazon Resource Name grammars.
//!
//! An ARN has the shape `arn:<partition>:<service>:<region>:<account>:<resource>`.
//! Each resource family accepted in policies has its own fixed grammar:
//!
//! | Parser | Grammar |
//! |--------|---------|
//! | [`GenericArnParser`] | any service, any resource |
//! | [`StorageArnParser`] | `arn:aws:s3:::<bucket>[/<key>]` |
//! | [`IdentityArnParser`] | `arn:aws:iam::<account-id-or-name>:<resource-path>` |
//! | [`PrincipalArnParser`] | `arn:aws:iam::<account>:root`, `...:user/<path>`, `...:role/<path>` |
//!
//! Parsers never fail loudly: empty or malformed input is simply invalid.

use std::sync::LazyLock;

use regex::Regex;

static GENERIC_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:[a-z][a-z0-9-]*:[a-z0-9*?-]+:[a-z0-9*?-]*:[^:\s]*:\S+$")
        .expect("generic ARN grammar should compile")
});

static STORAGE_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws:s3:::[A-Za-z0-9._*?-]+(/.*)?$")
        .expect("storage ARN grammar should compile")
});

static IDENTITY_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws:iam::[^:\s]*:\S+$").expect("identity ARN grammar should compile")
});

static PRINCIPAL_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws:iam::[^:/\s]+:(root|user/\S+|role/\S+)$")
        .expect("principal ARN grammar should compile")
});

/// A grammar for one ARN family.
pub trait ArnParser: Send + Sync {
    /// The anchored regular expression for this family.
    fn grammar(&self) -> &Regex;

    /// Whether `arn` belongs to this family.
    fn is_valid(&self, arn: &str) -> bool {
        !arn.is_empty() && self.grammar().is_match(arn)
    }
}

/// Any syntactically well-formed ARN.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericArnParser;

impl ArnParser for GenericArnParser {
    fn grammar(&self) -> &Regex {
        &GENERIC_ARN
    }
}

/// Storage (S3) bucket and object ARNs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageArnParser;

impl ArnParser for StorageArnParser {
    fn grammar(&self) -> &Regex {
        &STORAGE_ARN
    }
}

/// Identity-service (IAM) resource ARNs.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityArnParser;

impl ArnParser for IdentityArnParser {
    fn grammar(&self) -> &Regex {
        &IDENTITY_ARN
    }
}

/// ARNs that name a principal: an account root, a user or a role.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrincipalArnParser;

impl ArnParser for PrincipalArnParser {
    fn grammar(&self) -> &Regex {
        &PRINCIPAL_ARN
    }
}

/// The resource segment of an ARN: everything after the fifth colon.
///
/// Call only after an [`ArnParser`] accepted the input; anything without five
/// colons yields an empty string.
///
/// # Examples
///
/// ```
/// use ruststack_iam_policy_core::arn::extract_resource_name;
///
/// assert_eq!(extract_resource_name("arn:aws:s3:::bucket/key"), "bucket/key");
/// assert_eq!(extract_resource_name("arn:aws:iam::123:user/a:b"), "user/a:b");
/// ```
#[must_use]
pub fn extract_resource_name(arn: &str) -> &str {
    arn.splitn(6, ':').nth(5).unwrap_or_default()
}

/// The account segment of an ARN.
#[must_use]
pub fn extract_account(arn: &str) -> &str {
    arn.splitn(6, ':').nth(4).unwrap_or_default()
}

/// Split a storage resource name into bucket and optional object part.
///
/// # Examples
///
/// ```
/// use ruststack_iam_policy_core::arn::split_storage_resource;
///
/// assert_eq!(split_storage_resource("b/dir/k"), ("b", Some("dir/k")));
/// assert_eq!(split_storage_resource("b"), ("b", None));
/// ```
#[must_use]
pub fn split_storage_resource(resource: &str) -> (&str, Option<&str>) {
    match resource.split_once('/') {
        Some((bucket, object)) => (bucket, Some(object)),
        None => (resource, None),
    }
}
