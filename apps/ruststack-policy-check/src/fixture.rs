//! JSON fixtures read by the policy-check tool.
//!
//! A directory fixture seeds the in-memory directory:
//!
//! ```json
//! {
//!   "accounts": [{"id": "111122223333", "name": "acme", "canonicalId": "C-ACME"}],
//!   "users": [{"id": "U1", "name": "alice", "accountName": "acme",
//!              "arn": "arn:aws:iam::111122223333:user/alice"}]
//! }
//! ```
//!
//! A request fixture describes one request and its requestor:
//!
//! ```json
//! {
//!   "method": "GET", "uri": "/bucket/key", "query": "versionId=1",
//!   "attributes": {"aws:SourceIp": "10.0.0.1"}, "resourceOwner": "C-ACME",
//!   "account": {"id": "111122223333", "name": "acme", "canonicalId": "C-ACME"},
//!   "user": {"id": "U1", "name": "alice", "arn": "arn:aws:iam::111122223333:user/alice"}
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ruststack_iam_policy_core::directory::{Account, InMemoryDirectory, User};
use ruststack_iam_policy_model::{
    AccountIdentity, AuthorizationRequestor, RequestContext, UserIdentity,
};
use serde::Deserialize;

/// Accounts and users to load into the directory.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryFixture {
    /// Known accounts.
    pub accounts: Vec<Account>,
    /// Known users.
    pub users: Vec<User>,
}

impl DirectoryFixture {
    /// Read a directory fixture from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Build an in-memory directory holding every fixture entry.
    #[must_use]
    pub fn into_directory(self) -> InMemoryDirectory {
        let directory = InMemoryDirectory::new();
        for account in self.accounts {
            directory.insert_account(account);
        }
        for user in self.users {
            directory.insert_user(user);
        }
        directory
    }
}

/// One request to evaluate.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFixture {
    #[serde(default = "default_method")]
    method: String,
    uri: String,
    #[serde(default)]
    query: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    resource_owner: Option<String>,
    #[serde(default)]
    request_time: Option<DateTime<Utc>>,
    account: AccountIdentity,
    user: UserIdentity,
}

fn default_method() -> String {
    "GET".to_owned()
}

impl RequestFixture {
    /// Read a request fixture from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// The request context described by the fixture.
    pub fn context(&self) -> Result<RequestContext> {
        let method = http::Method::from_bytes(self.method.as_bytes())
            .with_context(|| format!("invalid HTTP method: {}", self.method))?;
        let builder = RequestContext::builder()
            .method(method)
            .absolute_uri(self.uri.as_str())
            .query(self.query.as_str())
            .attributes(self.attributes.clone())
            .request_time(self.request_time.unwrap_or_else(Utc::now));
        Ok(match &self.resource_owner {
            Some(owner) => builder.resource_owner(owner.as_str()).build(),
            None => builder.build(),
        })
    }

    /// The requestor described by the fixture.
    #[must_use]
    pub fn requestor(&self) -> AuthorizationRequestor {
        AuthorizationRequestor::builder()
            .account(self.account.clone())
            .user(self.user.clone())
            .build()
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
