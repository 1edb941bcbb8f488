//! Identity directory collaborator.
//!
//! The engine never owns account or user state. It asks a [`Directory`] for
//! it, through one trait per entity type. Lookups return `Ok(None)` for
//! "does not exist" and `Err` only when the directory itself failed, so
//! callers can tell an unknown principal from an outage.
//!
//! [`InMemoryDirectory`] backs tests and the policy-check tool.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

/// Name of the account root user.
pub const ROOT_USER_NAME: &str = "root";

/// A stored account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account id.
    pub id: String,
    /// Account name.
    pub name: String,
    /// Canonical id.
    pub canonical_id: String,
}

/// A stored user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User id.
    pub id: String,
    /// User name.
    pub name: String,
    /// Name of the owning account.
    pub account_name: String,
    /// User ARN.
    pub arn: String,
}

impl User {
    /// Whether this is the account root user.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.name == ROOT_USER_NAME
    }
}

/// Account lookups.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Find an account by id.
    async fn find_account_by_id(&self, id: &str) -> Result<Option<Account>, DirectoryError>;

    /// Find an account by name.
    async fn find_account_by_name(&self, name: &str) -> Result<Option<Account>, DirectoryError>;

    /// Find an account by canonical id.
    async fn find_account_by_canonical_id(
        &self,
        canonical_id: &str,
    ) -> Result<Option<Account>, DirectoryError>;
}

/// User lookups.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by id.
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, DirectoryError>;

    /// Find a user (or role) by ARN.
    async fn find_user_by_arn(&self, arn: &str) -> Result<Option<User>, DirectoryError>;
}

/// Everything the engine looks up.
pub trait Directory: AccountDirectory + UserDirectory {}

impl<T: AccountDirectory + UserDirectory> Directory for T {}

/// In-memory directory backed by `DashMap`.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    accounts: DashMap<String, Account>,
    users: DashMap<String, User>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an account, keyed by id.
    pub fn insert_account(&self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    /// Add or replace a user, keyed by id.
    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    fn find_account(&self, pred: impl Fn(&Account) -> bool) -> Option<Account> {
        self.accounts
            .iter()
            .find(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl AccountDirectory for InMemoryDirectory {
    async fn find_account_by_id(&self, id: &str) -> Result<Option<Account>, DirectoryError> {
        Ok(self.accounts.get(id).map(|a| a.value().clone()))
    }

    async fn find_account_by_name(&self, name: &str) -> Result<Option<Account>, DirectoryError> {
        Ok(self.find_account(|a| a.name == name))
    }

    async fn find_account_by_canonical_id(
        &self,
        canonical_id: &str,
    ) -> Result<Option<Account>, DirectoryError> {
        Ok(self.find_account(|a| a.canonical_id == canonical_id))
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self.users.get(id).map(|u| u.value().clone()))
    }

    async fn find_user_by_arn(&self, arn: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.value().arn == arn)
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> InMemoryDirectory {
        let directory = InMemoryDirectory::new();
        directory.insert_account(Account {
            id: "123456789012".to_owned(),
            name: "acme".to_owned(),
            canonical_id: "C-ACME".to_owned(),
        });
        directory.insert_user(User {
            id: "U-ALICE".to_owned(),
            name: "alice".to_owned(),
            account_name: "acme".to_owned(),
            arn: "arn:aws:iam::123456789012:user/alice".to_owned(),
        });
        directory
    }

    #[tokio::test]
    async fn test_should_find_accounts() {
        let directory = directory();
        assert!(directory.find_account_by_id("123456789012").await.unwrap().is_some());
        assert_eq!(
            directory.find_account_by_name("acme").await.unwrap().map(|a| a.id),
            Some("123456789012".to_owned())
        );
        assert_eq!(
            directory
                .find_account_by_canonical_id("C-ACME")
                .await
                .unwrap()
                .map(|a| a.name),
            Some("acme".to_owned())
        );
        assert!(directory.find_account_by_id("999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_should_find_users() {
        let directory = directory();
        let alice = directory
            .find_user_by_arn("arn:aws:iam::123456789012:user/alice")
            .await
            .unwrap()
            .expect("alice exists");
        assert_eq!(alice.id, "U-ALICE");
        assert!(!alice.is_root());
        assert!(directory.find_user_by_id("U-ALICE").await.unwrap().is_some());
        assert!(directory.find_user_by_id("U-BOB").await.unwrap().is_none());
    }

    #[test]
    fn test_should_deserialize_camel_case_records() {
        let user: User = serde_json::from_str(
            r#"{"id": "U1", "name": "root", "accountName": "acme", "arn": "arn:aws:iam::1:root"}"#,
        )
        .unwrap();
        assert!(user.is_root());
    }
}
