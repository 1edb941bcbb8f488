//! Scenario tests for the RustStack IAM policy engine.
//!
//! Each scenario validates a policy the way the API layer does before storing
//! it, then authorizes requests against the stored document. Accounts and
//! users live in an [`InMemoryDirectory`] seeded by [`engine`]:
//!
//! | Account | Id | Canonical id | Users |
//! |---------|----|--------------|-------|
//! | `acme` | `111122223333` | `C-ACME` | `root` (`U-ACME-ROOT`), `alice` (`U-ALICE`) |
//! | `globex` | `444455556666` | `C-GLOBEX` | `root` (`U-GLOBEX-ROOT`), `bob` (`U-BOB`) |
//!
//! Run them with:
//! ```text
//! cargo test -p ruststack-integration
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Once};

use chrono::{DateTime, Utc};
use ruststack_iam_policy_core::config::PolicyConfig;
use ruststack_iam_policy_core::directory::{Account, InMemoryDirectory, User};
use ruststack_iam_policy_core::provider::PolicyEngine;
use ruststack_iam_policy_model::{
    AccountIdentity, AuthorizationRequestor, RequestContext, UserIdentity,
};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A seeded account and the users that belong to it.
#[derive(Debug, Clone, Copy)]
pub struct Tenant {
    /// Account id.
    pub id: &'static str,
    /// Account name.
    pub name: &'static str,
    /// Canonical id.
    pub canonical_id: &'static str,
}

/// The `acme` account, owner of every bucket in the scenarios.
pub const ACME: Tenant = Tenant {
    id: "111122223333",
    name: "acme",
    canonical_id: "C-ACME",
};

/// The `globex` account, a foreign account in every scenario.
pub const GLOBEX: Tenant = Tenant {
    id: "444455556666",
    name: "globex",
    canonical_id: "C-GLOBEX",
};

/// Seeded users as `(tenant, user id, user name)`.
pub const USERS: [(Tenant, &str, &str); 4] = [
    (ACME, "U-ACME-ROOT", "root"),
    (ACME, "U-ALICE", "alice"),
    (GLOBEX, "U-GLOBEX-ROOT", "root"),
    (GLOBEX, "U-BOB", "bob"),
];

fn user_arn(tenant: Tenant, name: &str) -> String {
    if name == "root" {
        format!("arn:aws:iam::{}:root", tenant.id)
    } else {
        format!("arn:aws:iam::{}:user/{name}", tenant.id)
    }
}

/// Directory holding both tenants and their users.
#[must_use]
pub fn seeded_directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::new();
    for tenant in [ACME, GLOBEX] {
        directory.insert_account(Account {
            id: tenant.id.to_owned(),
            name: tenant.name.to_owned(),
            canonical_id: tenant.canonical_id.to_owned(),
        });
    }
    for (tenant, id, name) in USERS {
        directory.insert_user(User {
            id: id.to_owned(),
            name: name.to_owned(),
            account_name: tenant.name.to_owned(),
            arn: user_arn(tenant, name),
        });
    }
    directory
}

/// Engine over the bundled catalogs and the seeded directory.
#[must_use]
pub fn engine() -> PolicyEngine {
    init_tracing();
    PolicyEngine::from_config(PolicyConfig::default(), Arc::new(seeded_directory()))
        .expect("bundled catalogs should load")
}

/// The requestor for a seeded user name, e.g. `requestor(ACME, "alice")`.
#[must_use]
pub fn requestor(tenant: Tenant, name: &str) -> AuthorizationRequestor {
    let (_, id, _) = USERS
        .iter()
        .find(|(t, _, n)| t.id == tenant.id && *n == name)
        .unwrap_or_else(|| panic!("unknown user {name} in {}", tenant.name));
    AuthorizationRequestor::builder()
        .account(AccountIdentity {
            id: tenant.id.to_owned(),
            name: tenant.name.to_owned(),
            canonical_id: tenant.canonical_id.to_owned(),
        })
        .user(UserIdentity {
            id: (*id).to_owned(),
            name: name.to_owned(),
            arn: user_arn(tenant, name),
        })
        .build()
}

/// Request builder for the scenarios. Buckets are owned by [`ACME`].
#[derive(Debug, Clone)]
pub struct Request {
    method: http::Method,
    uri: String,
    query: String,
    attributes: HashMap<String, String>,
    time: Option<DateTime<Utc>>,
}

impl Request {
    /// A request with the given method and absolute path.
    #[must_use]
    pub fn new(method: http::Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_owned(),
            query: String::new(),
            attributes: HashMap::new(),
            time: None,
        }
    }

    /// Set the raw query string.
    #[must_use]
    pub fn query(mut self, query: &str) -> Self {
        self.query = query.to_owned();
        self
    }

    /// Add a request attribute.
    #[must_use]
    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_owned(), value.to_owned());
        self
    }

    /// Fix the request time.
    #[must_use]
    pub fn at(mut self, time: &str) -> Self {
        let time = DateTime::parse_from_rfc3339(time).expect("test timestamp");
        self.time = Some(time.with_timezone(&Utc));
        self
    }

    /// Build the request context.
    #[must_use]
    pub fn build(self) -> RequestContext {
        RequestContext::builder()
            .method(self.method)
            .absolute_uri(self.uri)
            .query(self.query)
            .attributes(self.attributes)
            .resource_owner(ACME.canonical_id)
            .request_time(self.time.unwrap_or_else(Utc::now))
            .build()
    }
}

/// Wrap statements in a `2012-10-17` policy document.
#[must_use]
pub fn policy(statements: &[&str]) -> String {
    format!(
        r#"{{"Version": "2012-10-17", "Statement": [{}]}}"#,
        statements.join(", ")
    )
}

mod test_bucket_policy;
mod test_iam_policy;
