//! Request context and requestor identity.
//!
//! Both are built once per request by the HTTP layer and handed to the engine
//! read-only.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Read-only view of an inbound request.
///
/// # Examples
///
/// ```
/// use ruststack_iam_policy_model::RequestContext;
///
/// let ctx = RequestContext::builder()
///     .method(http::Method::GET)
///     .absolute_uri("/photos/2024/cat%20.jpg")
///     .query("versionId=3&acl")
///     .build();
///
/// assert_eq!(ctx.requested_resource(), "photos/2024/cat .jpg");
/// assert_eq!(ctx.query_param("versionId").as_deref(), Some("3"));
/// assert!(ctx.has_query_param("acl"));
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct RequestContext {
    /// HTTP method.
    #[builder(default = http::Method::GET)]
    method: http::Method,
    /// Absolute resource path, e.g. `/bucket/key`.
    #[builder(setter(into))]
    absolute_uri: String,
    /// Raw query string without the leading `?`.
    #[builder(default, setter(into))]
    query: String,
    /// Headers and synthetic request attributes.
    #[builder(default)]
    attributes: HashMap<String, String>,
    /// Canonical id of the owner of the addressed bucket, when known.
    #[builder(default, setter(strip_option, into))]
    resource_owner: Option<String>,
    /// Time the request was received.
    #[builder(default = Utc::now())]
    request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Synthetic attribute name under which the raw query string is exposed.
    pub const QUERY_PARAMS_KEY: &'static str = "ClientQueryParams";

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &http::Method {
        &self.method
    }

    /// Absolute resource path as received.
    #[must_use]
    pub fn absolute_uri(&self) -> &str {
        &self.absolute_uri
    }

    /// Raw query string.
    #[must_use]
    pub fn query_string(&self) -> &str {
        &self.query
    }

    /// All non-query attributes.
    #[must_use]
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Canonical id of the owner of the addressed resource.
    #[must_use]
    pub fn resource_owner(&self) -> Option<&str> {
        self.resource_owner.as_deref()
    }

    /// Time the request was received.
    #[must_use]
    pub fn request_time(&self) -> DateTime<Utc> {
        self.request_time
    }

    /// Look up an attribute by name, ignoring ASCII case.
    ///
    /// [`Self::QUERY_PARAMS_KEY`] resolves to the raw query string.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        if name.eq_ignore_ascii_case(Self::QUERY_PARAMS_KEY) {
            return Some(&self.query);
        }
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decoded value of a query parameter, ignoring ASCII case of the name.
    ///
    /// Valueless parameters such as `?acl` yield an empty string.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        form_urlencoded::parse(self.query.as_bytes())
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.into_owned())
    }

    /// Whether the query string names the given parameter.
    #[must_use]
    pub fn has_query_param(&self, name: &str) -> bool {
        self.query_param(name).is_some()
    }

    /// An API parameter: an attribute first, then a query parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.attribute(name)
            .map(str::to_owned)
            .or_else(|| self.query_param(name))
    }

    /// The requested resource as `bucket[/key]`, percent-decoded.
    #[must_use]
    pub fn requested_resource(&self) -> String {
        let path = self
            .absolute_uri
            .split_once('?')
            .map_or(self.absolute_uri.as_str(), |(path, _)| path);
        let path = path.trim_start_matches('/');
        percent_decode_str(path).decode_utf8_lossy().into_owned()
    }

    /// Split the requested resource into bucket and optional key.
    ///
    /// An empty bucket means the service root (`/`).
    #[must_use]
    pub fn bucket_and_key(&self) -> (String, Option<String>) {
        let resource = self.requested_resource();
        match resource.split_once('/') {
            Some((bucket, key)) if !key.is_empty() => (bucket.to_owned(), Some(key.to_owned())),
            Some((bucket, _)) => (bucket.to_owned(), None),
            None => (resource, None),
        }
    }
}

/// The account a requestor belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    /// Account id.
    pub id: String,
    /// Account name.
    pub name: String,
    /// Account canonical id.
    pub canonical_id: String,
}

/// The user a request was authenticated as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    /// User id.
    pub id: String,
    /// User name (`root` for the account root user).
    pub name: String,
    /// User ARN.
    pub arn: String,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, TypedBuilder)]
pub struct AuthorizationRequestor {
    /// Owning account.
    pub account: AccountIdentity,
    /// Authenticated user.
    pub user: UserIdentity,
    /// Identity policy documents attached to the user, inline and by reference.
    #[builder(default)]
    pub policy_documents: Vec<String>,
}
