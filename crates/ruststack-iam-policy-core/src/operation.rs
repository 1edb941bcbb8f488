//! Canonical action identification.
//!
//! Maps a [`RequestContext`] to the single canonical action it requires, in
//! two steps: the HTTP shape of the request (method, bucket/key, sub-resource
//! query parameters, a few headers) selects an API operation name, which the
//! service's [`ActionTaxonomy`] then resolves to its canonical action
//! (`HeadObject` is authorized as `s3:GetObject`).
//!
//! Callers may bypass the HTTP shape by naming the operation explicitly in the
//! `S3Action` (storage) or `Action` (identity) parameter.

use http::Method;
use ruststack_iam_policy_model::RequestContext;

use crate::catalog::{ActionTaxonomy, Catalogs};

/// Parameter naming a storage operation explicitly.
pub const S3_ACTION_PARAM: &str = "S3Action";

/// Parameter naming an identity API action.
pub const IAM_ACTION_PARAM: &str = "Action";

/// Canonical actions that manage a bucket policy.
pub const POLICY_MANAGEMENT_ACTIONS: [&str; 3] = [
    "s3:PutBucketPolicy",
    "s3:GetBucketPolicy",
    "s3:DeleteBucketPolicy",
];

/// Whether `action` reads or changes a bucket policy.
#[must_use]
pub fn is_policy_management(action: &str) -> bool {
    POLICY_MANAGEMENT_ACTIONS
        .iter()
        .any(|a| a.eq_ignore_ascii_case(action))
}

/// The canonical storage action a request requires.
///
/// Returns `None` when the request maps to no catalogued action.
#[must_use]
pub fn identify_s3_action<'a>(ctx: &RequestContext, taxonomy: &'a ActionTaxonomy) -> Option<&'a str> {
    if let Some(explicit) = ctx.parameter(S3_ACTION_PARAM) {
        return taxonomy.resolve_operation(&explicit);
    }
    identify_s3_operation(ctx).and_then(|op| taxonomy.resolve_operation(op))
}

/// The canonical action an identity-service request requires.
///
/// Requests carrying an `Action` parameter resolve through the identity
/// taxonomy. Storage requests forwarded for authorization
/// (`Action=AuthorizeUser`) and requests without the parameter fall back to
/// storage identification.
#[must_use]
pub fn identify_iam_action<'a>(ctx: &RequestContext, catalogs: &'a Catalogs) -> Option<&'a str> {
    if let Some(action) = ctx.parameter(IAM_ACTION_PARAM)
        && !action.contains("Authorize")
    {
        let qualified = format!("iam:{action}");
        if let Some(found) = catalogs.iam().canonical_name(&qualified) {
            return Some(found);
        }
    }
    identify_s3_action(ctx, catalogs.s3())
}

/// The storage API operation name implied by the request's HTTP shape.
///
/// # Examples
///
/// ```
/// use ruststack_iam_policy_core::operation::identify_s3_operation;
/// use ruststack_iam_policy_model::RequestContext;
///
/// let ctx = RequestContext::builder()
///     .method(http::Method::PUT)
///     .absolute_uri("/bucket")
///     .query("policy")
///     .build();
/// assert_eq!(identify_s3_operation(&ctx), Some("PutBucketPolicy"));
/// ```
#[must_use]
pub fn identify_s3_operation(ctx: &RequestContext) -> Option<&'static str> {
    let (bucket, key) = ctx.bucket_and_key();
    let method = ctx.method();

    match (bucket.is_empty(), key.is_some()) {
        (true, _) if *method == Method::GET => Some("ListBuckets"),
        (true, _) => None,
        (false, false) => identify_bucket_operation(method, ctx),
        (false, true) => identify_object_operation(method, ctx),
    }
}

/// Sub-resources checked in order for bucket GET/PUT/DELETE, with the
/// operation each method maps to.
const BUCKET_SUBRESOURCES: &[(&str, Option<&str>, Option<&str>, Option<&str>)] = &[
    // (parameter, GET, PUT, DELETE)
    ("location", Some("GetBucketLocation"), None, None),
    ("versioning", Some("GetBucketVersioning"), Some("PutBucketVersioning"), None),
    ("cors", Some("GetBucketCors"), Some("PutBucketCors"), Some("DeleteBucketCors")),
    (
        "lifecycle",
        Some("GetBucketLifecycleConfiguration"),
        Some("PutBucketLifecycleConfiguration"),
        Some("DeleteBucketLifecycle"),
    ),
    ("policy", Some("GetBucketPolicy"), Some("PutBucketPolicy"), Some("DeleteBucketPolicy")),
    ("tagging", Some("GetBucketTagging"), Some("PutBucketTagging"), Some("DeleteBucketTagging")),
    (
        "replication",
        Some("GetBucketReplication"),
        Some("PutBucketReplication"),
        Some("DeleteBucketReplication"),
    ),
    (
        "object-lock",
        Some("GetObjectLockConfiguration"),
        Some("PutObjectLockConfiguration"),
        None,
    ),
    ("acl", Some("GetBucketAcl"), Some("PutBucketAcl"), None),
    ("uploads", Some("ListMultipartUploads"), None, None),
    ("versions", Some("ListObjectVersions"), None, None),
];

fn identify_bucket_operation(method: &Method, ctx: &RequestContext) -> Option<&'static str> {
    match *method {
        Method::HEAD => return Some("HeadBucket"),
        Method::POST => {
            return ctx.has_query_param("delete").then_some("DeleteObjects");
        }
        _ => {}
    }

    for &(param, get, put, delete) in BUCKET_SUBRESOURCES {
        if ctx.has_query_param(param) {
            return match *method {
                Method::GET => get,
                Method::PUT => put,
                Method::DELETE => delete,
                _ => None,
            };
        }
    }

    match *method {
        Method::GET if ctx.query_param("list-type").as_deref() == Some("2") => Some("ListObjectsV2"),
        Method::GET => Some("ListObjects"),
        Method::PUT => Some("CreateBucket"),
        Method::DELETE => Some("DeleteBucket"),
        _ => None,
    }
}

fn identify_object_operation(method: &Method, ctx: &RequestContext) -> Option<&'static str> {
    let versioned = ctx.has_query_param("versionId");
    match *method {
        Method::GET => Some(identify_object_get(ctx, versioned)),
        Method::HEAD => Some("HeadObject"),
        Method::PUT => Some(identify_object_put(ctx, versioned)),
        Method::DELETE => Some(identify_object_delete(ctx, versioned)),
        Method::POST => identify_object_post(ctx),
        _ => None,
    }
}

fn identify_object_get(ctx: &RequestContext, versioned: bool) -> &'static str {
    if ctx.has_query_param("tagging") {
        return if versioned { "GetObjectVersionTagging" } else { "GetObjectTagging" };
    }
    if ctx.has_query_param("acl") {
        return if versioned { "GetObjectVersionAcl" } else { "GetObjectAcl" };
    }
    if ctx.has_query_param("retention") {
        return "GetObjectRetention";
    }
    if ctx.has_query_param("legal-hold") {
        return "GetObjectLegalHold";
    }
    if ctx.has_query_param("uploadId") {
        return "ListParts";
    }
    if versioned { "GetObjectVersion" } else { "GetObject" }
}

fn identify_object_put(ctx: &RequestContext, versioned: bool) -> &'static str {
    let has_copy_source = ctx.attribute("x-amz-copy-source").is_some();

    if ctx.has_query_param("tagging") {
        return if versioned { "PutObjectVersionTagging" } else { "PutObjectTagging" };
    }
    if ctx.has_query_param("acl") {
        return if versioned { "PutObjectVersionAcl" } else { "PutObjectAcl" };
    }
    if ctx.has_query_param("retention") {
        return "PutObjectRetention";
    }
    if ctx.has_query_param("legal-hold") {
        return "PutObjectLegalHold";
    }
    if ctx.has_query_param("partNumber") && ctx.has_query_param("uploadId") {
        return if has_copy_source { "UploadPartCopy" } else { "UploadPart" };
    }
    if has_copy_source { "CopyObject" } else { "PutObject" }
}

fn identify_object_delete(ctx: &RequestContext, versioned: bool) -> &'static str {
    if ctx.has_query_param("tagging") {
        return if versioned {
            "DeleteObjectVersionTagging"
        } else {
            "DeleteObjectTagging"
        };
    }
    if ctx.has_query_param("uploadId") {
        return "AbortMultipartUpload";
    }
    if versioned { "DeleteObjectVersion" } else { "DeleteObject" }
}

fn identify_object_post(ctx: &RequestContext) -> Option<&'static str> {
    if ctx.has_query_param("uploads") {
        return Some("CreateMultipartUpload");
    }
    if ctx.has_query_param("uploadId") {
        return Some("CompleteMultipartUpload");
    }
    if ctx.has_query_param("restore") {
        return Some("RestoreObject");
    }
    None
}
