//! Bucket policy scenarios: validate, store, authorize.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use http::Method;
    use ruststack_iam_policy_core::authorizer::PolicyAuthorizer;
    use ruststack_iam_policy_core::catalog::Catalogs;
    use ruststack_iam_policy_core::directory::{Account, AccountDirectory, User, UserDirectory};
    use ruststack_iam_policy_core::error::{AuthorizationError, DirectoryError};
    use ruststack_iam_policy_core::validation::{BucketPolicyValidator, PolicyValidator};
    use ruststack_iam_policy_model::{Decision, PolicyErrorCode};

    use crate::{ACME, GLOBEX, Request, engine, policy, requestor};

    const ALLOW_GET: &str = r#"{"Sid": "read", "Effect": "Allow", "Principal": "*", "Action": "s3:GetObject", "Resource": "arn:aws:s3:::b/*"}"#;
    const DENY_ALL: &str = r#"{"Sid": "lock", "Effect": "Deny", "Principal": "*", "Action": "s3:*", "Resource": "arn:aws:s3:::b/*"}"#;

    /// Validate `document` for bucket `b` and return it as the stored form.
    async fn store(document: String) -> Vec<String> {
        engine()
            .bucket_validator()
            .validate("b", &document)
            .await
            .unwrap_or_else(|e| panic!("policy should validate: {e}"));
        vec![document]
    }

    #[tokio::test]
    async fn test_should_deny_when_explicit_deny_matches_in_any_order() {
        let engine = engine();
        let authorizer = engine.bucket_authorizer();
        let get = Request::new(Method::GET, "/b/key1").build();
        let alice = requestor(ACME, "alice");

        for statements in [[ALLOW_GET, DENY_ALL], [DENY_ALL, ALLOW_GET]] {
            let stored = store(policy(&statements)).await;
            let decision = authorizer.authorize(&alice, &get, &stored).await.unwrap();
            assert_eq!(decision, Decision::Deny);
        }
    }

    #[tokio::test]
    async fn test_should_return_no_opinion_when_nothing_matches() {
        let engine = engine();
        let stored = store(policy(&[ALLOW_GET])).await;
        let put = Request::new(Method::PUT, "/b/key1").build();
        let decision = engine
            .bucket_authorizer()
            .authorize(&requestor(ACME, "alice"), &put, &stored)
            .await
            .unwrap();
        assert_eq!(decision, Decision::NoOpinion);
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn test_should_allow_owner_root_to_read_policy_without_statement() {
        let engine = engine();
        let stored = store(policy(&[ALLOW_GET])).await;
        let get_policy = Request::new(Method::GET, "/b").query("policy").build();
        let authorizer = engine.bucket_authorizer();

        let owner = authorizer
            .authorize(&requestor(ACME, "root"), &get_policy, &stored)
            .await
            .unwrap();
        assert_eq!(owner, Decision::Allow);

        let member = authorizer
            .authorize(&requestor(ACME, "alice"), &get_policy, &stored)
            .await
            .unwrap();
        assert_eq!(member, Decision::Deny);

        let foreign_root = authorizer
            .authorize(&requestor(GLOBEX, "root"), &get_policy, &stored)
            .await
            .unwrap();
        assert_eq!(foreign_root, Decision::Deny);
    }

    #[tokio::test]
    async fn test_should_refuse_policy_management_granted_to_foreign_account() {
        let engine = engine();
        let stored = store(policy(&[
            r#"{"Effect": "Allow", "Principal": {"AWS": "444455556666"}, "Action": "s3:PutBucketPolicy", "Resource": "arn:aws:s3:::b"}"#,
        ]))
        .await;
        let put_policy = Request::new(Method::PUT, "/b").query("policy").build();
        let result = engine
            .bucket_authorizer()
            .authorize(&requestor(GLOBEX, "bob"), &put_policy, &stored)
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, AuthorizationError::MethodNotAllowed));
        assert_eq!(err.status_code(), http::StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_should_grant_cross_account_access_by_principal() {
        let engine = engine();
        let stored = store(policy(&[
            r#"{"Effect": "Allow", "Principal": {"AWS": ["arn:aws:iam::444455556666:user/bob"]}, "Action": ["s3:GetObject", "s3:PutObject"], "Resource": "arn:aws:s3:::b/shared/*"}"#,
        ]))
        .await;
        let authorizer = engine.bucket_authorizer();
        let bob = requestor(GLOBEX, "bob");
        let globex_root = requestor(GLOBEX, "root");

        let shared = Request::new(Method::PUT, "/b/shared/report.csv").build();
        let private = Request::new(Method::GET, "/b/private/report.csv").build();
        assert_eq!(
            authorizer.authorize(&bob, &shared, &stored).await.unwrap(),
            Decision::Allow
        );
        assert_eq!(
            authorizer.authorize(&bob, &private, &stored).await.unwrap(),
            Decision::NoOpinion
        );
        assert_eq!(
            authorizer.authorize(&globex_root, &shared, &stored).await.unwrap(),
            Decision::NoOpinion
        );
    }

    #[tokio::test]
    async fn test_should_apply_conditions_from_query_and_time() {
        let engine = engine();
        let stored = store(policy(&[
            r#"{"Effect": "Allow", "Principal": "*", "Action": "s3:ListBucket", "Resource": "arn:aws:s3:::b",
                "Condition": {"StringLike": {"s3:prefix": "home/*"}, "NumericLessThanEquals": {"s3:max-keys": "100"}}}"#,
            r#"{"Effect": "Deny", "Principal": "*", "Action": "s3:GetObject", "Resource": "arn:aws:s3:::b/*",
                "Condition": {"DateGreaterThan": {"aws:CurrentTime": "2030-01-01T00:00:00Z"}}}"#,
            ALLOW_GET,
        ]))
        .await;
        let authorizer = engine.bucket_authorizer();
        let alice = requestor(ACME, "alice");

        let list = |query: &str| Request::new(Method::GET, "/b").query(query).build();
        assert_eq!(
            authorizer
                .authorize(&alice, &list("prefix=home%2Falice&max-keys=50"), &stored)
                .await
                .unwrap(),
            Decision::Allow
        );
        assert_eq!(
            authorizer
                .authorize(&alice, &list("prefix=home%2Falice&max-keys=500"), &stored)
                .await
                .unwrap(),
            Decision::NoOpinion
        );
        // Absent keys leave non-IfExists conditions unsatisfied.
        assert_eq!(
            authorizer.authorize(&alice, &list(""), &stored).await.unwrap(),
            Decision::NoOpinion
        );

        let before = Request::new(Method::GET, "/b/k").at("2029-06-01T00:00:00Z").build();
        let after = Request::new(Method::GET, "/b/k").at("2031-06-01T00:00:00Z").build();
        assert_eq!(
            authorizer.authorize(&alice, &before, &stored).await.unwrap(),
            Decision::Allow
        );
        assert_eq!(
            authorizer.authorize(&alice, &after, &stored).await.unwrap(),
            Decision::Deny
        );
    }

    #[tokio::test]
    async fn test_should_reject_invalid_bucket_policies() {
        let validator = engine().bucket_validator();
        let cases = [
            (
                policy(&[
                    r#"{"Effect": "Allow", "Principal": "*", "Action": "s3:GetObject", "Resource": "arn:aws:s3:::b"}"#,
                ]),
                "Action does not apply to any resource(s) in statement",
            ),
            (
                r#"{"Version": "2012-10-17"}"#.to_owned(),
                "Missing required field Statement",
            ),
            (
                policy(&[
                    r#"{"Effect": "Allow", "Principal": "*", "Action": "s3:GetObject", "Resource": "arn:aws:s3:::other/*"}"#,
                ]),
                "Policy has invalid resource",
            ),
            (
                policy(&[
                    r#"{"Effect": "Allow", "Principal": {"AWS": "999999999999"}, "Action": "s3:GetObject", "Resource": "arn:aws:s3:::b/*"}"#,
                ]),
                "Invalid principal in policy",
            ),
            (
                policy(&[
                    r#"{"Effect": "Allow", "Principal": "*", "Action": "s3:Teleport", "Resource": "arn:aws:s3:::b/*"}"#,
                ]),
                "Policy has invalid action",
            ),
            (
                policy(&[
                    r#"{"Effect": "Allow", "Principal": "*", "Action": "s3:GetObject", "Resource": "arn:aws:s3:::b/*",
                        "Condition": {"StringEquals": {"s3:bogus": "x"}}}"#,
                ]),
                "Invalid Condition key : s3:bogus",
            ),
        ];

        for (document, reason) in cases {
            let err = validator.validate("b", &document).await.unwrap_err();
            assert_eq!(err.code, PolicyErrorCode::MalformedPolicy, "{document}");
            assert_eq!(err.message, reason, "{document}");
        }
    }

    #[tokio::test]
    async fn test_should_refuse_federated_wildcard_principal() {
        let engine = engine();
        let document = policy(&[
            r#"{"Effect": "Allow", "Principal": {"Federated": "*"}, "Action": "s3:GetObject", "Resource": "arn:aws:s3:::b/*"}"#,
        ]);
        let err = engine
            .bucket_validator()
            .validate("b", &document)
            .await
            .unwrap_err();
        assert_eq!(err.message, "Invalid principal in policy");

        // A document stored before validation tightened still grants nothing.
        let decision = engine
            .bucket_authorizer()
            .authorize(
                &requestor(GLOBEX, "bob"),
                &Request::new(Method::GET, "/b/secret").build(),
                &[document],
            )
            .await
            .unwrap();
        assert_eq!(decision, Decision::NoOpinion);
    }

    #[tokio::test]
    async fn test_should_check_every_resource_regardless_of_order() {
        let validator = engine().bucket_validator();
        for resources in [
            r#"["arn:aws:s3:::b/*", "arn:aws:s3:::victim/*"]"#,
            r#"["arn:aws:s3:::victim/*", "arn:aws:s3:::b/*"]"#,
            r#"["arn:aws:s3:::b/*", "not-an-arn"]"#,
        ] {
            let statement = format!(
                r#"{{"Effect": "Allow", "Principal": "*", "Action": "s3:GetObject", "Resource": {resources}}}"#
            );
            let err = validator
                .validate("b", &policy(&[&statement]))
                .await
                .unwrap_err();
            assert_eq!(err.message, "Policy has invalid resource", "{resources}");
        }
    }

    #[tokio::test]
    async fn test_should_return_same_decision_on_repeated_calls() {
        let engine = engine();
        let stored = store(policy(&[ALLOW_GET, DENY_ALL])).await;
        let authorizer = engine.bucket_authorizer();
        let alice = requestor(ACME, "alice");
        let get = Request::new(Method::GET, "/b/key1").build();

        let first = authorizer.authorize(&alice, &get, &stored).await.unwrap();
        for _ in 0..5 {
            assert_eq!(authorizer.authorize(&alice, &get, &stored).await.unwrap(), first);
        }
        // Validation is read-only as well.
        for _ in 0..2 {
            assert!(engine.bucket_validator().validate("b", &stored[0]).await.is_ok());
        }
    }

    struct OfflineDirectory;

    #[async_trait]
    impl AccountDirectory for OfflineDirectory {
        async fn find_account_by_id(&self, _: &str) -> Result<Option<Account>, DirectoryError> {
            Err(DirectoryError::Unavailable("offline".to_owned()))
        }

        async fn find_account_by_name(&self, _: &str) -> Result<Option<Account>, DirectoryError> {
            Err(DirectoryError::Unavailable("offline".to_owned()))
        }

        async fn find_account_by_canonical_id(
            &self,
            _: &str,
        ) -> Result<Option<Account>, DirectoryError> {
            Err(DirectoryError::Unavailable("offline".to_owned()))
        }
    }

    #[async_trait]
    impl UserDirectory for OfflineDirectory {
        async fn find_user_by_id(&self, _: &str) -> Result<Option<User>, DirectoryError> {
            Err(DirectoryError::Unavailable("offline".to_owned()))
        }

        async fn find_user_by_arn(&self, _: &str) -> Result<Option<User>, DirectoryError> {
            Err(DirectoryError::Unavailable("offline".to_owned()))
        }
    }

    #[tokio::test]
    async fn test_should_treat_unresolvable_principal_as_invalid() {
        let validator = BucketPolicyValidator::new(
            Arc::new(Catalogs::bundled().expect("bundled catalogs should load")),
            Arc::new(OfflineDirectory),
        );
        let document = policy(&[
            r#"{"Effect": "Allow", "Principal": {"AWS": "111122223333"}, "Action": "s3:GetObject", "Resource": "arn:aws:s3:::b/*"}"#,
        ]);
        let err = validator.validate("b", &document).await.unwrap_err();
        assert_eq!(err.message, "Invalid principal in policy");

        // Wildcard principals never reach the directory.
        assert!(validator.validate("b", &policy(&[ALLOW_GET])).await.is_ok());
    }
}
