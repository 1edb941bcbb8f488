//! Identity policy scenarios.

#[cfg(test)]
mod tests {
    use http::Method;
    use ruststack_iam_policy_core::authorizer::PolicyAuthorizer;
    use ruststack_iam_policy_core::validation::PolicyValidator;
    use ruststack_iam_policy_model::{Decision, PolicyErrorCode};

    use crate::{ACME, GLOBEX, Request, engine, policy, requestor};

    fn iam_call(action: &str) -> Request {
        Request::new(Method::POST, "/").attribute("Action", action)
    }

    #[tokio::test]
    async fn test_should_reject_oversized_identity_policy() {
        let sid = "S".repeat(7000);
        let document = format!(
            r#"{{"Version": "2012-10-17", "Statement": [{{"Sid": "{sid}", "Effect": "Allow", "Action": "iam:GetUser", "Resource": "*"}}]}}"#
        );
        let err = engine()
            .iam_validator()
            .validate("big", &document)
            .await
            .unwrap_err();
        assert_eq!(err.code, PolicyErrorCode::LimitExceeded);
        assert_eq!(err.message, "Cannot exceed quota for PolicySize: 6144");
        assert_eq!(err.status_code(), http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_should_reject_malformed_identity_policies() {
        let validator = engine().iam_validator();
        let cases = [
            (
                r#"{"Statement": [{"Effect": "Allow", "Action": "iam:GetUser", "Resource": "*"}]}"#
                    .to_owned(),
                "Syntax errors in policy.",
            ),
            (
                r#"{"Version": "2012-10-17", "Statement": []}"#.to_owned(),
                "Missing required field Statement",
            ),
            (
                policy(&[
                    r#"{"Sid": "a", "Effect": "Allow", "Action": "iam:GetUser", "Resource": "*"}"#,
                    r#"{"Sid": "a", "Effect": "Deny", "Action": "iam:GetUser", "Resource": "*"}"#,
                ]),
                "Statement IDs (SID) in a single policy must be unique.",
            ),
            (
                policy(&[r#"{"Effect": "Permit", "Action": "iam:GetUser", "Resource": "*"}"#]),
                "Invalid effect : Permit",
            ),
            (
                policy(&[r#"{"Effect": "Allow", "Action": "iam:Levitate", "Resource": "*"}"#]),
                "Policy has invalid action",
            ),
            (
                policy(&[r#"{"Effect": "Allow", "Action": "iam:GetUser", "Resource": "users"}"#]),
                "Policy has invalid resource",
            ),
        ];

        for (document, reason) in cases {
            let err = validator.validate("p", &document).await.unwrap_err();
            assert_eq!(err.code, PolicyErrorCode::MalformedPolicy, "{document}");
            assert_eq!(err.message, reason, "{document}");
        }
    }

    #[tokio::test]
    async fn test_should_authorize_identity_actions_on_users() {
        let engine = engine();
        let document = policy(&[
            r#"{"Effect": "Allow", "Action": ["iam:CreateUser", "iam:GetUser"], "Resource": "arn:aws:iam::111122223333:user/team-*"}"#,
            r#"{"Effect": "Deny", "Action": "iam:CreateUser", "Resource": "arn:aws:iam::111122223333:user/team-admin"}"#,
        ]);
        engine
            .iam_validator()
            .validate("user-admin", &document)
            .await
            .expect("policy should validate");
        let stored = vec![document];
        let authorizer = engine.iam_authorizer();
        let alice = requestor(ACME, "alice");

        let create = |name: &str| iam_call("CreateUser").attribute("UserName", name).build();
        assert_eq!(
            authorizer.authorize(&alice, &create("team-red"), &stored).await.unwrap(),
            Decision::Allow
        );
        assert_eq!(
            authorizer.authorize(&alice, &create("team-admin"), &stored).await.unwrap(),
            Decision::Deny
        );
        assert_eq!(
            authorizer.authorize(&alice, &create("ops"), &stored).await.unwrap(),
            Decision::NoOpinion
        );
    }

    #[tokio::test]
    async fn test_should_not_reach_storage_through_identity_resources() {
        let engine = engine();
        let document = policy(&[
            r#"{"Effect": "Allow", "Action": ["iam:*", "s3:GetObject"], "Resource": "arn:aws:iam::111122223333:user/*"}"#,
        ]);
        engine
            .iam_validator()
            .validate("p", &document)
            .await
            .expect("policy should validate");
        let stored = vec![document];
        let authorizer = engine.iam_authorizer();
        let alice = requestor(ACME, "alice");

        let read = Request::new(Method::GET, "/user/payroll.csv").build();
        assert_eq!(
            authorizer.authorize(&alice, &read, &stored).await.unwrap(),
            Decision::NoOpinion
        );
        let get_user = iam_call("GetUser").build();
        assert_eq!(
            authorizer.authorize(&alice, &get_user, &stored).await.unwrap(),
            Decision::Allow
        );
    }

    #[tokio::test]
    async fn test_should_scope_named_users_to_requestor_account() {
        let stored = vec![policy(&[
            r#"{"Effect": "Allow", "Action": "iam:DeleteUser", "Resource": "arn:aws:iam::444455556666:user/bob"}"#,
        ])];
        let delete_bob = iam_call("DeleteUser").attribute("UserName", "bob").build();
        let authorizer = engine().iam_authorizer();

        let acme_alice = authorizer
            .authorize(&requestor(ACME, "alice"), &delete_bob, &stored)
            .await
            .unwrap();
        assert_eq!(acme_alice, Decision::NoOpinion);

        let globex_bob = authorizer
            .authorize(&requestor(GLOBEX, "bob"), &delete_bob, &stored)
            .await
            .unwrap();
        assert_eq!(globex_bob, Decision::Allow);
    }

    #[tokio::test]
    async fn test_should_combine_identity_policies_with_deny_precedence() {
        let engine = engine();
        let admin = policy(&[r#"{"Effect": "Allow", "Action": "*", "Resource": "*"}"#]);
        let no_storage_writes = policy(&[
            r#"{"Effect": "Deny", "Action": ["s3:Put*", "s3:Delete*"], "Resource": "arn:aws:s3:::*"}"#,
        ]);
        for document in [&admin, &no_storage_writes] {
            engine
                .iam_validator()
                .validate("p", document)
                .await
                .expect("policy should validate");
        }
        let stored = vec![admin, no_storage_writes];
        let authorizer = engine.iam_authorizer();
        let alice = requestor(ACME, "alice");

        let read = Request::new(Method::GET, "/b/k").build();
        let write = Request::new(Method::PUT, "/b/k").build();
        let list_users = iam_call("ListUsers").build();
        assert_eq!(
            authorizer.authorize(&alice, &read, &stored).await.unwrap(),
            Decision::Allow
        );
        assert_eq!(
            authorizer.authorize(&alice, &write, &stored).await.unwrap(),
            Decision::Deny
        );
        assert_eq!(
            authorizer.authorize(&alice, &list_users, &stored).await.unwrap(),
            Decision::Allow
        );
    }

    #[tokio::test]
    async fn test_should_use_explicit_storage_action_parameter() {
        let engine = engine();
        let stored = vec![policy(&[
            r#"{"Effect": "Allow", "Action": "s3:GetObject", "Resource": "arn:aws:s3:::b/*"}"#,
        ])];
        let forwarded = Request::new(Method::POST, "/b/k")
            .attribute("Action", "AuthorizeUser")
            .attribute("S3Action", "GetObject")
            .build();
        let decision = engine
            .iam_authorizer()
            .authorize(&requestor(ACME, "alice"), &forwarded, &stored)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Allow);
    }
}
