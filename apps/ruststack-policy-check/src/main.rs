//! RustStack policy check - validate a policy and evaluate a request against it.
//!
//! Loads the action and condition catalogs the same way the server does,
//! validates one policy document, and optionally authorizes a request
//! described in a JSON fixture. Useful for smoke-testing replacement catalog
//! files before deploying them.
//!
//! # Usage
//!
//! ```text
//! ruststack-policy-check <bucket|iam> <target> <policy.json> [request.json] [--directory directory.json]
//! ```
//!
//! `target` is the bucket name for bucket policies and the policy name for
//! identity policies. The exit code is `0` when the policy is valid (and, if a
//! request is given, allowed), `1` when the policy is rejected and `2` when
//! the request is not allowed.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `POLICY_CATALOG_DIR` | *(unset)* | Directory with replacement catalog files |
//! | `POLICY_MAX_IAM_POLICY_SIZE` | `6144` | Identity-policy size limit in bytes |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod fixture;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use ruststack_iam_policy_core::authorizer::PolicyAuthorizer;
use ruststack_iam_policy_core::config::PolicyConfig;
use ruststack_iam_policy_core::provider::PolicyEngine;
use ruststack_iam_policy_core::validation::PolicyValidator;
use ruststack_iam_policy_model::AuthorizationRequestor;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::fixture::{DirectoryFixture, RequestFixture};

const USAGE: &str = "usage: ruststack-policy-check <bucket|iam> <target> <policy.json> [request.json] [--directory directory.json]";

/// Which policy class to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicyKind {
    Bucket,
    Iam,
}

/// Parsed command line.
#[derive(Debug, PartialEq, Eq)]
struct Args {
    kind: PolicyKind,
    target: String,
    policy: PathBuf,
    request: Option<PathBuf>,
    directory: Option<PathBuf>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut positional = Vec::new();
        let mut directory = None;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--directory" {
                let path = args.next().context("--directory needs a file")?;
                directory = Some(PathBuf::from(path));
            } else {
                positional.push(arg);
            }
        }

        let mut positional = positional.into_iter();
        let kind = match positional.next().as_deref() {
            Some("bucket") => PolicyKind::Bucket,
            Some("iam") => PolicyKind::Iam,
            Some(other) => bail!("unknown policy kind {other}\n{USAGE}"),
            None => bail!(USAGE),
        };
        let (Some(target), Some(policy)) = (positional.next(), positional.next()) else {
            bail!(USAGE);
        };
        let request = positional.next().map(PathBuf::from);
        if let Some(extra) = positional.next() {
            bail!("unexpected argument {extra}\n{USAGE}");
        }

        Ok(Self {
            kind,
            target,
            policy: PathBuf::from(policy),
            request,
            directory,
        })
    }
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let config = PolicyConfig::from_env();
    init_tracing(&config.log_level)?;

    let args = Args::parse(std::env::args().skip(1))?;
    let directory = match &args.directory {
        Some(path) => DirectoryFixture::load(path)?,
        None => DirectoryFixture::default(),
    };
    let engine = PolicyEngine::from_config(config, Arc::new(directory.into_directory()))
        .context("failed to load policy catalogs")?;
    info!(?engine, "policy engine ready");

    let policy = std::fs::read_to_string(&args.policy)
        .with_context(|| format!("failed to read {}", args.policy.display()))?;

    let validator: Box<dyn PolicyValidator> = match args.kind {
        PolicyKind::Bucket => Box::new(engine.bucket_validator()),
        PolicyKind::Iam => Box::new(engine.iam_validator()),
    };
    if let Err(e) = validator.validate(&args.target, &policy).await {
        println!("invalid: {e}");
        return Ok(ExitCode::from(1));
    }
    println!("valid");

    let Some(request_path) = &args.request else {
        return Ok(ExitCode::SUCCESS);
    };
    let request = RequestFixture::load(request_path)?;
    let ctx = request.context()?;
    let requestor = request.requestor();
    let decision = match args.kind {
        PolicyKind::Bucket => {
            engine
                .bucket_authorizer()
                .authorize(&requestor, &ctx, &[policy])
                .await
        }
        PolicyKind::Iam => {
            let requestor = AuthorizationRequestor {
                policy_documents: vec![policy],
                ..requestor
            };
            engine
                .iam_authorizer()
                .authorize_attached(&requestor, &ctx)
                .await
        }
    }
    .context("authorization failed")?;
    println!("decision: {decision}");

    Ok(if decision.is_allowed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        Args::parse(args.iter().map(|a| (*a).to_owned()))
    }

    #[test]
    fn test_should_parse_positional_arguments() {
        let args = parse(&["bucket", "photos", "policy.json"]).unwrap();
        assert_eq!(args.kind, PolicyKind::Bucket);
        assert_eq!(args.target, "photos");
        assert_eq!(args.policy, PathBuf::from("policy.json"));
        assert!(args.request.is_none());
        assert!(args.directory.is_none());
    }

    #[test]
    fn test_should_parse_request_and_directory() {
        let args = parse(&[
            "iam",
            "--directory",
            "dir.json",
            "readonly",
            "policy.json",
            "request.json",
        ])
        .unwrap();
        assert_eq!(args.kind, PolicyKind::Iam);
        assert_eq!(args.target, "readonly");
        assert_eq!(args.request, Some(PathBuf::from("request.json")));
        assert_eq!(args.directory, Some(PathBuf::from("dir.json")));
    }

    #[test]
    fn test_should_reject_bad_arguments() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["role", "t", "p.json"]).is_err());
        assert!(parse(&["bucket", "t"]).is_err());
        assert!(parse(&["bucket", "t", "p.json", "r.json", "extra"]).is_err());
        assert!(parse(&["bucket", "t", "p.json", "--directory"]).is_err());
    }
}
