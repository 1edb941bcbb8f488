//! Condition evaluation.
//!
//! A statement's `Condition` block is flattened by the model into
//! [`ConditionEntry`] values. [`Condition::create`] turns an entry into a
//! typed evaluator; [`Condition::is_satisfied`] evaluates it against a
//! [`RequestContext`].
//!
//! Every operator except `Null` fails when the request lacks the attribute,
//! unless the type carries the `IfExists` suffix, in which case absence
//! satisfies the condition.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use ruststack_iam_policy_model::{ConditionEntry, RequestContext};
use tracing::{debug, warn};

use crate::pattern;

const IF_EXISTS_SUFFIX: &str = "IfExists";
const CURRENT_TIME_KEY: &str = "aws:CurrentTime";
const EPOCH_TIME_KEY: &str = "aws:EpochTime";

/// String comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOperator {
    /// Exact match.
    Equals,
    /// Exact match ignoring case.
    EqualsIgnoreCase,
    /// Wildcard match.
    Like,
    /// No value matches exactly.
    NotEquals,
    /// No value matches ignoring case.
    NotEqualsIgnoreCase,
    /// No value matches as a wildcard.
    NotLike,
}

impl StringOperator {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "StringEquals" => Self::Equals,
            "StringEqualsIgnoreCase" => Self::EqualsIgnoreCase,
            "StringLike" => Self::Like,
            "StringNotEquals" => Self::NotEquals,
            "StringNotEqualsIgnoreCase" => Self::NotEqualsIgnoreCase,
            "StringNotLike" => Self::NotLike,
            _ => return None,
        })
    }

    fn is_negated(self) -> bool {
        matches!(
            self,
            Self::NotEquals | Self::NotEqualsIgnoreCase | Self::NotLike
        )
    }

    fn compare(self, attribute: &str, value: &str) -> bool {
        match self {
            Self::Equals | Self::NotEquals => attribute == value,
            Self::EqualsIgnoreCase | Self::NotEqualsIgnoreCase => {
                attribute.to_lowercase() == value.to_lowercase()
            }
            Self::Like | Self::NotLike => pattern::matches(attribute, value),
        }
    }
}

/// Ordered comparison operators shared by the numeric and date families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedOperator {
    /// Attribute equals a value.
    Equals,
    /// Attribute differs from every value.
    NotEquals,
    /// Attribute is below a value.
    LessThan,
    /// Attribute is at most a value.
    LessThanEquals,
    /// Attribute is above a value.
    GreaterThan,
    /// Attribute is at least a value.
    GreaterThanEquals,
}

impl OrderedOperator {
    fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "Equals" => Self::Equals,
            "NotEquals" => Self::NotEquals,
            "LessThan" => Self::LessThan,
            "LessThanEquals" => Self::LessThanEquals,
            "GreaterThan" => Self::GreaterThan,
            "GreaterThanEquals" => Self::GreaterThanEquals,
            _ => return None,
        })
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Equals => ordering.is_eq(),
            Self::NotEquals => ordering.is_ne(),
            Self::LessThan => ordering.is_lt(),
            Self::LessThanEquals => ordering.is_le(),
            Self::GreaterThan => ordering.is_gt(),
            Self::GreaterThanEquals => ordering.is_ge(),
        }
    }

    /// Apply to a parsed attribute and parsed values. `NotEquals` must hold
    /// against every value, the others against at least one.
    fn evaluate<T: PartialOrd>(self, attribute: &T, values: &[T]) -> bool {
        let holds = |v: &T| attribute.partial_cmp(v).is_some_and(|o| self.holds(o));
        if self == Self::NotEquals {
            values.iter().all(holds)
        } else {
            values.iter().any(holds)
        }
    }
}

/// A typed condition evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `String*` family.
    String {
        /// Comparison.
        op: StringOperator,
        /// Whether absence satisfies the condition.
        if_exists: bool,
        /// Condition key.
        key: String,
        /// Values to compare against.
        values: Vec<String>,
    },
    /// `Numeric*` family.
    Numeric {
        /// Comparison.
        op: OrderedOperator,
        /// Whether absence satisfies the condition.
        if_exists: bool,
        /// Condition key.
        key: String,
        /// Values to compare against.
        values: Vec<String>,
    },
    /// `Date*` family.
    Date {
        /// Comparison.
        op: OrderedOperator,
        /// Whether absence satisfies the condition.
        if_exists: bool,
        /// Condition key.
        key: String,
        /// Values to compare against.
        values: Vec<String>,
    },
    /// `Bool` / `BoolIfExists`.
    Boolean {
        /// Whether absence satisfies the condition.
        if_exists: bool,
        /// Condition key.
        key: String,
        /// Values to compare against.
        values: Vec<String>,
    },
    /// `Null`: tests presence of the key.
    Null {
        /// Condition key.
        key: String,
        /// `"true"` to require absence, `"false"` to require presence.
        values: Vec<String>,
    },
}

impl Condition {
    /// Build the evaluator for a comparison type.
    ///
    /// Families are tried in order String, Date, Numeric, Boolean, Null.
    /// Returns `None` for a type no family evaluates (including valid catalog
    /// types such as `IpAddress` or `ArnLike`).
    ///
    /// # Examples
    ///
    /// ```
    /// use ruststack_iam_policy_core::condition::{Condition, StringOperator};
    ///
    /// let condition = Condition::create("StringLikeIfExists", "s3:prefix", vec!["home/*".into()]);
    /// assert!(matches!(
    ///     condition,
    ///     Some(Condition::String { op: StringOperator::Like, if_exists: true, .. })
    /// ));
    /// assert!(Condition::create("IpAddress", "aws:SourceIp", vec![]).is_none());
    /// ```
    #[must_use]
    pub fn create(condition_type: &str, key: &str, values: Vec<String>) -> Option<Self> {
        let (base, if_exists) = match condition_type.strip_suffix(IF_EXISTS_SUFFIX) {
            Some(base) => (base, true),
            None => (condition_type, false),
        };
        let key = key.to_owned();

        if let Some(op) = StringOperator::from_name(base) {
            return Some(Self::String {
                op,
                if_exists,
                key,
                values,
            });
        }
        if let Some(op) = base.strip_prefix("Date").and_then(OrderedOperator::from_suffix) {
            return Some(Self::Date {
                op,
                if_exists,
                key,
                values,
            });
        }
        if let Some(op) = base
            .strip_prefix("Numeric")
            .and_then(OrderedOperator::from_suffix)
        {
            return Some(Self::Numeric {
                op,
                if_exists,
                key,
                values,
            });
        }
        match (base, if_exists) {
            ("Bool", _) => Some(Self::Boolean {
                if_exists,
                key,
                values,
            }),
            ("Null", false) => Some(Self::Null { key, values }),
            _ => None,
        }
    }

    /// Build the evaluator for a flattened policy condition.
    #[must_use]
    pub fn from_entry(entry: &ConditionEntry) -> Option<Self> {
        Self::create(&entry.condition_type, &entry.key, entry.values.clone())
    }

    /// Condition key.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::String { key, .. }
            | Self::Numeric { key, .. }
            | Self::Date { key, .. }
            | Self::Boolean { key, .. }
            | Self::Null { key, .. } => key,
        }
    }

    /// Whether the request satisfies this condition.
    #[must_use]
    pub fn is_satisfied(&self, ctx: &RequestContext) -> bool {
        let attribute = lookup_attribute(ctx, self.key());

        match self {
            Self::Null { values, .. } => values.iter().any(|v| match parse_bool(v) {
                Some(true) => attribute.is_none(),
                Some(false) => attribute.is_some(),
                None => false,
            }),
            Self::String {
                if_exists: true, ..
            }
            | Self::Numeric {
                if_exists: true, ..
            }
            | Self::Date {
                if_exists: true, ..
            }
            | Self::Boolean {
                if_exists: true, ..
            } if attribute.is_none() => true,
            _ => {
                let Some(attribute) = attribute else {
                    return false;
                };
                self.compare(&attribute)
            }
        }
    }

    fn compare(&self, attribute: &str) -> bool {
        match self {
            Self::String { op, values, .. } => {
                let any = values.iter().any(|v| op.compare(attribute, v));
                if op.is_negated() { !any } else { any }
            }
            Self::Numeric { op, values, .. } => {
                match (parse_number(attribute), parse_all(values, parse_number)) {
                    (Some(attribute), Some(values)) => op.evaluate(&attribute, &values),
                    _ => false,
                }
            }
            Self::Date { op, values, .. } => {
                match (parse_date(attribute), parse_all(values, parse_date)) {
                    (Some(attribute), Some(values)) => op.evaluate(&attribute, &values),
                    _ => false,
                }
            }
            Self::Boolean { values, .. } => parse_bool(attribute)
                .is_some_and(|attribute| values.iter().any(|v| parse_bool(v) == Some(attribute))),
            Self::Null { .. } => false,
        }
    }
}

/// Whether every condition of a statement holds.
///
/// A condition type that cannot be evaluated makes the statement not apply.
#[must_use]
pub fn all_satisfied(entries: &[ConditionEntry], ctx: &RequestContext) -> bool {
    entries.iter().all(|entry| match Condition::from_entry(entry) {
        Some(condition) => {
            let satisfied = condition.is_satisfied(ctx);
            debug!(
                condition_type = %entry.condition_type,
                key = %entry.key,
                satisfied,
                "evaluated condition"
            );
            satisfied
        }
        None => {
            warn!(
                condition_type = %entry.condition_type,
                key = %entry.key,
                "unsupported condition type, statement does not apply"
            );
            false
        }
    })
}

/// Find the request attribute a condition key refers to.
///
/// Tries the full key, then the key without its service prefix
/// (`s3:x-amz-acl` is the `x-amz-acl` header), first among attributes and then
/// among query parameters. `aws:CurrentTime` and `aws:EpochTime` default to
/// the request time.
fn lookup_attribute(ctx: &RequestContext, key: &str) -> Option<String> {
    let unprefixed = key.split_once(':').map(|(_, rest)| rest);

    let found = ctx
        .attribute(key)
        .or_else(|| unprefixed.and_then(|k| ctx.attribute(k)))
        .map(str::to_owned)
        .or_else(|| ctx.query_param(key))
        .or_else(|| unprefixed.and_then(|k| ctx.query_param(k)));
    if found.is_some() {
        return found;
    }

    if key.eq_ignore_ascii_case(CURRENT_TIME_KEY) {
        Some(ctx.request_time().to_rfc3339())
    } else if key.eq_ignore_ascii_case(EPOCH_TIME_KEY) {
        Some(ctx.request_time().timestamp().to_string())
    } else {
        None
    }
}

fn parse_all<T>(values: &[String], parse: impl Fn(&str) -> Option<T>) -> Option<Vec<T>> {
    if values.is_empty() {
        return None;
    }
    values.iter().map(|v| parse(v)).collect()
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| !n.is_nan())
}

fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// RFC 3339 timestamp, whole epoch seconds, or a bare `YYYY-MM-DD` date.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(secs) = value.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
