//! Authorization decision.

use std::fmt;

use crate::policy::Effect;

/// Outcome of evaluating one or more policy documents against a request.
///
/// [`Decision::NoOpinion`] means no statement applied. Callers must treat it
/// as an implicit deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Decision {
    /// A matching statement allowed the request and nothing denied it.
    Allow,
    /// A matching statement explicitly denied the request.
    Deny,
    /// No statement matched.
    #[default]
    NoOpinion,
}

impl Decision {
    /// Combine two decisions with explicit-deny precedence.
    ///
    /// `Deny` absorbs everything, `Allow` beats `NoOpinion`. The operation is
    /// commutative and associative, so statement order never changes the
    /// folded result.
    ///
    /// # Examples
    ///
    /// ```
    /// use ruststack_iam_policy_model::Decision;
    ///
    /// assert_eq!(Decision::Allow.combine(Decision::Deny), Decision::Deny);
    /// assert_eq!(Decision::NoOpinion.combine(Decision::Allow), Decision::Allow);
    /// ```
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Deny, _) | (_, Self::Deny) => Self::Deny,
            (Self::Allow, _) | (_, Self::Allow) => Self::Allow,
            (Self::NoOpinion, Self::NoOpinion) => Self::NoOpinion,
        }
    }

    /// Whether the request may proceed.
    #[must_use]
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }

    /// Returns the decision name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::Deny => "Deny",
            Self::NoOpinion => "NoOpinion",
        }
    }
}

impl From<Effect> for Decision {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Allow => Self::Allow,
            Effect::Deny => Self::Deny,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
