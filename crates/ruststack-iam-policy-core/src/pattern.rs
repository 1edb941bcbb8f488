//! Policy wildcard matching.
//!
//! Policies use two wildcards in action names, resource ARNs and `*Like`
//! condition values: `*` matches zero or more characters, `?` matches exactly
//! one. Matching is case-sensitive and anchored at both ends.
//!
//! The matcher fills a dynamic-programming table row by row, so the cost is
//! always `O(len(candidate) * len(pattern))` no matter how many `*` a policy
//! author writes.

/// Whether `candidate` matches the wildcard `pattern` in full.
///
/// # Examples
///
/// ```
/// use ruststack_iam_policy_core::pattern::matches;
///
/// assert!(matches("abcdef", "a?c*f"));
/// assert!(matches("", "*"));
/// assert!(!matches("x", ""));
/// assert!(!matches("GetObject", "get*"));
/// ```
#[must_use]
pub fn matches(candidate: &str, pattern: &str) -> bool {
    let text: Vec<char> = candidate.chars().collect();
    let pat: Vec<char> = pattern.chars().collect();

    // prev[j]: text[..i-1] matches pat[..j]; cur[j]: text[..i] matches pat[..j].
    let mut prev = vec![false; pat.len() + 1];
    prev[0] = true;
    for j in 1..=pat.len() {
        prev[j] = prev[j - 1] && pat[j - 1] == '*';
    }

    let mut cur = vec![false; pat.len() + 1];
    for &c in &text {
        cur[0] = false;
        for j in 1..=pat.len() {
            cur[j] = match pat[j - 1] {
                '*' => cur[j - 1] || prev[j],
                '?' => prev[j - 1],
                p => prev[j - 1] && p == c,
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[pat.len()]
}

/// Case-insensitive variant of [`matches`], used for action names.
#[must_use]
pub fn matches_ignore_case(candidate: &str, pattern: &str) -> bool {
    matches(&candidate.to_lowercase(), &pattern.to_lowercase())
}
