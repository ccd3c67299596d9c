//! Policy identity.
//!
//! The host gives no stable per-check ID, so one is derived from the fields
//! that describe the check:
//!
//! ```text
//! {source}/{fnv1a64(query)}/{group}/{name}/{strategy.name}
//! ```
//!
//! The query is hashed because it can be arbitrarily long. In the other
//! fields `%` and `/` are percent-encoded (`%25`, `%2F`), so a separator
//! inside a field cannot make two different checks collide.

use std::borrow::Cow;
use std::fmt;

use crate::types::ScalingCheck;

/// Derived key identifying one recurring scaling check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyKey(String);

impl PolicyKey {
    /// Derive the key for a scaling check.
    pub fn derive(check: &ScalingCheck) -> Self {
        Self(format!(
            "{}/{}/{}/{}/{}",
            escape_segment(&check.source),
            fnv1a64(&check.query),
            escape_segment(&check.group),
            escape_segment(&check.name),
            escape_segment(&check.strategy.name)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PolicyKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Percent-encode the key separator and the escape character itself.
fn escape_segment(field: &str) -> Cow<'_, str> {
    if !field.contains(['%', '/']) {
        return Cow::Borrowed(field);
    }
    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// FNV-1a 64-bit.
pub fn fnv1a64(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CheckStrategy;

    fn check(query: &str, name: &str) -> ScalingCheck {
        ScalingCheck {
            source: "gitlab-ci".to_string(),
            query: query.to_string(),
            group: "runners".to_string(),
            name: name.to_string(),
            strategy: CheckStrategy {
                name: "pid".to_string(),
                config: Default::default(),
            },
        }
    }

    #[test]
    fn fnv1a64_known_vectors() {
        assert_eq!(fnv1a64(""), 0xcbf29ce484222325);
        assert_eq!(fnv1a64("a"), 0xaf63dc4c8601ec8c);
        assert_eq!(fnv1a64("foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn key_layout() {
        let key = PolicyKey::derive(&check("", "pending-jobs"));
        assert_eq!(
            key.as_str(),
            "gitlab-ci/14695981039346656037/runners/pending-jobs/pid"
        );
    }

    #[test]
    fn same_check_same_key() {
        let a = PolicyKey::derive(&check("pending_jobs{tag=\"x\"}", "jobs"));
        let b = PolicyKey::derive(&check("pending_jobs{tag=\"x\"}", "jobs"));
        assert_eq!(a, b);
    }

    #[test]
    fn different_checks_different_keys() {
        let base = PolicyKey::derive(&check("q1", "jobs"));
        assert_ne!(base, PolicyKey::derive(&check("q2", "jobs")));
        assert_ne!(base, PolicyKey::derive(&check("q1", "other")));
    }

    #[test]
    fn separator_inside_a_field_is_escaped() {
        let mut a = check("q", "jobs");
        a.source = "a/b".to_string();
        a.group = "c".to_string();
        let mut b = check("q", "jobs");
        b.source = "a".to_string();
        b.group = "b/c".to_string();

        let (ka, kb) = (PolicyKey::derive(&a), PolicyKey::derive(&b));
        assert_ne!(ka, kb);
        assert!(ka.as_str().starts_with("a%2Fb/"));
        assert!(kb.as_str().contains("/b%2Fc/"));
    }

    #[test]
    fn escape_character_is_escaped() {
        let mut a = check("q", "x%2Fy");
        let mut b = check("q", "x/y");
        a.source = "s".to_string();
        b.source = "s".to_string();
        assert_ne!(PolicyKey::derive(&a), PolicyKey::derive(&b));
        assert!(PolicyKey::derive(&a).as_str().contains("/x%252Fy/"));
    }

    #[test]
    fn per_check_config_does_not_affect_key() {
        let a = check("q", "jobs");
        let mut b = a.clone();
        b.strategy.config.insert("target".to_string(), "5".to_string());
        assert_eq!(PolicyKey::derive(&a), PolicyKey::derive(&b));
    }
}
