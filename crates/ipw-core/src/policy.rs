//! Policy predicates over the immutable [`PolicyConfig`].

use crate::config::PolicyConfig;

impl PolicyConfig {
    /// True iff `registry`, with trailing `/` separators stripped, is exactly
    /// a whitelist entry. Case-sensitive; no prefix or substring matching.
    pub fn is_whitelisted(&self, registry: &str) -> bool {
        let registry = registry.trim_end_matches('/');
        self.whitelist.iter().any(|entry| entry == registry)
    }

    /// True iff `namespace` is exactly an excluded namespace.
    pub fn is_excluded_namespace(&self, namespace: &str) -> bool {
        self.excluded_namespaces.iter().any(|ns| ns == namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PolicyConfig {
        PolicyConfig::default()
            .with_registry("harbor.it.org")
            .with_excluded_namespace("kube-system")
    }

    #[test]
    fn test_whitelist_strips_trailing_separator() {
        let policy = policy();
        assert!(policy.is_whitelisted("harbor.it.org/"));
        assert!(policy.is_whitelisted("harbor.it.org"));
    }

    #[test]
    fn test_whitelist_is_exact() {
        let policy = policy();
        assert!(!policy.is_whitelisted("other.io/"));
        assert!(!policy.is_whitelisted("harbor.it.org.evil.io/"));
        assert!(!policy.is_whitelisted("sub.harbor.it.org/"));
        assert!(!policy.is_whitelisted("HARBOR.IT.ORG/"));
        assert!(!policy.is_whitelisted("harbor.it.org/team/"));
    }

    #[test]
    fn test_empty_registry_not_whitelisted() {
        assert!(!policy().is_whitelisted(""));
    }

    #[test]
    fn test_excluded_namespace_exact() {
        let policy = policy();
        assert!(policy.is_excluded_namespace("kube-system"));
        assert!(!policy.is_excluded_namespace("kube"));
        assert!(!policy.is_excluded_namespace("default"));
    }
}
