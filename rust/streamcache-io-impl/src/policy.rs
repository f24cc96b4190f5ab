//! Spill decisions.

use std::sync::Arc;

use streamcache_io::SpoolRule;

use crate::config::SpoolConfiguration;

/// Spools once the content reaches `threshold` bytes.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdSpoolRule {
    threshold: u64,
}

impl ThresholdSpoolRule {
    pub fn new(threshold: u64) -> ThresholdSpoolRule {
        ThresholdSpoolRule { threshold }
    }
}

impl SpoolRule for ThresholdSpoolRule {
    fn should_spool(&self, length: u64) -> bool {
        length >= self.threshold
    }
}

/// Decides whether (and when) a coordinator moves its content to disk.
///
/// The built-in threshold rule is always consulted first; custom rules added
/// through the caching strategy are combined with it either conjunctively
/// (the default) or disjunctively (`any_spool_rules`).
///
/// A negative threshold, or disabled spooling, turns the policy into
/// memory-only mode: [`should_spill`](SpoolPolicy::should_spill) never returns
/// `true`, whatever the custom rules say. Memory usage is then unbounded.
#[derive(Debug, Clone)]
pub struct SpoolPolicy {
    threshold: Option<ThresholdSpoolRule>,
    any_spool_rules: bool,
    rules: Arc<[Arc<dyn SpoolRule>]>,
}

impl SpoolPolicy {
    pub fn from_config(config: &SpoolConfiguration, rules: &[Arc<dyn SpoolRule>]) -> SpoolPolicy {
        let threshold = config
            .is_spooling_possible()
            .then(|| ThresholdSpoolRule::new(config.spool_threshold as u64));
        SpoolPolicy {
            threshold,
            any_spool_rules: config.any_spool_rules,
            rules: rules.into(),
        }
    }

    pub fn memory_only() -> SpoolPolicy {
        SpoolPolicy {
            threshold: None,
            any_spool_rules: false,
            rules: Vec::new().into(),
        }
    }

    pub fn is_memory_only(&self) -> bool {
        self.threshold.is_none()
    }

    /// Whether content reaching `length` bytes should be spilled to disk.
    pub fn should_spill(&self, length: u64) -> bool {
        let Some(threshold) = &self.threshold else {
            return false;
        };
        let by_threshold = threshold.should_spool(length);
        let mut by_rules = self.rules.iter().map(|rule| rule.should_spool(length));
        if self.any_spool_rules {
            by_threshold || by_rules.any(|spool| spool)
        } else {
            by_threshold && by_rules.all(|spool| spool)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use streamcache_io::SpoolRule;

    use super::SpoolPolicy;
    use crate::config::SpoolConfiguration;

    #[derive(Debug)]
    struct Always(bool);

    impl SpoolRule for Always {
        fn should_spool(&self, _length: u64) -> bool {
            self.0
        }
    }

    #[test]
    fn test_threshold_boundary() {
        let policy = SpoolPolicy::from_config(&SpoolConfiguration::default().with_threshold(16), &[]);
        assert!(!policy.should_spill(0));
        assert!(!policy.should_spill(15));
        assert!(policy.should_spill(16));
        assert!(policy.should_spill(1000));
    }

    #[test]
    fn test_zero_threshold_spills_any_content() {
        let policy = SpoolPolicy::from_config(&SpoolConfiguration::default().with_threshold(0), &[]);
        assert!(!policy.is_memory_only());
        assert!(policy.should_spill(1));
    }

    #[test]
    fn test_negative_threshold_is_memory_only() {
        let rules: Vec<Arc<dyn SpoolRule>> = vec![Arc::new(Always(true))];
        let config = SpoolConfiguration::default()
            .with_threshold(-1)
            .with_any_spool_rules(true);
        let policy = SpoolPolicy::from_config(&config, &rules);
        assert!(policy.is_memory_only());
        assert!(!policy.should_spill(u64::MAX));

        let disabled = SpoolConfiguration::default().with_spool_enabled(false);
        assert!(!SpoolPolicy::from_config(&disabled, &[]).should_spill(u64::MAX));
        assert!(!SpoolPolicy::memory_only().should_spill(u64::MAX));
    }

    #[test]
    fn test_all_rules_must_agree_by_default() {
        let rules: Vec<Arc<dyn SpoolRule>> = vec![Arc::new(Always(false))];
        let policy = SpoolPolicy::from_config(&SpoolConfiguration::default().with_threshold(16), &rules);
        assert!(!policy.should_spill(1000));
    }

    #[test]
    fn test_any_rule_may_trigger() {
        let rules: Vec<Arc<dyn SpoolRule>> = vec![Arc::new(Always(true))];
        let config = SpoolConfiguration::default()
            .with_threshold(16)
            .with_any_spool_rules(true);
        let policy = SpoolPolicy::from_config(&config, &rules);
        assert!(policy.should_spill(1));

        let rules: Vec<Arc<dyn SpoolRule>> = vec![Arc::new(Always(false))];
        let policy = SpoolPolicy::from_config(&config, &rules);
        assert!(!policy.should_spill(15));
        assert!(policy.should_spill(16));
    }
}
