use indexmap::IndexMap;
use std::collections::BTreeSet;

use super::InlineCheck;
use crate::error::{ReleasabilityError, Result};

/// Checks run by the remote worker pool. Workers report with exactly these names.
pub const DEFAULT_DISPATCHED_CHECKS: [&str; 8] = [
    "CheckDependencies",
    "QA",
    "Jira",
    "CheckPeacheeLanguagesStatistics",
    "QualityGate",
    "ParentPOM",
    "GitHub",
    "CheckManifestValues",
];

/// Catalog of known checks: dispatched names plus inline implementations.
///
/// Populated once before the orchestrator is built, read-only afterwards.
#[derive(Debug)]
pub struct CheckRegistry {
    dispatched: BTreeSet<String>,
    inline: IndexMap<String, Box<dyn InlineCheck>>,
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_DISPATCHED_CHECKS.iter().map(|name| name.to_string()))
    }
}

impl CheckRegistry {
    pub fn new(dispatched: impl IntoIterator<Item = String>) -> Self {
        Self {
            dispatched: dispatched.into_iter().collect(),
            inline: IndexMap::new(),
        }
    }

    pub fn register_inline_check(&mut self, check: Box<dyn InlineCheck>) -> Result<()> {
        let name = check.name().to_string();
        if self.dispatched.contains(&name) || self.inline.contains_key(&name) {
            return Err(ReleasabilityError::DuplicateCheck(name));
        }
        self.inline.insert(name, check);
        Ok(())
    }

    pub fn get_inline_check(&self, name: &str) -> Option<&dyn InlineCheck> {
        self.inline.get(name).map(|check| &**check)
    }

    /// Inline checks in registration order
    pub fn inline_checks(&self) -> impl Iterator<Item = (&str, &dyn InlineCheck)> {
        self.inline.iter().map(|(name, check)| (name.as_str(), &**check))
    }

    pub fn inline_check_names(&self) -> Vec<&str> {
        self.inline.keys().map(String::as_str).collect()
    }

    pub fn dispatched_check_names(&self) -> &BTreeSet<String> {
        &self.dispatched
    }

    pub fn all_check_names(&self) -> BTreeSet<String> {
        self.dispatched
            .iter()
            .cloned()
            .chain(self.inline.keys().cloned())
            .collect()
    }

    pub fn is_inline_check(&self, name: &str) -> bool {
        self.inline.contains_key(name)
    }

    pub fn is_dispatched_check(&self, name: &str) -> bool {
        self.dispatched.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckContext, CheckResult};

    struct Named(&'static str);

    impl InlineCheck for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn execute(&self, _context: &CheckContext) -> anyhow::Result<CheckResult> {
            Ok(CheckResult::passed_with(self.0, "ok"))
        }
    }

    #[test]
    fn test_default_dispatched_checks() {
        let registry = CheckRegistry::default();
        assert_eq!(registry.dispatched_check_names().len(), 8);
        assert!(registry.is_dispatched_check("QA"));
        assert!(!registry.is_inline_check("QA"));
        assert!(registry.inline_check_names().is_empty());
    }

    #[test]
    fn test_register_inline_check() {
        let mut registry = CheckRegistry::default();
        registry.register_inline_check(Box::new(Named("CheckLicenses"))).unwrap();

        assert!(registry.is_inline_check("CheckLicenses"));
        assert!(!registry.is_dispatched_check("CheckLicenses"));
        assert_eq!(registry.get_inline_check("CheckLicenses").unwrap().name(), "CheckLicenses");
        assert!(registry.get_inline_check("Missing").is_none());
        assert_eq!(registry.all_check_names().len(), 9);
    }

    #[test]
    fn test_names_stay_disjoint() {
        let mut registry = CheckRegistry::default();
        registry.register_inline_check(Box::new(Named("CheckLicenses"))).unwrap();

        let duplicate = registry.register_inline_check(Box::new(Named("CheckLicenses")));
        assert!(matches!(duplicate, Err(ReleasabilityError::DuplicateCheck(name)) if name == "CheckLicenses"));

        let clash = registry.register_inline_check(Box::new(Named("QA")));
        assert!(clash.is_err());
        assert_eq!(registry.inline_check_names(), vec!["CheckLicenses"]);
    }

    #[test]
    fn test_inline_checks_keep_registration_order() {
        let mut registry = CheckRegistry::new(Vec::new());
        registry.register_inline_check(Box::new(Named("Zeta"))).unwrap();
        registry.register_inline_check(Box::new(Named("Alpha"))).unwrap();

        let names: Vec<&str> = registry.inline_checks().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
    }
}
