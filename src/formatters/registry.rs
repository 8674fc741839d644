//! Pattern registry: match rules to handlers.
//!
//! Built once at startup by explicit [`PatternRegistry::register`] calls and
//! read-only afterwards. Workers share it by reference.
use std::path::Path;
use std::sync::Arc;

use regex::Regex;

use super::HandlerDescriptor;
use crate::config::handlers::HandlerSpec;
use crate::error::ConfigError;

/// A regular expression tested against the full path string.
#[derive(Debug, Clone)]
pub struct MatchRule(Regex);

impl MatchRule {
    /// Compile `rule`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRule`] if `rule` is not a valid regex.
    pub fn new(rule: &str) -> Result<Self, ConfigError> {
        Regex::new(rule)
            .map(Self)
            .map_err(|source| ConfigError::InvalidRule {
                rule: rule.to_string(),
                source,
            })
    }

    /// The rule as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Unanchored match against the lossy string form of `path`.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        self.0.is_match(&path.to_string_lossy())
    }
}

/// Ordered rule table. The first registered rule that matches wins.
#[derive(Debug, Default)]
pub struct PatternRegistry {
    handlers: Vec<Arc<HandlerDescriptor>>,
    rules: Vec<(MatchRule, usize)>,
}

impl PatternRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rule` for `handler`.
    ///
    /// Handlers are indexed in first-seen order; registering further rules
    /// for an equal descriptor reuses its slot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRule`] for a bad regex and
    /// [`ConfigError::DuplicateRule`] if the same rule text is already taken.
    pub fn register(&mut self, rule: &str, handler: Arc<HandlerDescriptor>) -> Result<(), ConfigError> {
        if let Some((_, idx)) = self.rules.iter().find(|(r, _)| r.as_str() == rule) {
            let owner = self
                .handlers
                .get(*idx)
                .map_or_else(String::new, |h| h.name.clone());
            return Err(ConfigError::DuplicateRule {
                rule: rule.to_string(),
                handler: owner,
            });
        }
        let compiled = MatchRule::new(rule)?;
        let idx = if let Some(idx) = self.handlers.iter().position(|h| *h == handler) {
            idx
        } else {
            self.handlers.push(handler);
            self.handlers.len() - 1
        };
        self.rules.push((compiled, idx));
        Ok(())
    }

    /// Build a registry from handler specs, registering their rules in order.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn from_specs(specs: &[HandlerSpec]) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for spec in specs {
            let handler = Arc::new(spec.descriptor());
            for rule in &spec.rules {
                registry.register(rule, Arc::clone(&handler))?;
            }
        }
        Ok(registry)
    }

    /// Registration index of the handler for `path`, if any rule matches.
    #[must_use]
    pub fn resolve_index(&self, path: &Path) -> Option<usize> {
        self.rules
            .iter()
            .find(|(rule, _)| rule.matches(path))
            .map(|(_, idx)| *idx)
    }

    /// The handler for `path`, if any rule matches.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> Option<&Arc<HandlerDescriptor>> {
        self.resolve_index(path).and_then(|idx| self.handlers.get(idx))
    }

    /// Handlers in registration order.
    #[must_use]
    pub fn handlers(&self) -> &[Arc<HandlerDescriptor>] {
        &self.handlers
    }

    /// Rules registered for the handler at `idx`, in registration order.
    pub fn rules_for(&self, idx: usize) -> impl Iterator<Item = &MatchRule> {
        self.rules
            .iter()
            .filter(move |(_, i)| *i == idx)
            .map(|(rule, _)| rule)
    }

    /// `true` if no rule has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
