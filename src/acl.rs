//! Access-control list for consumer → method authorization.
//!
//! The ACL is configured as a JSON object mapping consumer names to arrays of
//! method-path patterns:
//!
//! ```json
//! {"logger": ["/gatekeep.Admin/Logging"], "biz_admin": ["/gatekeep.Biz/*"]}
//! ```
//!
//! A pattern ending in `/*` matches its prefix (including the slash) followed
//! by at least one more character. Every other pattern matches exactly.
//! Patterns are compiled once, at construction.

use std::collections::HashMap;

use regex::Regex;

use crate::error::ConfigError;

/// Suffix that turns a pattern into a prefix match.
pub const WILDCARD_SUFFIX: &str = "/*";

/// Answers whether a consumer may invoke a method.
///
/// Implementations must fail closed: any doubt is a deny.
pub trait AccessControl: Send + Sync {
    /// Returns true if `consumer` may call the fully-qualified `method`.
    fn check(&self, consumer: &str, method: &str) -> bool;
}

/// The compiled patterns of a single consumer.
#[derive(Debug, Clone)]
pub struct AclRule {
    patterns: Vec<Regex>,
}

impl AclRule {
    /// Compile a rule from raw pattern strings.
    pub fn compile<S: AsRef<str>>(consumer: &str, patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| compile_pattern(consumer, p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Returns true if any pattern matches `method`.
    #[must_use]
    pub fn matches(&self, method: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(method))
    }

    /// Number of compiled patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true if the rule has no patterns (and therefore allows nothing).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn compile_pattern(consumer: &str, pattern: &str) -> Result<Regex, ConfigError> {
    let source = match pattern.strip_suffix('*') {
        Some(prefix) if pattern.ends_with(WILDCARD_SUFFIX) => {
            format!("^{}.+$", regex::escape(prefix))
        }
        _ => format!("^{}$", regex::escape(pattern)),
    };

    Regex::new(&source).map_err(|e| ConfigError::InvalidPattern {
        consumer: consumer.to_string(),
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// ACL built from static JSON configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAcl {
    rules: HashMap<String, AclRule>,
}

impl StaticAcl {
    /// Parse and compile a JSON ACL document.
    pub fn from_json(config: &str) -> Result<Self, ConfigError> {
        let raw: HashMap<String, Vec<String>> =
            serde_json::from_str(config).map_err(|e| ConfigError::InvalidAcl {
                reason: e.to_string(),
            })?;
        Self::from_rules(raw)
    }

    /// Compile an ACL from an in-memory consumer → patterns map.
    pub fn from_rules<I, P>(rules: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, P)>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let mut compiled = HashMap::new();
        for (consumer, patterns) in rules {
            let patterns: Vec<P::Item> = patterns.into_iter().collect();
            let rule = AclRule::compile(&consumer, &patterns)?;
            compiled.insert(consumer, rule);
        }
        Ok(Self { rules: compiled })
    }

    /// Configured consumer names, sorted.
    #[must_use]
    pub fn consumers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The rule for `consumer`, if configured.
    #[must_use]
    pub fn rule(&self, consumer: &str) -> Option<&AclRule> {
        self.rules.get(consumer)
    }
}

impl AccessControl for StaticAcl {
    fn check(&self, consumer: &str, method: &str) -> bool {
        match self.rules.get(consumer) {
            Some(rule) if !rule.is_empty() => rule.matches(method),
            _ => false,
        }
    }
}
