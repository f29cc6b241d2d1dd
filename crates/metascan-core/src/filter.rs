//! Name filters deciding which discovered names take part in indexing.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

/// Pure predicate over fully-qualified names. Cheap to clone and share across threads.
#[derive(Clone)]
pub struct InputFilter {
    predicate: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    description: String,
}

impl InputFilter {
    /// Wrap an arbitrary predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            description: "custom".to_string(),
        }
    }

    /// Filter that accepts every name.
    pub fn accept_all() -> Self {
        Self {
            predicate: Arc::new(|_| true),
            description: "accept-all".to_string(),
        }
    }

    /// Filter that rejects exactly one name.
    pub fn excluding(name: impl Into<String>) -> Self {
        let name = name.into();
        let description = format!("-{}", name);
        Self {
            predicate: Arc::new(move |candidate| candidate != name),
            description,
        }
    }

    pub fn accepts(&self, name: &str) -> bool {
        (self.predicate)(name)
    }

    /// Human-readable summary, used in logs.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl Default for InputFilter {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl fmt::Debug for InputFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InputFilter").field(&self.description).finish()
    }
}

/// One rule of a [`FilterBuilder`] chain. Patterns must match the whole name.
#[derive(Debug, Clone)]
pub enum FilterRule {
    Include(Regex),
    Exclude(Regex),
}

impl FilterRule {
    fn matches(&self, name: &str) -> bool {
        match self {
            FilterRule::Include(re) | FilterRule::Exclude(re) => re.is_match(name),
        }
    }

    fn is_exclude(&self) -> bool {
        matches!(self, FilterRule::Exclude(_))
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterRule::Include(re) => write!(f, "+{}", strip_anchors(re.as_str())),
            FilterRule::Exclude(re) => write!(f, "-{}", strip_anchors(re.as_str())),
        }
    }
}

/// Ordered include/exclude chain.
///
/// Evaluation walks the rules in order: a name starts accepted when the chain
/// is empty or begins with an exclude, an exclude rule can only reject an
/// accepted name, and an include rule can only accept a rejected one.
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    rules: Vec<FilterRule>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include names fully matching a regular expression.
    pub fn include(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.rules.push(FilterRule::Include(anchored(pattern)?));
        Ok(self)
    }

    /// Exclude names fully matching a regular expression.
    pub fn exclude(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.rules.push(FilterRule::Exclude(anchored(pattern)?));
        Ok(self)
    }

    /// Include every name starting with the given prefix, e.g. a package.
    pub fn include_package(mut self, prefix: &str) -> Self {
        self.rules.push(FilterRule::Include(prefix_regex(prefix)));
        self
    }

    /// Exclude every name starting with the given prefix.
    pub fn exclude_package(mut self, prefix: &str) -> Self {
        self.rules.push(FilterRule::Exclude(prefix_regex(prefix)));
        self
    }

    /// Append a prebuilt rule.
    pub fn add(mut self, rule: FilterRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// Evaluate the chain against a name.
    pub fn accepts(&self, name: &str) -> bool {
        let mut accept = self.rules.first().map_or(true, FilterRule::is_exclude);
        for rule in &self.rules {
            if accept && rule.is_exclude() {
                accept = !rule.matches(name);
            } else if !accept && !rule.is_exclude() {
                accept = rule.matches(name);
            }
        }
        accept
    }

    /// Freeze the chain into an [`InputFilter`].
    pub fn build(self) -> InputFilter {
        if self.rules.is_empty() {
            return InputFilter::accept_all();
        }
        let description = self
            .rules
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        InputFilter {
            predicate: Arc::new(move |name| self.accepts(name)),
            description,
        }
    }
}

fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}

fn prefix_regex(prefix: &str) -> Regex {
    Regex::new(&format!("^(?:{}.*)$", regex::escape(prefix)))
        .expect("escaped prefix is a valid regex")
}

fn strip_anchors(pattern: &str) -> &str {
    pattern
        .strip_prefix("^(?:")
        .and_then(|p| p.strip_suffix(")$"))
        .unwrap_or(pattern)
}
