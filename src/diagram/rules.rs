//! Ordered extraction rules
//!
//! A rule is a tagged pattern plus a constructor. Rules for one fact kind are
//! tried in priority order over the whole text; a match whose identity key is
//! already present in the accumulated list is dropped, so the first rule to
//! claim a key keeps it.

use regex::{Captures, Regex};

/// Name token shared by declarations: a quoted name or a bare identifier
pub(crate) const NAME: &str = r#"(?:"(?P<qname>[^"\n]+)"|(?P<name>[\w.]+))"#;

/// Which capture groups a rule yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    NameAliasBody,
    NameAlias,
    NameBody,
    Name,
}

impl Arity {
    fn has_alias(self) -> bool {
        matches!(self, Arity::NameAliasBody | Arity::NameAlias)
    }

    fn has_body(self) -> bool {
        matches!(self, Arity::NameAliasBody | Arity::NameBody)
    }
}

/// Captured pieces of one declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch<'t> {
    pub name: &'t str,
    pub alias: Option<&'t str>,
    pub body: Option<&'t str>,
}

impl<'t> RuleMatch<'t> {
    fn from_captures(caps: &Captures<'t>, arity: Arity) -> Option<Self> {
        let name = caps.name("qname").or_else(|| caps.name("name"))?.as_str();
        let alias = if arity.has_alias() {
            Some(caps.name("alias")?.as_str())
        } else {
            None
        };
        let body = if arity.has_body() {
            Some(caps.name("body")?.as_str())
        } else {
            None
        };
        Some(Self { name, alias, body })
    }
}

/// One tagged rule: pattern, arity and constructor
pub struct ExtractionRule<T> {
    pub tag: &'static str,
    pub arity: Arity,
    regex: Regex,
    build: fn(RuleMatch<'_>) -> T,
}

impl<T> ExtractionRule<T> {
    /// Panics on an invalid pattern; rule tables are static.
    pub fn new(
        tag: &'static str,
        pattern: &str,
        arity: Arity,
        build: fn(RuleMatch<'_>) -> T,
    ) -> Self {
        let regex = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("invalid pattern for rule {}: {}", tag, e));
        Self {
            tag,
            arity,
            regex,
            build,
        }
    }

    /// Every fact this rule produces over `text`, in document order
    pub fn extract(&self, text: &str) -> Vec<T> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| RuleMatch::from_captures(&caps, self.arity))
            .map(self.build)
            .collect()
    }
}

/// Apply `rules` in priority order, appending to `acc` every fact whose
/// identity key is not yet present. Returns how many facts were added.
pub fn apply_rules<T>(
    rules: &[ExtractionRule<T>],
    text: &str,
    identity: fn(&T) -> &str,
    acc: &mut Vec<T>,
) -> usize {
    let before = acc.len();
    for rule in rules {
        for fact in rule.extract(text) {
            if acc.iter().any(|existing| identity(existing) == identity(&fact)) {
                tracing::trace!(
                    rule = rule.tag,
                    key = identity(&fact),
                    "duplicate identity dropped"
                );
                continue;
            }
            acc.push(fact);
        }
    }
    acc.len() - before
}
