//! Regex optimizer
//!
//! Downgrades literal regular expressions to indexable predicates:
//!
//! - **Exact**: `^abc$` - equality
//! - **Prefix**: `^abc` - `LIKE 'abc%'`
//! - **Suffix**: `abc$` - `LIKE '%abc'`
//! - **Contains**: `abc` - `LIKE '%abc%'`
//! - **Irreducible**: anything else, evaluated in memory
//!
//! The store runs with `PRAGMA case_sensitive_like = ON`, so a plain `LIKE`
//! is case sensitive and agrees with the regex engine.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::selector::RegexSpec;

/// Default number of classified patterns kept
pub const DEFAULT_REGEX_CACHE_CAPACITY: usize = 500;

/// Escape character used in generated LIKE patterns
pub const LIKE_ESCAPE: char = '\\';

/// Classification of a regex pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternClass {
    Exact(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Irreducible,
}

impl PatternClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternClass::Exact(_) => "exact",
            PatternClass::Prefix(_) => "prefix",
            PatternClass::Suffix(_) => "suffix",
            PatternClass::Contains(_) => "contains",
            PatternClass::Irreducible => "irreducible",
        }
    }

    /// LIKE pattern for the prefix/suffix/contains classes
    pub fn like_pattern(&self) -> Option<String> {
        match self {
            PatternClass::Prefix(lit) => Some(format!("{}%", like_escape(lit))),
            PatternClass::Suffix(lit) => Some(format!("%{}", like_escape(lit))),
            PatternClass::Contains(lit) => Some(format!("%{}%", like_escape(lit))),
            PatternClass::Exact(_) | PatternClass::Irreducible => None,
        }
    }
}

/// Classifies a pattern by its anchors and literal body
pub fn classify(pattern: &str) -> PatternClass {
    let (anchored_start, rest) = match pattern.strip_prefix('^') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };

    let (body, anchored_end) = match rest.strip_suffix('$') {
        // `\$` at the end is a literal dollar, not an anchor
        Some(body) if !ends_with_escape(body) => (body, true),
        _ => (rest, false),
    };

    let literal = match extract_literal(body) {
        Some(literal) => literal,
        None => return PatternClass::Irreducible,
    };

    match (anchored_start, anchored_end) {
        (true, true) => PatternClass::Exact(literal),
        (true, false) => PatternClass::Prefix(literal),
        (false, true) => PatternClass::Suffix(literal),
        (false, false) => PatternClass::Contains(literal),
    }
}

/// Classifies a compiled `$regex`, taking its options into account.
///
/// Only the `i` option is representable. A case-insensitive literal must be
/// ASCII without `k` or `s`: those letters fold to non-ASCII characters
/// (`K`, `ſ`) under the regex engine's Unicode case folding, which SQL
/// `lower()` and `NOCASE` do not know about.
pub fn plan_regex(spec: &RegexSpec) -> PatternClass {
    if spec.has_semantic_flags() {
        return PatternClass::Irreducible;
    }
    let class = classify(&spec.pattern);
    if spec.case_insensitive() {
        let literal = match &class {
            PatternClass::Exact(l)
            | PatternClass::Prefix(l)
            | PatternClass::Suffix(l)
            | PatternClass::Contains(l) => l,
            PatternClass::Irreducible => return class,
        };
        let foldable = literal.is_ascii() && !literal.contains(&['k', 'K', 's', 'S'][..]);
        if !foldable {
            return PatternClass::Irreducible;
        }
    }
    class
}

fn ends_with_escape(body: &str) -> bool {
    body.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Returns the literal text when the body has no regex metacharacters.
///
/// Escaped ASCII punctuation (`\.`, `\$`, `\/`) counts as literal; any other
/// escape (`\d`, `\b`, `\1`) makes the pattern irreducible.
fn extract_literal(body: &str) -> Option<String> {
    let mut literal = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                // `\<` and `\>` are word-boundary assertions
                Some(escaped) if escaped.is_ascii_punctuation() && !matches!(escaped, '<' | '>') => {
                    literal.push(escaped)
                }
                _ => return None,
            },
            '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' => {
                return None
            }
            other => literal.push(other),
        }
    }
    Some(literal)
}

/// Escapes `%`, `_` and the escape character for a LIKE pattern
pub fn like_escape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Cache key: (field, pattern, flags, schema version)
type RegexKey = (String, String, String, u64);

/// Bounded LRU of pattern classifications, independent of the query cache
pub struct RegexCache {
    entries: Option<Mutex<LruCache<RegexKey, PatternClass>>>,
}

impl RegexCache {
    /// Creates a cache; capacity 0 disables caching
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Returns the classification and whether it came from the cache
    pub fn classify(&self, field: &str, spec: &RegexSpec, schema_version: u64) -> (PatternClass, bool) {
        let entries = match &self.entries {
            Some(entries) => entries,
            None => return (plan_regex(spec), false),
        };

        let key = (
            field.to_string(),
            spec.pattern.clone(),
            spec.flags(),
            schema_version,
        );

        let mut guard = entries.lock();
        if let Some(class) = guard.get(&key) {
            return (class.clone(), true);
        }
        let class = plan_regex(spec);
        guard.put(key, class.clone());
        (class, false)
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.lock().clear();
        }
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new(DEFAULT_REGEX_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(pattern: &str, options: &str) -> RegexSpec {
        RegexSpec::new(pattern, options).unwrap()
    }

    #[test]
    fn test_classify_anchors() {
        assert_eq!(classify("^abc$"), PatternClass::Exact("abc".into()));
        assert_eq!(classify("^John"), PatternClass::Prefix("John".into()));
        assert_eq!(classify("son$"), PatternClass::Suffix("son".into()));
        assert_eq!(classify("oh"), PatternClass::Contains("oh".into()));
        assert_eq!(classify(""), PatternClass::Contains(String::new()));
    }

    #[test]
    fn test_classify_metacharacters() {
        assert_eq!(classify("[A-Z]{3}"), PatternClass::Irreducible);
        assert_eq!(classify("^a.c"), PatternClass::Irreducible);
        assert_eq!(classify("a|b"), PatternClass::Irreducible);
        assert_eq!(classify("^\\d+"), PatternClass::Irreducible);
        assert_eq!(classify("a^b"), PatternClass::Irreducible);
        assert_eq!(classify("\\<word"), PatternClass::Irreducible);
    }

    #[test]
    fn test_classify_escapes() {
        assert_eq!(classify("^a\\.b$"), PatternClass::Exact("a.b".into()));
        assert_eq!(classify("cost\\$"), PatternClass::Contains("cost$".into()));
        assert_eq!(classify("^\\^x"), PatternClass::Prefix("^x".into()));
    }

    #[test]
    fn test_like_pattern_escaping() {
        assert_eq!(
            PatternClass::Prefix("50%_off\\".into()).like_pattern().unwrap(),
            "50\\%\\_off\\\\%"
        );
        assert_eq!(
            PatternClass::Contains("x".into()).like_pattern().unwrap(),
            "%x%"
        );
        assert!(PatternClass::Exact("x".into()).like_pattern().is_none());
    }

    #[test]
    fn test_plan_regex_flags() {
        assert_eq!(plan_regex(&spec("^ab", "m")), PatternClass::Irreducible);
        assert_eq!(plan_regex(&spec("^ab", "i")), PatternClass::Prefix("ab".into()));
        assert_eq!(plan_regex(&spec("^ask", "i")), PatternClass::Irreducible);
        assert_eq!(plan_regex(&spec("^é", "i")), PatternClass::Irreducible);
        assert_eq!(plan_regex(&spec("^é", "")), PatternClass::Prefix("é".into()));
    }

    #[test]
    fn test_cache_hits_and_versions() {
        let cache = RegexCache::new(4);
        let s = spec("^ab", "");
        assert!(!cache.classify("name", &s, 1).1);
        assert!(cache.classify("name", &s, 1).1);
        assert!(!cache.classify("name", &s, 2).1);
        assert!(!cache.classify("other", &s, 1).1);
        assert_eq!(cache.len(), 3);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_evicts_lru() {
        let cache = RegexCache::new(1);
        cache.classify("a", &spec("x", ""), 1);
        cache.classify("b", &spec("x", ""), 1);
        assert_eq!(cache.len(), 1);
        assert!(!cache.classify("a", &spec("x", ""), 1).1);
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let cache = RegexCache::disabled();
        let s = spec("^ab", "");
        cache.classify("name", &s, 1);
        assert!(!cache.classify("name", &s, 1).1);
        assert!(cache.is_empty());
    }
}
