use std::fmt;
use std::str::FromStr;

use crate::error::{SadError, SadResult};

/// Separator between names in a compound label (`speech+music`).
pub const NAME_SEPARATOR: char = '+';

/// Ordered set of distinct names attached to a segment.
///
/// Equality ignores order: two labels match when they hold the same number of
/// names and every name of one is found in the other.
#[derive(Debug, Clone, Eq)]
pub struct Label {
    names: Vec<String>,
}

impl Label {
    /// Parse a `+`-separated list of names. Empty names are skipped and
    /// duplicates are kept once; at least one name must remain.
    pub fn parse(text: &str) -> SadResult<Self> {
        let mut names: Vec<String> = Vec::new();
        for name in text.split(NAME_SEPARATOR).filter(|n| !n.is_empty()) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }

        if names.is_empty() {
            return Err(SadError::InvalidLabel(text.to_string()));
        }

        Ok(Self { names })
    }

    /// Label holding the single name `name`, which must not contain the
    /// separator.
    pub(crate) fn single(name: &str) -> Self {
        Self {
            names: vec![name.to_string()],
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of `name` in the label, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Append the names of `other` not already present. Returns the number of
    /// names added.
    pub fn extend(&mut self, other: Label) -> usize {
        let before = self.names.len();
        for name in other.names {
            if !self.contains(&name) {
                self.names.push(name);
            }
        }
        self.names.len() - before
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.names.len() == other.names.len() && self.names.iter().all(|n| other.contains(n))
    }
}

impl FromStr for Label {
    type Err = SadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::parse(s)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", NAME_SEPARATOR)?;
            }
            write!(f, "{}", name)?;
        }
        Ok(())
    }
}

/// Compare two optional labels. A missing label stands for *any* label.
pub fn label_equal(a: Option<&Label>, b: Option<&Label>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> Label {
        Label::parse(s).unwrap()
    }

    #[test]
    fn test_parse_compound() {
        let l = label("speech+loud");
        assert_eq!(l.names(), &["speech".to_string(), "loud".to_string()]);
        assert_eq!(l.len(), 2);
    }

    #[test]
    fn test_parse_skips_empty_and_duplicate_names() {
        let l = label("+a++b+a+");
        assert_eq!(l.names(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_parse_rejects_nameless_text() {
        assert!(matches!(Label::parse(""), Err(SadError::InvalidLabel(_))));
        assert!(matches!(Label::parse("+++"), Err(SadError::InvalidLabel(_))));
    }

    #[test]
    fn test_equality_ignores_order() {
        assert_eq!(label("a+b"), label("b+a"));
        assert_ne!(label("a"), label("a+b"));
        assert_ne!(label("a+c"), label("a+b"));
    }

    #[test]
    fn test_label_equal_wildcard() {
        let x = label("speech");
        assert!(label_equal(None, Some(&x)));
        assert!(label_equal(Some(&x), None));
        assert!(label_equal(None, None));
        assert!(label_equal(Some(&label("a+b")), Some(&label("b+a"))));
        assert!(!label_equal(Some(&label("a")), Some(&label("a+b"))));
    }

    #[test]
    fn test_extend_counts_new_names_only() {
        let mut l = label("a+b");
        assert_eq!(l.extend(label("b+c")), 1);
        assert_eq!(l.to_string(), "a+b+c");
        assert_eq!(l.index_of("c"), Some(2));
    }
}
