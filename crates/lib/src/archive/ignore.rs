//! Ignore patterns for root-level archive entries.
//!
//! A pattern containing `*` is a wildcard, turned into an unanchored regex in
//! which `*` matches any run of characters. Every other pattern matches any
//! name that contains it as a substring, so `doc` also drops `docs`.

use regex::Regex;

/// A single ignore pattern.
#[derive(Debug, Clone)]
pub enum IgnorePattern {
  Literal(String),
  Wildcard(Regex),
}

impl IgnorePattern {
  pub fn new(pattern: &str) -> Self {
    if !pattern.contains('*') {
      return IgnorePattern::Literal(pattern.to_string());
    }

    let source = pattern.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
    match Regex::new(&source) {
      Ok(regex) => IgnorePattern::Wildcard(regex),
      Err(_) => IgnorePattern::Literal(pattern.to_string()),
    }
  }

  pub fn matches(&self, name: &str) -> bool {
    match self {
      IgnorePattern::Literal(literal) => name.contains(literal.as_str()),
      IgnorePattern::Wildcard(regex) => regex.is_match(name),
    }
  }
}

/// A set of ignore patterns; a name is ignored if any pattern matches.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
  patterns: Vec<IgnorePattern>,
}

impl IgnoreSet {
  pub fn new(patterns: &[&str]) -> Self {
    Self {
      patterns: patterns.iter().map(|p| IgnorePattern::new(p)).collect(),
    }
  }

  /// Add literal names to the set.
  pub fn with_names<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self
      .patterns
      .extend(names.into_iter().map(|n| IgnorePattern::Literal(n.as_ref().to_string())));
    self
  }

  pub fn is_ignored(&self, name: &str) -> bool {
    self.patterns.iter().any(|p| p.matches(name))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::consts::{DEFAULT_IGNORE_DIRS, DEFAULT_IGNORE_FILES};

  #[test]
  fn literal_matches_substring() {
    let pattern = IgnorePattern::new("doc");
    assert!(pattern.matches("doc"));
    assert!(pattern.matches("docs"));
    assert!(!pattern.matches("src"));
  }

  #[test]
  fn wildcard_matches_build_archives() {
    let pattern = IgnorePattern::new(".build*zip");
    assert!(pattern.matches(".build_sample.Main_1547066810853.zip"));
    assert!(pattern.matches(".build_make_app_1.zip"));
    assert!(!pattern.matches("build.zip"));
  }

  #[test]
  fn wildcard_dot_is_literal() {
    let pattern = IgnorePattern::new(".build*");
    assert!(pattern.matches(".build_output"));
    assert!(!pattern.matches("xbuild"));
  }

  #[test]
  fn default_dirs() {
    let set = IgnoreSet::new(DEFAULT_IGNORE_DIRS);
    for dir in [".git", "output", "doc", "samples", ".settings", ".apt_generated", "___bundle"] {
      assert!(set.is_ignored(dir), "{} should be ignored", dir);
    }
    assert!(!set.is_ignored("src"));
    assert!(!set.is_ignored("impl"));
  }

  #[test]
  fn default_files() {
    let set = IgnoreSet::new(DEFAULT_IGNORE_FILES);
    assert!(set.is_ignored(".project"));
    assert!(set.is_ignored("toolkit.xml"));
    assert!(set.is_ignored("___bundle.zip"));
    assert!(!set.is_ignored("info.xml"));
    assert!(!set.is_ignored("Main.spl"));
  }

  #[test]
  fn extra_names() {
    let set = IgnoreSet::new(DEFAULT_IGNORE_FILES).with_names(["makefile"]);
    assert!(set.is_ignored("makefile"));
    assert!(!set.is_ignored("Makefile"));
  }
}
