// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! General-purpose search utilities.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// A thing that can be searched.
pub trait Searchable {
    /// The haystack that can be searched for a needle.
    fn search_text(&self) -> &str;

    /// True if `filter` matches the [`Searchable::search_text()`].
    fn matches(&self, filter: &TitleFilter) -> bool {
        filter.is_match(self.search_text())
    }
}

/// A compiled regular expression used to select posts by title.
///
/// A filter is compiled once and reused for every record in a run.
#[derive(Clone, Debug)]
pub struct TitleFilter {
    regex: Regex,
    case_sensitive: bool,
}

impl TitleFilter {
    /// Compiles `pattern` into a case-insensitive filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use redscout::filter::TitleFilter;
    /// let filter = TitleFilter::new("tutorial").unwrap();
    /// assert!(filter.is_match("A Python TUTORIAL for beginners"));
    /// ```
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        Self::with_case_sensitivity(pattern, false)
    }

    /// Compiles `pattern`, matching case-sensitively if `case_sensitive`
    /// is true.
    ///
    /// # Examples
    ///
    /// ```
    /// use redscout::filter::TitleFilter;
    /// let filter = TitleFilter::with_case_sensitivity("Rust", true).unwrap();
    /// assert!(filter.is_match("Learning Rust"));
    /// assert!(!filter.is_match("learning rust"));
    /// ```
    pub fn with_case_sensitivity(pattern: &str, case_sensitive: bool) -> Result<Self, FilterError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|err| FilterError::InvalidPattern {
                pattern: pattern.to_string(),
                source: err,
            })?;
        Ok(Self {
            regex,
            case_sensitive,
        })
    }

    /// The pattern the filter was compiled from.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// True if the filter distinguishes between upper and lower case.
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// True if the pattern is found anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Indicates that a filter could not be compiled.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The pattern is not a valid regular expression.
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,

        /// Why the pattern was rejected.
        source: regex::Error,
    },
}
