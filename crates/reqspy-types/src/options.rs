//! Comparison options: exclusion patterns and the XML root offset.
//!
//! An exclusion pattern is a glob over rendered paths: literal characters
//! match themselves and `*` matches any run of characters. A pattern
//! excludes a path when it matches anywhere in the rendered path, so
//! `@flag` excludes `/@flag` and `*.Value` excludes `$.Items[3].Value`.
//!
//! Patterns compile to [`regex::Regex`] with every literal segment
//! escaped; the regex engine runs in linear time, so hostile patterns
//! cannot trigger catastrophic backtracking.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TypeError};
use crate::path::{DocumentPath, XmlPath};

/// A compiled exclusion pattern.
#[derive(Clone, Debug)]
pub struct ExclusionPattern {
    pattern: String,
    matcher: Regex,
}

impl ExclusionPattern {
    /// Compile a glob-like pattern.
    pub fn compile(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(TypeError::pattern(pattern, "pattern must not be empty"));
        }

        let source = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let matcher =
            Regex::new(&source).map_err(|e| TypeError::pattern(pattern, e.to_string()))?;

        Ok(Self {
            pattern: pattern.to_string(),
            matcher,
        })
    }

    /// The pattern as written.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns `true` if the pattern occurs in `rendered`.
    pub fn matches(&self, rendered: &str) -> bool {
        self.matcher.is_match(rendered)
    }
}

impl PartialEq for ExclusionPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for ExclusionPattern {}

/// Options for one comparison call.
///
/// Builder methods consume the options and return a new value, so an
/// options value handed to a differ is never changed behind its back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComparisonOptions {
    excluded: Vec<ExclusionPattern>,
    root_path: Option<XmlPath>,
}

impl ComparisonOptions {
    /// Options with no exclusions and no root offset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add exclusion patterns. Every pattern is compiled here, so a
    /// malformed pattern fails before any comparison runs.
    pub fn exclude<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let compiled = ExclusionPattern::compile(pattern.as_ref())?;
            debug!(pattern = compiled.pattern(), "registered exclusion pattern");
            self.excluded.push(compiled);
        }
        Ok(self)
    }

    /// Start XML comparisons at `path` (relative to the document element)
    /// instead of the document element. Reported paths stay relative to
    /// the document element.
    pub fn with_root_path(mut self, path: &str) -> Result<Self> {
        self.root_path = Some(XmlPath::parse(path)?);
        Ok(self)
    }

    /// Returns `true` if any exclusion pattern matches `path`.
    pub fn is_excluded<P: DocumentPath + ?Sized>(&self, path: &P) -> bool {
        let rendered = path.as_str();
        self.excluded.iter().any(|p| p.matches(rendered))
    }

    /// The compiled exclusion patterns, in registration order.
    pub fn excluded_patterns(&self) -> &[ExclusionPattern] {
        &self.excluded
    }

    /// The XML root offset, if one was set.
    pub fn root_path(&self) -> Option<&XmlPath> {
        self.root_path.as_ref()
    }

    /// Compile options from their serializable form.
    pub fn from_config(config: &ComparisonConfig) -> Result<Self> {
        let options = Self::new().exclude(&config.excluded_paths)?;
        match &config.root_path {
            Some(root) => options.with_root_path(root),
            None => Ok(options),
        }
    }

    /// The serializable form of these options.
    pub fn to_config(&self) -> ComparisonConfig {
        ComparisonConfig {
            excluded_paths: self
                .excluded
                .iter()
                .map(|p| p.pattern().to_string())
                .collect(),
            root_path: self.root_path.as_ref().map(ToString::to_string),
        }
    }
}

/// Serializable comparison settings, e.g. loaded from a fixture file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// Exclusion patterns, compiled by [`ComparisonOptions::exclude`].
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// XML root offset, see [`ComparisonOptions::with_root_path`].
    #[serde(default)]
    pub root_path: Option<String>,
}

impl TryFrom<ComparisonConfig> for ComparisonOptions {
    type Error = TypeError;

    fn try_from(config: ComparisonConfig) -> Result<Self> {
        Self::from_config(&config)
    }
}
