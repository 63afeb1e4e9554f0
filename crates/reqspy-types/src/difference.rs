use std::fmt;

use serde::{Deserialize, Serialize};

/// One discrepancy between an actual and an expected tree.
///
/// The rendered form is what assertion failures print, so it is part of
/// the public contract:
///
/// ```text
/// Values are different at $.Prop1:
///  - Expected : 3
///  - Actual : 1
/// ```
///
/// A difference without an expected/actual pair renders as its message
/// alone.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Difference {
    /// Human-readable description, including the path it applies to.
    pub message: String,
    /// Rendered expected value, when the difference compares two values.
    pub expected: Option<String>,
    /// Rendered actual value, when the difference compares two values.
    pub actual: Option<String>,
}

impl Difference {
    /// A difference described by its message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    /// A difference carrying the expected and actual values.
    pub fn with_values(
        message: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            expected: Some(expected.into()),
            actual: Some(actual.into()),
        }
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.expected, &self.actual) {
            (Some(expected), Some(actual)) => write!(
                f,
                "{}:\n - Expected : {}\n - Actual : {}",
                self.message, expected, actual
            ),
            _ => f.write_str(&self.message),
        }
    }
}
