//! Foundation types for reqspy.
//!
//! Both tree differs in `reqspy-diff` build on the types defined here.
//!
//! # Key Types
//!
//! - [`JsonPath`] / [`XmlPath`] -- Rendered locations threaded through the differs
//! - [`Difference`] -- One reported discrepancy with optional expected/actual values
//! - [`ComparisonResult`] -- Ordered, concatenable list of differences
//! - [`ComparisonOptions`] -- Exclusion patterns and the XML root offset
//! - [`ComparisonConfig`] -- Serializable form of the options

pub mod difference;
pub mod error;
pub mod options;
pub mod path;
pub mod result;

pub use difference::Difference;
pub use error::TypeError;
pub use options::{ComparisonConfig, ComparisonOptions, ExclusionPattern};
pub use path::{DocumentPath, JsonPath, XmlPath, XmlStep};
pub use result::ComparisonResult;
