//! Schema versioning for machine-readable output.

/// Version of the detection output document.
///
/// Bumped whenever a field is removed or changes meaning; additive changes
/// keep the version.
pub const SCHEMA_VERSION: &str = "1.0.0";
