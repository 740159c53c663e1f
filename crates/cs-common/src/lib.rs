//! Claim Sentinel common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - Claim and run identity types
//! - Detection method identifiers
//! - Common error types with stable codes
//! - Output formats
//! - Schema versioning

pub mod error;
pub mod id;
pub mod method;
pub mod output;
pub mod schema;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError, SuggestedAction};
pub use id::{ClaimId, RunId};
pub use method::{DetectionMethod, MethodKind};
pub use output::OutputFormat;
pub use schema::SCHEMA_VERSION;
