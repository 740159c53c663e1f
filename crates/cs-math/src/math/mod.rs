//! Core math modules.

pub mod isolation;
pub mod linalg;
pub mod quantile;
pub mod robust;
pub mod stable;
