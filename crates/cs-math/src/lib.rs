//! Claim Sentinel math utilities.

pub mod math;

pub use math::isolation::{average_path_length, EULER_GAMMA};
pub use math::linalg;
pub use math::quantile::{percentile, quantile, quantile_sorted, sorted_finite};
pub use math::robust::{mad, median, MAD_CONSISTENCY};
pub use math::stable::*;
