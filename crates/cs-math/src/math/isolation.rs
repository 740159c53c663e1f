//! Normalisation constants for isolation-based scoring.

/// Euler–Mascheroni constant.
pub const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful search in a binary search tree
/// built from `n` points, `c(n)`.
///
/// Used both to normalise isolation depths and to credit the unexplored
/// subtree below a leaf that still holds more than one point.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            let harmonic = (n - 1.0).ln() + EULER_GAMMA;
            2.0 * harmonic - 2.0 * (n - 1.0) / n
        }
    }
}
