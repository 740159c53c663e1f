//! Claim and run identity types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of one billing claim.
///
/// Claim ids arrive as strings or integers; both are normalised to the
/// string form so `7` and `"7"` name the same claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClaimId(pub String);

impl ClaimId {
    pub fn new(id: impl Into<String>) -> Self {
        ClaimId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build a claim id from a JSON scalar.
    ///
    /// Strings are taken verbatim, integers and finite numbers are rendered
    /// without a trailing `.0`. Anything else is rejected.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(ClaimId(s.clone())),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(ClaimId(i.to_string()))
                } else if let Some(u) = n.as_u64() {
                    Some(ClaimId(u.to_string()))
                } else {
                    n.as_f64().filter(|f| f.is_finite()).map(|f| ClaimId(f.to_string()))
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClaimId {
    fn from(s: &str) -> Self {
        ClaimId(s.to_string())
    }
}

impl From<String> for ClaimId {
    fn from(s: String) -> Self {
        ClaimId(s)
    }
}

/// Run ID for correlating logs and output of one detection run.
///
/// Format: `cs-YYYYMMDD-HHMMSS-XXXX`
/// Example: `cs-20260115-143022-a7xq`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let suffix = generate_base32_suffix();
        RunId(format!(
            "cs-{}-{}-{}",
            now.format("%Y%m%d"),
            now.format("%H%M%S"),
            suffix
        ))
    }

    /// Parse an existing run ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 23 {
            return None;
        }
        let bytes = s.as_bytes();
        if bytes.first() != Some(&b'c')
            || bytes.get(1) != Some(&b's')
            || bytes.get(2) != Some(&b'-')
            || bytes.get(11) != Some(&b'-')
            || bytes.get(18) != Some(&b'-')
        {
            return None;
        }
        let date = &s[3..11];
        let time = &s[12..18];
        let suffix = &s[19..23];
        if !date.chars().all(|c| c.is_ascii_digit()) || !time.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !suffix.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')) {
            return None;
        }
        Some(RunId(s.to_string()))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn generate_base32_suffix() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    let mut value = ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | (bytes[2] as u32);
    value &= 0x000F_FFFF;
    let alphabet = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut out = String::with_capacity(4);
    for shift in [15_u32, 10, 5, 0] {
        let idx = ((value >> shift) & 0x1F) as usize;
        out.push(alphabet[idx] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_id_format() {
        let rid = RunId::new();
        assert!(rid.0.starts_with("cs-"));
        assert_eq!(rid.0.len(), 23);
        assert_eq!(RunId::parse(&rid.0), Some(rid));
    }

    #[test]
    fn test_run_id_parse_rejects_garbage() {
        assert!(RunId::parse("pt-20260115-143022-a7xq").is_none());
        assert!(RunId::parse("cs-2026011x-143022-a7xq").is_none());
        assert!(RunId::parse("cs-20260115-143022-A7XQ").is_none());
        assert!(RunId::parse("cs-short").is_none());
    }

    #[test]
    fn test_claim_id_from_json_scalars() {
        assert_eq!(ClaimId::from_json(&json!("CLM001")), Some(ClaimId::from("CLM001")));
        assert_eq!(ClaimId::from_json(&json!(7)), Some(ClaimId::from("7")));
        assert_eq!(ClaimId::from_json(&json!(7)), ClaimId::from_json(&json!("7")));
        assert!(ClaimId::from_json(&json!(null)).is_none());
        assert!(ClaimId::from_json(&json!("  ")).is_none());
        assert!(ClaimId::from_json(&json!({"id": 1})).is_none());
    }

    #[test]
    fn test_claim_id_serializes_transparently() {
        let id = ClaimId::new("CLM42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"CLM42\"");
    }
}
