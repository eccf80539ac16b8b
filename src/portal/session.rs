//! Per-run form session token.

use rand::Rng;

/// Random hex value embedded in the rendered form and required on `/save`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// 128 random bits as lowercase hex.
    pub fn generate() -> Self {
        let bits: u128 = rand::thread_rng().gen();
        Self(format!("{:032x}", bits))
    }

    pub fn from_value(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exact, case-sensitive comparison. An empty candidate never matches.
    pub fn matches(&self, candidate: &str) -> bool {
        !candidate.is_empty() && candidate == self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
