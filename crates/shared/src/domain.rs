use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidStatus;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(UserId);
id_newtype!(ChatId);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<UserId> for ChatId {
    fn from(user_id: UserId) -> Self {
        ChatId(user_id.0)
    }
}

/// Review status of a bonus claim. Transitions are admin-driven only; any
/// status may be re-issued at any time, including back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimStatus {
    Pending,
    Verified,
    Rejected,
}

impl ClaimStatus {
    pub const ALL: [ClaimStatus; 3] = [
        ClaimStatus::Pending,
        ClaimStatus::Verified,
        ClaimStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "Pending",
            ClaimStatus::Verified => "Verified",
            ClaimStatus::Rejected => "Rejected",
        }
    }
}

impl Default for ClaimStatus {
    fn default() -> Self {
        ClaimStatus::Pending
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = InvalidStatus;

    /// Accepts the three literal names with the first letter case-normalized
    /// ("verified" -> `Verified`). Anything else is rejected; this is a
    /// closed enum, not free text.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = capitalize_first(raw.trim());
        match normalized.as_str() {
            "Pending" => Ok(ClaimStatus::Pending),
            "Verified" => Ok(ClaimStatus::Verified),
            "Rejected" => Ok(ClaimStatus::Rejected),
            _ => Err(InvalidStatus {
                raw: raw.to_string(),
            }),
        }
    }
}

fn capitalize_first(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_normalizes_case() {
        assert_eq!("verified".parse::<ClaimStatus>(), Ok(ClaimStatus::Verified));
        assert_eq!("PENDING".parse::<ClaimStatus>(), Ok(ClaimStatus::Pending));
        assert_eq!("Rejected".parse::<ClaimStatus>(), Ok(ClaimStatus::Rejected));
    }

    #[test]
    fn status_parse_rejects_unknown_names() {
        assert!("banned".parse::<ClaimStatus>().is_err());
        assert!("".parse::<ClaimStatus>().is_err());
        assert!("Verified!".parse::<ClaimStatus>().is_err());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in ClaimStatus::ALL {
            assert_eq!(status.as_str().parse::<ClaimStatus>(), Ok(status));
        }
    }
}
