use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Placeholder returned instead of a contact field the viewer may not see.
pub const LOCKED_SENTINEL: &str = "Locked";

/// Lower and upper bounds (inclusive) of a project's public code.
pub const PUBLIC_CODE_MIN: i64 = 1000;
pub const PUBLIC_CODE_MAX: i64 = 9999;

/// Lifecycle of a payment request. `Approved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Pending,
    Approved,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "Pending",
            SubscriptionStatus::Approved => "Approved",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown subscription status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for SubscriptionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(SubscriptionStatus::Pending),
            "Approved" => Ok(SubscriptionStatus::Approved),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
